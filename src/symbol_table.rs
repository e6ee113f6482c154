use bincode::{
    de::{BorrowDecoder, Decoder},
    enc::Encoder,
    error::{DecodeError, EncodeError},
    BorrowDecode, Decode, Encode,
};
use hashbrown::HashMap;

use crate::errors::{CrfError, Result};
#[cfg(feature = "train")]
use crate::features::FeatureMap;

/// Name of the always-on feature occupying dimension 0 when an intercept is used.
pub const INTERCEPT_FEATURE: &str = "*&^INTERCEPT%$^&**";

/// Manages the correspondence between symbols and dense indices.
///
/// Indices are assigned in insertion order starting from 0.
#[derive(Clone, Debug, Default)]
pub struct SymbolTable {
    symbols: Vec<String>,
    ids: HashMap<String, usize>,
}

impl SymbolTable {
    /// Creates a new empty [`SymbolTable`].
    #[inline(always)]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a table whose indices follow the order of the given symbols.
    ///
    /// # Errors
    ///
    /// Symbols must be unique.
    pub fn from_symbols(symbols: Vec<String>) -> Result<Self> {
        let mut ids = HashMap::with_capacity(symbols.len());
        for (i, symbol) in symbols.iter().enumerate() {
            if ids.insert(symbol.clone(), i).is_some() {
                return Err(CrfError::invalid_argument(format!(
                    "duplicate symbol {symbol:?} at index {i}"
                )));
            }
        }
        Ok(Self { symbols, ids })
    }

    /// Returns the index of the symbol, adding it if it is absent.
    pub fn get_or_add(&mut self, symbol: &str) -> usize {
        let next_id = self.symbols.len();
        let id = *self.ids.entry_ref(symbol).or_insert(next_id);
        if id == next_id {
            self.symbols.push(symbol.to_string());
        }
        id
    }

    /// Returns the index of the symbol.
    #[inline(always)]
    pub fn id(&self, symbol: &str) -> Option<usize> {
        self.ids.get(symbol).copied()
    }

    /// Returns the symbol with the given index.
    #[inline(always)]
    pub fn symbol(&self, id: usize) -> Option<&str> {
        self.symbols.get(id).map(String::as_str)
    }

    /// Returns all symbols in index order.
    #[inline(always)]
    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    /// Returns the number of symbols.
    #[inline(always)]
    #[must_use]
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    /// Returns `true` if the table has no symbol.
    #[inline(always)]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

impl PartialEq for SymbolTable {
    fn eq(&self, other: &Self) -> bool {
        self.symbols == other.symbols
    }
}

impl Encode for SymbolTable {
    fn encode<E: Encoder>(&self, encoder: &mut E) -> Result<(), EncodeError> {
        Encode::encode(&self.symbols, encoder)
    }
}

impl<Context> Decode<Context> for SymbolTable {
    fn decode<D: Decoder<Context = Context>>(decoder: &mut D) -> Result<Self, DecodeError> {
        let symbols: Vec<String> = Decode::decode(decoder)?;
        Self::from_symbols(symbols).map_err(|e| DecodeError::OtherString(e.to_string()))
    }
}

impl<'de, Context> BorrowDecode<'de, Context> for SymbolTable {
    fn borrow_decode<D: BorrowDecoder<'de, Context = Context>>(
        decoder: &mut D,
    ) -> Result<Self, DecodeError> {
        <Self as Decode<Context>>::decode(decoder)
    }
}

/// Counts symbol occurrences and builds a pruned [`SymbolTable`].
#[cfg(feature = "train")]
#[derive(Debug, Default)]
pub struct SymbolCounter {
    order: Vec<String>,
    counts: HashMap<String, usize>,
}

#[cfg(feature = "train")]
impl SymbolCounter {
    #[inline(always)]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline(always)]
    pub fn add(&mut self, symbol: &str) {
        let count = self.counts.entry_ref(symbol).or_insert(0);
        if *count == 0 {
            self.order.push(symbol.to_string());
        }
        *count += 1;
    }

    /// Adds every feature name of `features` in lexicographic order.
    pub fn add_features(&mut self, features: &FeatureMap) {
        let mut names: Vec<&str> = features.keys().map(String::as_str).collect();
        names.sort_unstable();
        for name in names {
            self.add(name);
        }
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Keeps symbols seen at least `min_count` times, in first-seen order.
    ///
    /// With `add_intercept`, [`INTERCEPT_FEATURE`] takes index 0.
    pub fn into_symbol_table(self, min_count: usize, add_intercept: bool) -> SymbolTable {
        let mut table = SymbolTable::new();
        if add_intercept {
            table.get_or_add(INTERCEPT_FEATURE);
        }
        for symbol in self.order {
            if self.counts[&symbol] >= min_count {
                table.get_or_add(&symbol);
            }
        }
        table
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_or_add() {
        let mut table = SymbolTable::new();
        let inputs = [
            ("zero", 0),
            ("one", 1),
            ("two", 2),
            ("one", 1),
            ("zero", 0),
            ("three", 3),
        ];
        for (s, id) in inputs {
            assert_eq!(id, table.get_or_add(s), "{s} != {id}");
        }
        assert_eq!(4, table.len());
        assert_eq!(Some(2), table.id("two"));
        assert_eq!(None, table.id("four"));
        assert_eq!(Some("three"), table.symbol(3));
        assert_eq!(None, table.symbol(4));
    }

    #[test]
    fn test_from_symbols_rejects_duplicates() {
        assert!(SymbolTable::from_symbols(vec!["a".into(), "b".into()]).is_ok());
        assert!(SymbolTable::from_symbols(vec!["a".into(), "a".into()]).is_err());
    }

    #[test]
    fn test_encode_decode() {
        let table = SymbolTable::from_symbols(vec!["x".into(), "y".into()]).unwrap();
        let config = bincode::config::standard();
        let bytes = bincode::encode_to_vec(&table, config).unwrap();
        let (decoded, _): (SymbolTable, usize) =
            bincode::decode_from_slice(&bytes, config).unwrap();
        assert_eq!(table, decoded);
        assert_eq!(Some(1), decoded.id("y"));
    }

    #[cfg(feature = "train")]
    #[test]
    fn test_counter_prunes() {
        let mut counter = SymbolCounter::new();
        for s in ["b", "a", "b", "c", "a", "b"] {
            counter.add(s);
        }
        assert_eq!(3, counter.len());
        let table = counter.into_symbol_table(2, true);
        assert_eq!(
            &[INTERCEPT_FEATURE.to_string(), "b".to_string(), "a".to_string()],
            table.symbols(),
        );
    }

    #[cfg(feature = "train")]
    #[test]
    fn test_counter_orders_maps_by_name() {
        let mut counter = SymbolCounter::new();
        counter.add("m");
        let mut features = FeatureMap::new();
        for name in ["z", "b", "m", "a", "q"] {
            features.insert(name.to_string(), 1.0);
        }
        counter.add_features(&features);
        let table = counter.into_symbol_table(1, false);
        assert_eq!(&["m", "a", "b", "q", "z"], table.symbols());
    }
}
