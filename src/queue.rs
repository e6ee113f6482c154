use core::cmp::Ordering;

use std::collections::BTreeMap;

#[derive(Clone, Copy, Debug)]
struct Key {
    priority: f64,
    seq: u64,
}

impl PartialEq for Key {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Key {}

impl PartialOrd for Key {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Key {
    // Among equal priorities, earlier insertions rank higher.
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .total_cmp(&other.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// A max-priority queue holding at most `capacity` items.
///
/// Pushing beyond the capacity evicts the lowest-priority item.
#[derive(Debug)]
pub struct BoundedPriorityQueue<T> {
    capacity: usize,
    next_seq: u64,
    entries: BTreeMap<Key, T>,
}

impl<T> BoundedPriorityQueue<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            next_seq: 0,
            entries: BTreeMap::new(),
        }
    }

    /// Pushes an item and returns `false` if it was not retained.
    pub fn push(&mut self, priority: f64, item: T) -> bool {
        if self.capacity == 0 {
            return false;
        }
        let key = Key {
            priority,
            seq: self.next_seq,
        };
        self.next_seq += 1;
        self.entries.insert(key, item);
        if self.entries.len() > self.capacity {
            if let Some((evicted, _)) = self.entries.pop_first() {
                return evicted != key;
            }
        }
        true
    }

    /// Removes and returns the highest-priority item.
    pub fn pop(&mut self) -> Option<(f64, T)> {
        self.entries
            .pop_last()
            .map(|(key, item)| (key.priority, item))
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pop_order() {
        let mut queue = BoundedPriorityQueue::new(10);
        for (p, x) in [(1.0, 'a'), (3.0, 'b'), (-2.0, 'c'), (3.0, 'd'), (0.5, 'e')] {
            assert!(queue.push(p, x));
        }
        let popped: Vec<_> = core::iter::from_fn(|| queue.pop()).collect();
        assert_eq!(
            vec![(3.0, 'b'), (3.0, 'd'), (1.0, 'a'), (0.5, 'e'), (-2.0, 'c')],
            popped,
        );
    }

    #[test]
    fn test_eviction() {
        let mut queue = BoundedPriorityQueue::new(2);
        assert!(queue.push(1.0, 'a'));
        assert!(queue.push(2.0, 'b'));
        assert!(queue.push(3.0, 'c'));
        assert!(!queue.push(0.0, 'd'));
        assert_eq!(2, queue.len());
        assert_eq!(Some((3.0, 'c')), queue.pop());
        assert_eq!(Some((2.0, 'b')), queue.pop());
        assert_eq!(0, queue.len());
    }

    #[test]
    fn test_zero_capacity() {
        let mut queue = BoundedPriorityQueue::new(0);
        assert!(!queue.push(1.0, ()));
        assert_eq!(None, queue.pop());
    }
}
