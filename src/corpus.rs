use crate::tagging::Tagging;

/// A source of training taggings.
///
/// The trainer visits the corpus exactly once and keeps the tokens and tags
/// it needs for the epochs.
pub trait Corpus<E> {
    /// Calls `handler` on every tagging in order.
    fn visit(&self, handler: &mut dyn FnMut(&Tagging<E>));
}

impl<E> Corpus<E> for [Tagging<E>] {
    fn visit(&self, handler: &mut dyn FnMut(&Tagging<E>)) {
        for tagging in self {
            handler(tagging);
        }
    }
}

impl<E> Corpus<E> for Vec<Tagging<E>> {
    fn visit(&self, handler: &mut dyn FnMut(&Tagging<E>)) {
        self.as_slice().visit(handler);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_visit_in_order() {
        let corpus = vec![
            Tagging::new(vec!["a"], vec!["X".into()]).unwrap(),
            Tagging::new(vec!["b", "c"], vec!["Y".into(), "Z".into()]).unwrap(),
        ];
        let mut seen = vec![];
        corpus.visit(&mut |t| seen.push(t.tokens().to_vec()));
        assert_eq!(vec![vec!["a"], vec!["b", "c"]], seen);
    }
}
