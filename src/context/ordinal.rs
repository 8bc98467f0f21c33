/// Position of the executing assertion across nested policy inclusion.
///
/// `prefix` is fixed when a child context is created (the parent's assertion
/// number at that moment). The stack holds this context's own pushes and is
/// only allocated once something is pushed.
#[derive(Debug, Default)]
pub(crate) struct OrdinalPath {
    prefix: Vec<u32>,
    stack: Option<Vec<u32>>,
}

impl OrdinalPath {
    pub(crate) fn with_prefix(prefix: Vec<u32>) -> Self {
        Self {
            prefix,
            stack: None,
        }
    }

    pub(crate) fn push(&mut self, ordinal: u32) {
        self.stack.get_or_insert_with(Vec::new).push(ordinal);
    }

    /// # Panics
    ///
    /// Panics if nothing was pushed in this context. The prefix inherited from a
    /// parent can not be popped.
    pub(crate) fn pop(&mut self) -> u32 {
        match self.stack.as_mut().and_then(Vec::pop) {
            Some(ordinal) => ordinal,
            None => panic!("pop of empty assertion ordinal path"),
        }
    }

    pub(crate) fn prefix(&self) -> &[u32] {
        &self.prefix
    }

    /// Prefix followed by the stack, oldest first.
    pub(crate) fn path(&self) -> Vec<u32> {
        let mut path = self.prefix.clone();
        if let Some(stack) = &self.stack {
            path.extend_from_slice(stack);
        }
        path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stack_is_lazily_allocated() {
        let path = OrdinalPath::default();
        assert!(path.stack.is_none());
        assert!(path.path().is_empty());
    }

    #[test]
    fn push_and_pop_balance() {
        let mut path = OrdinalPath::default();
        path.push(3);
        path.push(1);
        assert_eq!(path.path(), vec![3, 1]);
        assert_eq!(path.pop(), 1);
        assert_eq!(path.pop(), 3);
        assert!(path.path().is_empty());
    }

    #[test]
    fn prefix_comes_first() {
        let mut path = OrdinalPath::with_prefix(vec![1, 2]);
        path.push(4);
        assert_eq!(path.path(), vec![1, 2, 4]);
        assert_eq!(path.prefix(), &[1, 2]);
    }

    #[test]
    #[should_panic(expected = "pop of empty assertion ordinal path")]
    fn pop_of_empty_path_panics() {
        OrdinalPath::default().pop();
    }

    #[test]
    #[should_panic(expected = "pop of empty assertion ordinal path")]
    fn prefix_cannot_be_popped() {
        OrdinalPath::with_prefix(vec![5]).pop();
    }
}
