use std::collections::BTreeMap;

/// Holds items completed out of order until every earlier index has arrived.
pub struct ReorderBuffer<T> {
    next: usize,
    pending: BTreeMap<usize, T>,
}

impl<T> ReorderBuffer<T> {
    pub fn new(first: usize) -> Self {
        Self {
            next: first,
            pending: BTreeMap::new(),
        }
    }

    pub fn next_index(&self) -> usize {
        self.next
    }

    #[cfg(test)]
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Stores `item`; duplicates or already-released indices are returned as `Err`.
    pub fn push(&mut self, index: usize, item: T) -> Result<(), T> {
        if index < self.next || self.pending.contains_key(&index) {
            return Err(item);
        }
        self.pending.insert(index, item);
        Ok(())
    }

    /// Removes and returns the run of consecutive items starting at the next expected index.
    pub fn drain_ready(&mut self) -> Vec<T> {
        let mut ready = Vec::new();
        while let Some(item) = self.pending.remove(&self.next) {
            ready.push(item);
            self.next += 1;
        }
        ready
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn releases_in_index_order() {
        let mut buf = ReorderBuffer::new(0);
        buf.push(2, "c").unwrap();
        buf.push(1, "b").unwrap();
        assert!(buf.drain_ready().is_empty());
        assert_eq!(buf.pending(), 2);

        buf.push(0, "a").unwrap();
        assert_eq!(buf.drain_ready(), vec!["a", "b", "c"]);
        assert_eq!(buf.next_index(), 3);

        buf.push(4, "e").unwrap();
        assert!(buf.drain_ready().is_empty());
        buf.push(3, "d").unwrap();
        assert_eq!(buf.drain_ready(), vec!["d", "e"]);
    }

    #[test]
    fn rejects_stale_and_duplicate_indices() {
        let mut buf = ReorderBuffer::new(5);
        assert_eq!(buf.push(4, 'x'), Err('x'));
        buf.push(6, 'y').unwrap();
        assert_eq!(buf.push(6, 'z'), Err('z'));
        buf.push(5, 'w').unwrap();
        assert_eq!(buf.drain_ready(), vec!['w', 'y']);
        assert_eq!(buf.push(5, 'q'), Err('q'));
    }
}
