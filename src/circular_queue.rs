use std::collections::VecDeque;

/// Fixed-capacity ring buffer; pushing into a full queue evicts the oldest item.
///
/// Items are kept newest-first, so `nth_newest(0)` is the latest push and
/// `asc_iter` walks oldest to newest.
#[derive(Debug, Clone)]
pub struct CircularQueue<T> {
    items: VecDeque<T>,
    limit: usize,
}

impl<T> CircularQueue<T> {
    /// A zero capacity is bumped to one so the newest item is always retained.
    pub fn with_capacity(limit: usize) -> Self {
        let limit = limit.max(1);

        Self {
            items: VecDeque::with_capacity(limit),
            limit,
        }
    }

    /// Returns the evicted item, if any.
    pub fn push(&mut self, item: T) -> Option<T> {
        let evicted = if self.items.len() == self.limit {
            self.items.pop_back()
        } else {
            None
        };
        self.items.push_front(item);

        evicted
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[inline]
    pub fn newest(&self) -> Option<&T> {
        self.items.front()
    }

    #[inline]
    pub fn oldest(&self) -> Option<&T> {
        self.items.back()
    }

    /// `n = 0` is the newest item, `n = len - 1` the oldest.
    #[inline]
    pub fn nth_newest(&self, n: usize) -> Option<&T> {
        self.items.get(n)
    }

    pub fn asc_iter(&self) -> impl Iterator<Item = &'_ T> {
        self.items.iter().rev()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evicts_oldest_when_full() {
        let mut q = CircularQueue::with_capacity(3);

        assert_eq!(q.push(1), None);
        assert_eq!(q.push(2), None);
        assert_eq!(q.push(3), None);

        assert_eq!(q.push(4), Some(1));
        assert_eq!(q.len(), 3);
        assert_eq!(q.asc_iter().copied().collect::<Vec<_>>(), vec![2, 3, 4]);
    }

    #[test]
    fn indexes_from_newest() {
        let mut q = CircularQueue::with_capacity(4);
        for i in 0..6 {
            q.push(i);
        }

        assert_eq!(q.newest(), Some(&5));
        assert_eq!(q.oldest(), Some(&2));
        assert_eq!(q.nth_newest(1), Some(&4));
        assert_eq!(q.nth_newest(3), Some(&2));
        assert_eq!(q.nth_newest(4), None);
    }

    #[test]
    fn zero_capacity_keeps_latest() {
        let mut q = CircularQueue::with_capacity(0);
        q.push('a');
        assert_eq!(q.push('b'), Some('a'));
        assert_eq!(q.len(), 1);
        assert_eq!(q.newest(), Some(&'b'));
    }
}
