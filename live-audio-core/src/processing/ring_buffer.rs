/// Fixed-capacity circular buffer.
///
/// Wrap in `Arc<parking_lot::Mutex<RingBuffer<T>>>` for cross-thread access.
///
/// Overflow behavior: drops oldest elements.
#[derive(Debug)]
pub struct RingBuffer<T> {
    buffer: Vec<T>,
    write_index: usize,
    read_index: usize,
    available: usize,
    capacity: usize,
}

impl<T: Copy + Default> RingBuffer<T> {
    /// A zero capacity is bumped to one so indexing stays valid.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            buffer: vec![T::default(); capacity],
            write_index: 0,
            read_index: 0,
            available: 0,
            capacity,
        }
    }

    /// Append elements.
    ///
    /// If the buffer overflows, the oldest elements are dropped and the number
    /// dropped is returned. If `items` is larger than capacity, only the last
    /// `capacity` items are kept.
    pub fn write(&mut self, items: &[T]) -> usize {
        if items.is_empty() {
            return 0;
        }

        let mut dropped = 0;
        let items = if items.len() > self.capacity {
            dropped += items.len() - self.capacity;
            &items[items.len() - self.capacity..]
        } else {
            items
        };

        let overflow = (self.available + items.len()).saturating_sub(self.capacity);
        if overflow > 0 {
            self.read_index = (self.read_index + overflow) % self.capacity;
            self.available -= overflow;
            dropped += overflow;
        }

        for &item in items {
            self.buffer[self.write_index] = item;
            self.write_index = (self.write_index + 1) % self.capacity;
        }
        self.available += items.len();
        dropped
    }

    /// Read and remove up to `count` elements.
    pub fn read(&mut self, count: usize) -> Vec<T> {
        let to_read = count.min(self.available);
        if to_read == 0 {
            return Vec::new();
        }

        let mut result = Vec::with_capacity(to_read);
        for i in 0..to_read {
            result.push(self.buffer[(self.read_index + i) % self.capacity]);
        }
        self.read_index = (self.read_index + to_read) % self.capacity;
        self.available -= to_read;
        result
    }

    /// Read exactly `count` elements, or nothing if fewer are buffered.
    pub fn read_exact(&mut self, count: usize) -> Option<Vec<T>> {
        if count == 0 || self.available < count {
            return None;
        }
        Some(self.read(count))
    }

    pub fn count(&self) -> usize {
        self.available
    }

    pub fn is_empty(&self) -> bool {
        self.available == 0
    }

    pub fn reset(&mut self) {
        self.write_index = 0;
        self.read_index = 0;
        self.available = 0;
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_write_read() {
        let mut buf = RingBuffer::<u8>::new(10);
        assert_eq!(buf.write(&[1, 2, 3]), 0);

        assert_eq!(buf.count(), 3);
        assert_eq!(buf.read(3), vec![1, 2, 3]);
        assert!(buf.is_empty());
    }

    #[test]
    fn overflow_drops_oldest_and_reports_it() {
        let mut buf = RingBuffer::<u8>::new(4);
        buf.write(&[1, 2, 3, 4]);
        assert_eq!(buf.write(&[5, 6]), 2);

        assert_eq!(buf.count(), 4);
        assert_eq!(buf.read(4), vec![3, 4, 5, 6]);
    }

    #[test]
    fn write_larger_than_capacity_keeps_tail() {
        let mut buf = RingBuffer::<u8>::new(3);
        assert_eq!(buf.write(&[1, 2, 3, 4, 5]), 2);

        assert_eq!(buf.read(3), vec![3, 4, 5]);
    }

    #[test]
    fn wraparound() {
        let mut buf = RingBuffer::<i16>::new(4);

        buf.write(&[1, 2, 3]);
        buf.read(2);
        buf.write(&[4, 5, 6]);

        assert_eq!(buf.count(), 4);
        assert_eq!(buf.read(4), vec![3, 4, 5, 6]);
    }

    #[test]
    fn read_exact_waits_for_a_full_chunk() {
        let mut buf = RingBuffer::<u8>::new(8);
        buf.write(&[1, 2, 3]);

        assert_eq!(buf.read_exact(4), None);
        assert_eq!(buf.count(), 3);

        buf.write(&[4, 5]);
        assert_eq!(buf.read_exact(4), Some(vec![1, 2, 3, 4]));
        assert_eq!(buf.count(), 1);
        assert_eq!(buf.read_exact(0), None);
    }

    #[test]
    fn reset_and_zero_capacity() {
        let mut buf = RingBuffer::<u8>::new(0);
        assert_eq!(buf.capacity(), 1);

        buf.write(&[7, 8]);
        assert_eq!(buf.read(1), vec![8]);

        buf.write(&[9]);
        buf.reset();
        assert!(buf.is_empty());
        assert!(buf.read(10).is_empty());
    }
}
