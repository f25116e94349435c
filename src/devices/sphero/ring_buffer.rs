//! Fixed-capacity byte ring for the receive framer
//!
//! Provides O(1) consume operations instead of O(n) Vec::drain().

/// Fixed-capacity ring buffer with O(1) advance
///
/// Generic const parameter `N` sets buffer capacity.
pub struct RingBuffer<const N: usize = 1024> {
    data: [u8; N],
    head: usize, // Write position (next empty slot)
    tail: usize, // Read position (first valid byte)
    len: usize,  // Number of bytes available
}

impl<const N: usize> RingBuffer<N> {
    /// Create a new empty ring buffer
    pub const fn new() -> Self {
        Self {
            data: [0u8; N],
            head: 0,
            tail: 0,
            len: 0,
        }
    }

    /// Append bytes to the buffer
    ///
    /// Returns how many bytes did not fit and were dropped.
    #[inline]
    pub fn extend(&mut self, bytes: &[u8]) -> usize {
        let room = N - self.len;
        let take = bytes.len().min(room);
        for &b in &bytes[..take] {
            self.data[self.head] = b;
            self.head = (self.head + 1) % N;
        }
        self.len += take;
        bytes.len() - take
    }

    /// Consume n bytes from the front
    #[inline]
    pub fn advance(&mut self, n: usize) {
        let n = n.min(self.len);
        self.tail = (self.tail + n) % N;
        self.len -= n;
    }

    /// Number of bytes available to read
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Read byte at logical index (handles wraparound)
    #[inline]
    pub fn get(&self, index: usize) -> Option<u8> {
        if index < self.len {
            Some(self.data[(self.tail + index) % N])
        } else {
            None
        }
    }

    /// First offset `i` where `matches(self[i], self[i + 1])` holds
    pub fn find_pair<F>(&self, matches: F) -> Option<usize>
    where
        F: Fn(u8, u8) -> bool,
    {
        if self.len < 2 {
            return None;
        }
        (0..self.len - 1).find(|&i| {
            matches(
                self.data[(self.tail + i) % N],
                self.data[(self.tail + i + 1) % N],
            )
        })
    }

    /// Copy `len` bytes starting at logical `start` into `out`
    ///
    /// Returns `false` (leaving `out` untouched) if the range is not buffered.
    pub fn copy_to(&self, start: usize, out: &mut [u8]) -> bool {
        if start + out.len() > self.len {
            return false;
        }
        for (i, slot) in out.iter_mut().enumerate() {
            *slot = self.data[(self.tail + start + i) % N];
        }
        true
    }

    /// Owned copy of `len` bytes starting at logical `start`
    pub fn to_vec(&self, start: usize, len: usize) -> Option<Vec<u8>> {
        let mut out = vec![0u8; len];
        self.copy_to(start, &mut out).then_some(out)
    }
}

impl<const N: usize> Default for RingBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}
