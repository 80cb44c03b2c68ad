// StrainLog - Pre-trigger sample history

/// Fixed-capacity ring of the most recent samples. Once `N` items have been
/// pushed, every push overwrites the oldest entry.
pub struct CircularHistory<T: Copy + Default, const N: usize> {
    buf: [T; N],
    head: usize,
    len: usize,
}

impl<T: Copy + Default, const N: usize> CircularHistory<T, N> {
    const NON_EMPTY: () = assert!(N > 0, "CircularHistory needs a capacity of at least one");

    /// A zero capacity is rejected at compile time:
    ///
    /// ```compile_fail
    /// let _ = strainlog::history::CircularHistory::<u8, 0>::new();
    /// ```
    pub fn new() -> Self {
        let () = Self::NON_EMPTY;
        Self {
            buf: [T::default(); N],
            head: 0,
            len: 0,
        }
    }

    pub fn push(&mut self, item: T) {
        self.buf[self.head] = item;
        self.head = (self.head + 1) % N;
        if self.len < N {
            self.len += 1;
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// True once the ring has wrapped at least to capacity.
    pub fn is_filled(&self) -> bool {
        self.len == N
    }

    pub fn capacity(&self) -> usize {
        N
    }

    pub fn latest(&self) -> Option<&T> {
        if self.len == 0 {
            return None;
        }
        Some(&self.buf[(self.head + N - 1) % N])
    }

    /// Oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        let start = (self.head + N - self.len) % N;
        (0..self.len).map(move |i| &self.buf[(start + i) % N])
    }
}

impl<T: Copy + Default, const N: usize> Default for CircularHistory<T, N> {
    fn default() -> Self {
        Self::new()
    }
}
