/// Fixed-capacity slot pool with a free bitmask. Never allocates after
/// construction; `N` is limited to 64 slots.
#[derive(Debug, Clone)]
pub struct BufferPool<T: Copy + Default, const N: usize> {
    slots: [T; N],
    used: u64,
}

impl<T: Copy + Default, const N: usize> BufferPool<T, N> {
    const CAPACITY_FITS_MASK: () = assert!(N > 0 && N <= 64, "pool capacity must be in 1..=64");

    const FULL: u64 = if N == 64 { u64::MAX } else { (1u64 << N) - 1 };

    #[must_use]
    pub fn new() -> Self {
        #[allow(clippy::let_unit_value)]
        let () = Self::CAPACITY_FITS_MASK;
        Self {
            slots: [T::default(); N],
            used: 0,
        }
    }

    #[must_use]
    pub const fn capacity(&self) -> usize {
        N
    }

    #[must_use]
    pub fn in_use(&self) -> usize {
        self.used.count_ones() as usize
    }

    #[must_use]
    pub fn is_full(&self) -> bool {
        self.used == Self::FULL
    }

    /// Stores `item` in the lowest free slot. Hands the item back when full.
    pub fn acquire(&mut self, item: T) -> Result<usize, T> {
        let free = !self.used & Self::FULL;
        if free == 0 {
            return Err(item);
        }
        let index = free.trailing_zeros() as usize;
        self.slots[index] = item;
        self.used |= 1 << index;
        Ok(index)
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&T> {
        (index < N && self.used & (1 << index) != 0).then(|| &self.slots[index])
    }

    pub fn release(&mut self, index: usize) -> Option<T> {
        let item = self.get(index).copied()?;
        self.used &= !(1 << index);
        Some(item)
    }

    /// Releases every occupied slot in index order.
    pub fn drain(&mut self, mut f: impl FnMut(T)) {
        for index in 0..N {
            if let Some(item) = self.release(index) {
                f(item);
            }
        }
    }
}

impl<T: Copy + Default, const N: usize> Default for BufferPool<T, N> {
    fn default() -> Self {
        Self::new()
    }
}
