//! Bit operations over byte slices, numbered the way the x86 `bt` family
//! numbers them: bit `n` lives in byte `n / 8` at position `n % 8`.
//!
//! The test-and-modify operations return the previous value of the bit.

pub struct BitArray<'a>(pub &'a mut [u8]);

impl BitArray<'_> {
    /// Number of addressable bits.
    pub const fn len(&self) -> usize {
        self.0.len() * 8
    }

    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, idx: usize) -> bool {
        get(self.0, idx)
    }

    pub fn test_and_set(&mut self, idx: usize) -> bool {
        let old = self.get(idx);
        self.0[idx / 8] |= 1 << (idx % 8);
        old
    }

    pub fn test_and_clear(&mut self, idx: usize) -> bool {
        let old = self.get(idx);
        self.0[idx / 8] &= !(1 << (idx % 8));
        old
    }
}

pub fn get(bytes: &[u8], idx: usize) -> bool {
    (bytes[idx / 8] >> (idx % 8)) & 1 != 0
}
