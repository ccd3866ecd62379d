pub const KB: usize = 1024;
pub const MB: usize = KB * KB;
pub const GB: usize = MB * KB;
pub const SECTOR_SIZE: u32 = 512;

/// Number of slots tracked by the swap bitmap: one bit for every bit of a page.
pub const SWAP_BITS: usize = 4096 << 3;
/// Length of the signature stored in the last bytes of the swap bitmap page.
pub const SWAP_SIGNATURE_LEN: usize = 4;
/// Devices smaller than this (in sectors, i.e. 100 KiB) are refused as swap.
pub const MIN_SWAP_SECTORS: u32 = 200;
