#![cfg_attr(target_os = "none", no_std)]

pub mod bit_array;
pub mod macros;
pub mod mem;
pub mod paging;
pub mod serial;
pub mod sizes;
