#![cfg_attr(target_os = "none", no_std)]

pub mod block;
pub mod mem;
pub mod swapping;
pub mod sync;
pub mod system;

extern crate alloc;
