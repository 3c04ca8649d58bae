//! 内核参数

pub const PAGE_SIZE_BITS: usize = 12;
pub const PAGE_SIZE: usize = 1usize << PAGE_SIZE_BITS;

/// 临时清零窗口所在的虚拟地址
///
/// 位于内核恒等映射之外的低地址处
pub const SCRATCH_VA: usize = 0x1000;

/// 内核地址空间标识
pub const KERNEL_ASID: usize = 0;

pub use crate::board::{MEMORY_END, MMIO};
