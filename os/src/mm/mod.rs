//! 内存管理
//!
//! SV39三级页表的建立、页框分配与地址空间切换

mod address;
mod address_space;
mod boot;
mod error;
mod frame_allocator;
#[cfg(all(target_arch = "riscv64", target_os = "none"))]
mod kernel;
mod mapper;
mod page_table;
mod scratch;
#[cfg(test)]
pub(crate) mod test_support;

pub use address::{PPNRange, PhysAddr, PhysPageNum, VirtAddr, VirtPageNum, IDENTITY_PPN_END};
pub use address_space::{activate, AddressSpace};
pub use boot::build_kernel_space;
pub use error::{VmError, VmResult};
pub use frame_allocator::{BumpFrameAllocator, FrameAllocator};
#[cfg(all(target_arch = "riscv64", target_os = "none"))]
pub use kernel::{dump_kernel_space, init, kernel_space_test, KERNEL_MAPPER, KERNEL_SPACE};
pub use mapper::Mapper;
pub use page_table::{PTEFlags, PageTable, PageTableEntry};
pub use scratch::ScratchWindow;
