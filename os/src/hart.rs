//! 处理器接口
//!
//! 地址转换相关的寄存器与指令：`satp`、`sscratch`、`sfence.vma`，
//! 以及经由当前地址转换写内存

use crate::mm::VirtAddr;

/// 一个硬件线程上与地址转换有关的操作
pub trait Hart {
    /// 读取`satp`
    fn satp(&self) -> usize;
    /// 写入`satp`
    fn write_satp(&self, satp: usize);
    /// 写入`sscratch`
    fn write_sscratch(&self, value: usize);
    /// 使地址转换缓存失效
    ///
    /// `va`为[`None`]时作用于`asid`下的所有虚拟页，否则只作用于`va`所在的一页。
    /// 全局映射不在作用范围内
    fn sfence_vma(&self, va: Option<VirtAddr>, asid: usize);
    /// 经由当前生效的地址转换，将`va`所在的一整页写为零
    ///
    /// # Safety
    /// `va`所在页必须在当前地址空间中被映射为可写，且该页上没有任何仍在使用的数据
    unsafe fn zero_page(&self, va: VirtAddr);
}

#[cfg(target_arch = "riscv64")]
pub use self::riscv64::RiscvHart;

#[cfg(target_arch = "riscv64")]
mod riscv64 {
    use super::Hart;
    use crate::{config::PAGE_SIZE, mm::VirtAddr};
    use core::arch::asm;
    use riscv::register::{satp, sscratch};

    /// 当前正在运行的硬件线程
    pub struct RiscvHart;

    impl Hart for RiscvHart {
        fn satp(&self) -> usize {
            satp::read().bits()
        }

        fn write_satp(&self, satp: usize) {
            satp::write(satp);
        }

        #[allow(unused_unsafe)]
        fn write_sscratch(&self, value: usize) {
            unsafe {
                sscratch::write(value);
            }
        }

        fn sfence_vma(&self, va: Option<VirtAddr>, asid: usize) {
            unsafe {
                match va {
                    Some(va) => asm!("sfence.vma {}, {}", in(reg) usize::from(va), in(reg) asid),
                    None => asm!("sfence.vma x0, {}", in(reg) asid),
                }
            }
        }

        unsafe fn zero_page(&self, va: VirtAddr) {
            let words = usize::from(va) as *mut u64;
            for i in 0..PAGE_SIZE / core::mem::size_of::<u64>() {
                words.add(i).write_volatile(0);
            }
        }
    }
}
