//! 内存管理错误
//!
//! 这些错误都不可重试，启动流程遇到它们即打印诊断信息并停机

use super::address::{PhysAddr, PhysPageNum, VirtAddr};
use core::fmt::{self, Display, Formatter};

/// 内存管理错误
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum VmError {
    /// 页框计数器已到达物理内存上界
    OutOfPhysicalMemory {
        /// 不可分配的第一个物理页号
        end: PhysPageNum,
    },
    /// 试图经由无效项或叶子项取得下一级页表
    InvalidEntryAccess {
        /// 所在页表
        table: PhysPageNum,
        /// 页表项下标
        index: usize,
    },
    /// 页表地址未按页对齐
    MisalignedTable(PhysAddr),
    /// 物理页号区间无法被恒等映射（其虚拟地址会被符号扩展）
    NotIdentityMappable {
        from: PhysPageNum,
        to: PhysPageNum,
    },
    /// 临时清零窗口所在虚拟页缺少中间页表
    ScratchPathMissing(VirtAddr),
    /// 启用临时清零窗口时，当前生效的不是持有该窗口的页表
    ScratchNotActive {
        /// 持有窗口的根页表
        expected: PhysPageNum,
        /// `satp`寄存器的值
        satp: usize,
    },
}

impl Display for VmError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            VmError::OutOfPhysicalMemory { end } => {
                write!(f, "out of physical memory (frame pool ends at {:?})", end)
            }
            VmError::InvalidEntryAccess { table, index } => write!(
                f,
                "entry {} of table {:?} is not a valid pointer node",
                index, table
            ),
            VmError::MisalignedTable(pa) => write!(f, "page table at {:?} is not frame-aligned", pa),
            VmError::NotIdentityMappable { from, to } => write!(
                f,
                "[{:?}, {:?}) lies beyond the identity-mappable range",
                from, to
            ),
            VmError::ScratchPathMissing(va) => {
                write!(f, "scratch page {:?} has no intermediate tables", va)
            }
            VmError::ScratchNotActive { expected, satp } => write!(
                f,
                "scratch window table {:?} is not active (satp={:#x})",
                expected, satp
            ),
        }
    }
}

/// 内存管理操作的返回值
pub type VmResult<T> = Result<T, VmError>;
