//! 临时清零窗口
//!
//! 清零一个新分配的页框需要一个能写到它的虚拟地址，而为它建立映射本身又可能需要
//! 分配并清零新的页表。这里借用一个固定的虚拟页：启动时预先为它建好中间页表，
//! 之后每次清零只需改写它的叶子项，再经由这个虚拟页写零

use super::{
    address::{PhysPageNum, VirtAddr},
    error::{VmError, VmResult},
    page_table::{PageTable, SATP_ASID_MASK, SATP_ASID_SHIFT, SATP_MODE_SV39},
};
use crate::hart::Hart;
use log::*;

/// 已启用的临时清零窗口
pub struct ScratchWindow {
    /// 窗口所在的虚拟页
    va: VirtAddr,
    /// 窗口叶子项所在的页表
    leaf_table: PageTable,
    /// 叶子项下标
    index: usize,
    /// 持有窗口的地址空间标识
    asid: usize,
}

impl ScratchWindow {
    /// 检查前提条件并启用窗口
    ///
    /// 只在启动时检查一次：`table`必须是当前生效的页表，且`va`的中间页表都已存在。
    /// 此后的清零操作不再重复检查。窗口归属于`satp`中当前的地址空间标识
    pub fn arm<H: Hart>(hart: &H, table: &PageTable, va: VirtAddr) -> VmResult<Self> {
        let satp = hart.satp();
        if satp & (0xf << 60) != SATP_MODE_SV39 || PageTable::from_token(satp).ppn() != table.ppn() {
            return Err(VmError::ScratchNotActive {
                expected: table.ppn(),
                satp,
            });
        }
        let vpn = va.floor();
        let leaf_table = table
            .leaf_table(vpn)
            .ok_or(VmError::ScratchPathMissing(va))?;
        info!("scratch window armed at {:?}", va);
        Ok(Self {
            va: vpn.into(),
            leaf_table,
            index: vpn.indexes()[2],
            asid: (satp >> SATP_ASID_SHIFT) & SATP_ASID_MASK,
        })
    }

    /// 窗口所在的虚拟地址
    pub fn va(&self) -> VirtAddr {
        self.va
    }

    /// 经由窗口将物理页`ppn`清零
    ///
    /// # 逻辑概要
    /// 1. 将窗口的叶子项改写为指向`ppn`
    /// 2. 使窗口这一页的旧地址转换失效
    /// 3. 经由窗口的虚拟地址写零
    pub fn zero<H: Hart>(&mut self, hart: &H, ppn: PhysPageNum) {
        self.leaf_table.make_entry(self.index, ppn, false, false);
        hart.sfence_vma(Some(self.va), self.asid);
        unsafe { hart.zero_page(self.va) };
    }
}
