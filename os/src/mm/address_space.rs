//! 地址空间
//!
//! 一个地址空间由地址空间标识（ASID）和一张根页表组成

use super::{
    address::{PhysAddr, VirtAddr, VirtPageNum},
    error::VmResult,
    mapper::Mapper,
    page_table::{PageTable, PageTableEntry, SATP_ASID_MASK, SATP_ASID_SHIFT},
};
use crate::hart::Hart;
use log::*;

/// 地址空间
pub struct AddressSpace {
    /// 根页表，其物理页号写入`satp`寄存器后即生效
    page_table: PageTable,
    /// 地址空间标识
    asid: usize,
}

impl AddressSpace {
    /// 创建一个只有空根页表的地址空间
    pub fn new_bare<H: Hart>(mapper: &mut Mapper<H>, asid: usize) -> VmResult<Self> {
        Ok(Self {
            page_table: mapper.new_table()?,
            asid,
        })
    }

    /// 以已有的根页表构造
    pub fn from_table(page_table: PageTable, asid: usize) -> Self {
        Self { page_table, asid }
    }

    pub fn asid(&self) -> usize {
        self.asid
    }

    pub fn page_table(&self) -> &PageTable {
        &self.page_table
    }

    pub fn page_table_mut(&mut self) -> &mut PageTable {
        &mut self.page_table
    }

    /// 返回[`PageTable::token`]
    pub fn token(&self) -> usize {
        self.page_table.token(self.asid)
    }

    /// 激活地址空间，参见[`activate`]
    ///
    /// # Safety
    /// 同[`activate`]
    pub unsafe fn activate<H: Hart>(&self, hart: &H) {
        activate(hart, &self.page_table, self.asid);
    }

    /// 查表找出`vpn`对应的页表项
    ///
    /// 参见[`PageTable::translate`]
    pub fn translate(&self, vpn: VirtPageNum) -> Option<PageTableEntry> {
        self.page_table.translate(vpn)
    }

    /// 参见[`PageTable::translate_va`]
    pub fn translate_va(&self, va: VirtAddr) -> Option<PhysAddr> {
        self.page_table.translate_va(va)
    }
}

/// 切换到以`table`为根页表、标识为`asid`的地址空间
///
/// # 逻辑概要
/// 1. 由SV39模式、`asid`和根页表的物理页号拼出`satp`的值，`asid`只保留低16位
/// 2. 写入`satp`，再写入`sscratch`，供陷入入口快速取得当前内核页表
/// 3. 对`satp`中实际写入的地址空间标识执行`sfence.vma x0, asid`，只使它的地址转换缓存失效
///
/// 第3步必须在第2步之后，否则可能看到该`asid`上一次激活时残留的地址转换
///
/// # Safety
/// 调用者须保证切换之后马上要访问的所有虚拟地址（返回地址、当前栈、本函数自身的代码）
/// 在`table`中都有有效映射
pub unsafe fn activate<H: Hart>(hart: &H, table: &PageTable, asid: usize) {
    let satp = table.token(asid);
    let asid = (satp >> SATP_ASID_SHIFT) & SATP_ASID_MASK;
    hart.write_satp(satp);
    hart.write_sscratch(satp);
    hart.sfence_vma(None, asid);
    info!("activated {:?} with asid {} (satp={:#x})", table.ppn(), asid, satp);
}
