//! 页表
//!
//! SV39页表项的编解码、三级页表的遍历（按需创建中间页表）以及页表内容的诊断输出

use super::{
    address::{PhysAddr, PhysPageNum, VirtAddr, VirtPageNum, PPN_WIDTH_SV39},
    error::{VmError, VmResult},
};
use bitflags::*;
use core::fmt::{self, Write};
use log::*;

bitflags! {
    /// 页表项标志，位于页表项的低8位
    pub struct PTEFlags: u8 {
        /// 有效标志
        const V = 1 << 0;
        /// 可读标志
        const R = 1 << 1;
        /// 可写标志
        const W = 1 << 2;
        /// 可执行标志
        const X = 1 << 3;
        /// 用户态可访问标志
        const U = 1 << 4;
        const G = 1 << 5;
        /// 已被访问标志
        const A = 1 << 6;
        /// 已被修改标志
        const D = 1 << 7;
    }
}

/// 每张页表的页表项个数
pub const ENTRIES_PER_TABLE: usize = 512;
/// 页表项中物理页号字段的起始位
const PPN_SHIFT: usize = 10;
/// 物理页号字段的掩码（44位）
const PPN_MASK: usize = (1 << PPN_WIDTH_SV39) - 1;

/// `satp`中SV39模式的取值（MODE=8，位于\[63:60\]）
pub const SATP_MODE_SV39: usize = 8 << 60;
/// `satp`中ASID字段的起始位
pub const SATP_ASID_SHIFT: usize = 44;
/// `satp`中ASID字段的掩码（16位）
pub const SATP_ASID_MASK: usize = 0xffff;

/// 叶子项的权限位：R、W、X中任何一位被置上即为叶子项
const LEAF_PERMS: PTEFlags = PTEFlags::from_bits_truncate(
    PTEFlags::R.bits() | PTEFlags::W.bits() | PTEFlags::X.bits(),
);

/// 页表项
///
/// # 位布局
/// ```text
/// 63      54 53                    10 9   8 7 6 5 4 3 2 1 0
/// | 保留(0) |   PPN（44位）           | RSW | D A G U X W R V |
/// ```
/// PPN左移12位即为下一级页表或数据页框的物理地址
#[derive(Copy, Clone, PartialEq, Eq)]
#[repr(C)]
pub struct PageTableEntry {
    pub bits: usize,
}

impl fmt::Debug for PageTableEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_fmt(format_args!("PTE:{:?} {:?}", self.ppn(), self.flags()))
    }
}

impl PageTableEntry {
    /// 使用物理页号和标志位创建一个页表项
    pub fn new(ppn: PhysPageNum, flags: PTEFlags) -> Self {
        PageTableEntry {
            bits: (ppn.0 & PPN_MASK) << PPN_SHIFT | flags.bits() as usize,
        }
    }

    /// 全零（无效）的页表项
    pub const fn empty() -> Self {
        PageTableEntry { bits: 0 }
    }

    pub fn ppn(&self) -> PhysPageNum {
        PhysPageNum((self.bits >> PPN_SHIFT) & PPN_MASK)
    }

    pub fn flags(&self) -> PTEFlags {
        PTEFlags::from_bits_truncate(self.bits as u8)
    }

    pub fn is_valid(&self) -> bool {
        self.flags().contains(PTEFlags::V)
    }

    pub fn readable(&self) -> bool {
        self.flags().contains(PTEFlags::R)
    }

    pub fn writable(&self) -> bool {
        self.flags().contains(PTEFlags::W)
    }

    pub fn executable(&self) -> bool {
        self.flags().contains(PTEFlags::X)
    }

    pub fn user_accessible(&self) -> bool {
        self.flags().contains(PTEFlags::U)
    }

    /// 有效且R、W、X至少一位被置上：指向数据页框
    pub fn is_leaf(&self) -> bool {
        self.is_valid() && self.flags().intersects(LEAF_PERMS)
    }

    /// 有效且R、W、X均为零：指向下一级页表
    pub fn is_pointer(&self) -> bool {
        self.is_valid() && !self.flags().intersects(LEAF_PERMS)
    }
}

/// 一张页表（占据一个物理页框）的句柄
///
/// 根页表由[`PageTable::from_root_addr`]、[`PageTable::from_token`]或新分配的页框得到，
/// 下级页表只能经由[`PageTable::resolve_child_table`]取得。
/// 页表一经安装便不会被移动或释放，因此句柄只记录物理页号
pub struct PageTable {
    ppn: PhysPageNum,
}

impl PageTable {
    /// 将一个刚清零的页框作为页表
    pub(crate) fn from_frame(ppn: PhysPageNum) -> Self {
        Self { ppn }
    }

    /// 以物理地址`pa`处的页表作为根页表
    ///
    /// # 返回值
    /// `pa`未按页对齐时返回[`VmError::MisalignedTable`]
    pub fn from_root_addr(pa: PhysAddr) -> VmResult<Self> {
        if !pa.aligned() {
            return Err(VmError::MisalignedTable(pa));
        }
        Ok(Self { ppn: pa.floor() })
    }

    /// 从`satp`寄存器的值（低44位，物理页号部分）得到根页表，仅用于查表
    pub fn from_token(satp: usize) -> Self {
        Self {
            ppn: PhysPageNum(satp & PPN_MASK),
        }
    }

    /// 页表所在的物理页号
    pub fn ppn(&self) -> PhysPageNum {
        self.ppn
    }

    /// 以此表为根、地址空间标识为`asid`时应写入`satp`的值
    pub fn token(&self, asid: usize) -> usize {
        SATP_MODE_SV39 | (asid & SATP_ASID_MASK) << SATP_ASID_SHIFT | (self.ppn.0 & PPN_MASK)
    }

    fn entries(&self) -> &'static mut [PageTableEntry] {
        self.ppn.get_pte_array()
    }

    /// 读取第`index`项
    pub fn entry(&self, index: usize) -> PageTableEntry {
        self.entries()[index]
    }

    /// 写入第`index`项
    ///
    /// # 逻辑概要
    /// 1. 总是置上V、A、D位
    /// 2. `is_pointer_node`为假时置上R、W、X位（只支持全权限的叶子映射）
    /// 3. `user_accessible`为真时置上U位
    ///
    /// 原有内容被整体覆盖。
    ///
    /// # 返回值
    /// `ppn`所对应的物理地址
    pub fn make_entry(
        &mut self,
        index: usize,
        ppn: PhysPageNum,
        is_pointer_node: bool,
        user_accessible: bool,
    ) -> PhysAddr {
        let mut flags = PTEFlags::V | PTEFlags::A | PTEFlags::D;
        if !is_pointer_node {
            flags |= PTEFlags::R | PTEFlags::W | PTEFlags::X;
        }
        if user_accessible {
            flags |= PTEFlags::U;
        }
        self.entries()[index] = PageTableEntry::new(ppn, flags);
        ppn.into()
    }

    /// 经由第`index`项取得下一级页表
    ///
    /// # 返回值
    /// 该项无效或为叶子项时返回[`VmError::InvalidEntryAccess`]
    pub fn resolve_child_table(&self, index: usize) -> VmResult<PageTable> {
        let pte = self.entry(index);
        if !pte.is_pointer() {
            return Err(VmError::InvalidEntryAccess {
                table: self.ppn,
                index,
            });
        }
        Ok(PageTable { ppn: pte.ppn() })
    }

    /// 找到`vpn`所在的叶页表，沿途缺失的中间页表由`alloc_node`提供
    ///
    /// # 逻辑概要
    /// 1. 将`vpn`分解为三级页表的索引
    /// 2. 在根页表和中间页表中，若对应项无效，则向`alloc_node`要一个已清零的页框并安装为指针项
    /// 3. 沿指针项向下，返回最后一级页表
    ///
    /// 路径上已有的叶子项（大页）不会被跟随，而是返回[`VmError::InvalidEntryAccess`]
    pub(crate) fn walk_create<F>(&mut self, vpn: VirtPageNum, mut alloc_node: F) -> VmResult<PageTable>
    where
        F: FnMut() -> VmResult<PhysPageNum>,
    {
        let idxs = vpn.indexes();
        let mut table = PageTable { ppn: self.ppn };
        for idx in idxs.iter().take(2) {
            if !table.entry(*idx).is_valid() {
                let node = alloc_node()?;
                table.make_entry(*idx, node, true, false);
                trace!("new page table {:?} at {:?}[{}]", node, table.ppn, idx);
            }
            table = table.resolve_child_table(*idx)?;
        }
        Ok(table)
    }

    /// 查找`vpn`所在的叶页表，中间页表缺失时返回[`None`]
    pub fn leaf_table(&self, vpn: VirtPageNum) -> Option<PageTable> {
        let idxs = vpn.indexes();
        let mut table = PageTable { ppn: self.ppn };
        for idx in idxs.iter().take(2) {
            table = table.resolve_child_table(*idx).ok()?;
        }
        Some(table)
    }

    /// 查表找出`vpn`对应的最后一级页表项（可能无效）
    pub fn translate(&self, vpn: VirtPageNum) -> Option<PageTableEntry> {
        self.leaf_table(vpn)
            .map(|table| table.entry(vpn.indexes()[2]))
    }

    /// 查表将虚拟地址`va`转换为物理地址，未映射时返回[`None`]
    pub fn translate_va(&self, va: VirtAddr) -> Option<PhysAddr> {
        self.translate(va.floor())
            .filter(|pte| pte.is_leaf())
            .map(|pte| {
                let aligned_pa: PhysAddr = pte.ppn().into();
                PhysAddr(aligned_pa.0 + va.page_offset())
            })
    }

    /// 输出页表中所有有效的映射
    ///
    /// # 逻辑概要
    /// 逐级遍历三级页表，跳过无效项：
    /// - 指针项输出其下辖的虚拟地址范围，然后进入下一级
    /// - 叶子项输出其虚拟地址范围和映射到的物理地址
    ///
    /// 每一级都只从`self`出发取得下级页表
    pub fn dump(&self, out: &mut dyn Write) -> fmt::Result {
        writeln!(out, "Page Table ({:?}):", self.ppn)?;
        self.dump_level(out, 2, 0)
    }

    fn dump_level(&self, out: &mut dyn Write, level: usize, base: usize) -> fmt::Result {
        const NAMES: [&str; 3] = ["Page", "Megapage", "Gigapage"];
        let shift = 12 + 9 * level;
        let indent = 2 - level;
        for index in 0..ENTRIES_PER_TABLE {
            let pte = self.entry(index);
            if !pte.is_valid() {
                continue;
            }
            let start = base + (index << shift);
            let end = base + ((index + 1) << shift);
            for _ in 0..indent {
                out.write_str("| ")?;
            }
            write!(out, "|-{} (VPN {:#x}): {:#x}-{:#x}", NAMES[level], index, start, end)?;
            if pte.is_leaf() {
                let pa: PhysAddr = pte.ppn().into();
                writeln!(out, ": mapped to paddr {:#x}", pa.0)?;
            } else {
                writeln!(out)?;
                if level > 0 {
                    if let Ok(child) = self.resolve_child_table(index) {
                        child.dump_level(out, level - 1, start)?;
                    }
                }
            }
        }
        Ok(())
    }
}
