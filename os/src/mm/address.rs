//! 地址与页号
//!
//! SV39下的物理/虚拟地址和物理/虚拟页号，以及它们之间的换算

use super::page_table::{PageTableEntry, ENTRIES_PER_TABLE};
use crate::config::{PAGE_SIZE, PAGE_SIZE_BITS};
use core::fmt::{self, Debug, Formatter};

/// SV39物理地址宽度
const PA_WIDTH_SV39: usize = 56;
/// SV39物理页号宽度，即页表项中PPN字段的44位
pub const PPN_WIDTH_SV39: usize = PA_WIDTH_SV39 - PAGE_SIZE_BITS;
/// SV39虚拟地址宽度
const VA_WIDTH_SV39: usize = 39;
/// 每级页表索引的位数
const INDEX_BITS: usize = 9;

/// 可被恒等映射的物理页号上界（不含）
///
/// 恒等映射要求虚拟地址等于物理地址，而第38位为1的虚拟地址会被符号扩展，
/// 因此只有低256GiB能被恒等映射
pub const IDENTITY_PPN_END: usize = 1 << (VA_WIDTH_SV39 - 1 - PAGE_SIZE_BITS);

macro_rules! sv39_word {
    ($(#[$attr:meta])* $name:ident, $tag:literal) => {
        $(#[$attr])*
        #[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq)]
        pub struct $name(pub usize);

        impl Debug for $name {
            fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
                write!(f, concat!($tag, ":{:#x}"), self.0)
            }
        }
    };
}

sv39_word!(
    /// 物理地址
    PhysAddr,
    "PA"
);
sv39_word!(
    /// 虚拟地址，只保存低39位
    VirtAddr,
    "VA"
);
sv39_word!(
    /// 物理页号
    PhysPageNum,
    "PPN"
);
sv39_word!(
    /// 虚拟页号
    VirtPageNum,
    "VPN"
);

impl From<usize> for PhysAddr {
    fn from(v: usize) -> Self {
        Self(v & ((1 << PA_WIDTH_SV39) - 1))
    }
}

impl From<usize> for VirtAddr {
    /// 高25位被丢弃，转回`usize`时按第38位补齐
    fn from(v: usize) -> Self {
        Self(v & ((1 << VA_WIDTH_SV39) - 1))
    }
}

impl From<VirtAddr> for usize {
    fn from(v: VirtAddr) -> Self {
        let sign = 1 << (VA_WIDTH_SV39 - 1);
        // 按第38位符号扩展
        (v.0 ^ sign).wrapping_sub(sign)
    }
}

impl From<PhysPageNum> for PhysAddr {
    fn from(v: PhysPageNum) -> Self {
        Self(v.0 << PAGE_SIZE_BITS)
    }
}

impl From<VirtPageNum> for VirtAddr {
    fn from(v: VirtPageNum) -> Self {
        Self(v.0 << PAGE_SIZE_BITS)
    }
}

impl PhysAddr {
    /// 所在物理页号（向下取整）
    pub fn floor(&self) -> PhysPageNum {
        PhysPageNum(self.0 >> PAGE_SIZE_BITS)
    }

    /// 向上取整到物理页号
    pub fn ceil(&self) -> PhysPageNum {
        PhysPageNum((self.0 + PAGE_SIZE - 1) >> PAGE_SIZE_BITS)
    }

    pub fn aligned(&self) -> bool {
        self.0 & (PAGE_SIZE - 1) == 0
    }
}

impl VirtAddr {
    pub fn page_offset(&self) -> usize {
        self.0 & (PAGE_SIZE - 1)
    }

    /// 所在虚拟页号
    pub fn floor(&self) -> VirtPageNum {
        VirtPageNum(self.0 >> PAGE_SIZE_BITS)
    }
}

impl PhysPageNum {
    /// 将此物理页视为一张页表
    ///
    /// 要求此物理页能以其物理地址直接访问：分页尚未开启，或页框池已被恒等映射
    pub fn get_pte_array(&self) -> &'static mut [PageTableEntry] {
        let pa = PhysAddr::from(*self).0 as *mut PageTableEntry;
        unsafe { core::slice::from_raw_parts_mut(pa, ENTRIES_PER_TABLE) }
    }

    /// 以字节数组的形式返回整个物理页，访问条件同[`PhysPageNum::get_pte_array`]
    pub fn get_bytes_array(&self) -> &'static mut [u8] {
        let pa = PhysAddr::from(*self).0 as *mut u8;
        unsafe { core::slice::from_raw_parts_mut(pa, PAGE_SIZE) }
    }
}

impl VirtPageNum {
    /// 拆分为三级页表的索引
    ///
    /// 依次为根页表（VA\[38:30\]）、中间页表（VA\[29:21\]）和叶页表（VA\[20:12\]）的下标
    pub fn indexes(&self) -> [usize; 3] {
        let index = |level: usize| (self.0 >> (INDEX_BITS * level)) & (ENTRIES_PER_TABLE - 1);
        [index(2), index(1), index(0)]
    }
}

/// 物理页号区间（左闭右开），按升序逐页遍历
#[derive(Copy, Clone, Debug)]
pub struct PPNRange {
    next: PhysPageNum,
    end: PhysPageNum,
}

impl PPNRange {
    pub fn new(start: PhysPageNum, end: PhysPageNum) -> Self {
        assert!(start <= end, "start {:?} > end {:?}!", start, end);
        Self { next: start, end }
    }
}

impl Iterator for PPNRange {
    type Item = PhysPageNum;

    fn next(&mut self) -> Option<PhysPageNum> {
        if self.next == self.end {
            return None;
        }
        let ppn = self.next;
        self.next.0 += 1;
        Some(ppn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indexes_split_va_into_three_levels() {
        let va = VirtAddr::from((3 << 30) | (5 << 21) | (7 << 12) | 0x123);
        assert_eq!(va.floor().indexes(), [3, 5, 7]);
        assert_eq!(VirtAddr::from(0x4000_0000).floor().indexes(), [1, 0, 0]);
        assert_eq!(VirtAddr::from(0x1000).floor().indexes(), [0, 0, 1]);
        assert_eq!(VirtPageNum((1 << 27) - 1).indexes(), [511, 511, 511]);
    }

    #[test]
    fn high_half_addresses_are_sign_extended() {
        let va = VirtAddr::from(usize::MAX - PAGE_SIZE + 1);
        assert_eq!(va.0, (1 << VA_WIDTH_SV39) - PAGE_SIZE);
        assert_eq!(usize::from(va), usize::MAX - PAGE_SIZE + 1);
        assert_eq!(usize::from(VirtAddr::from(0x8020_0000)), 0x8020_0000);
        assert_eq!(usize::from(VirtAddr((1 << 38) - 1)), (1 << 38) - 1);
    }

    #[test]
    fn page_rounding() {
        let pa = PhysAddr::from(0x8020_0001);
        assert_eq!(pa.floor(), PhysPageNum(0x80200));
        assert_eq!(pa.ceil(), PhysPageNum(0x80201));
        assert!(!pa.aligned());
        assert!(PhysAddr::from(PhysPageNum(0x80200)).aligned());
        assert_eq!(VirtAddr(0x4000_0abc).page_offset(), 0xabc);
    }

    #[test]
    fn ppn_range_is_half_open_and_ascending() {
        let ppns: std::vec::Vec<PhysPageNum> = PPNRange::new(PhysPageNum(4), PhysPageNum(7)).collect();
        assert_eq!(ppns, [PhysPageNum(4), PhysPageNum(5), PhysPageNum(6)]);
        assert_eq!(PPNRange::new(PhysPageNum(3), PhysPageNum(3)).count(), 0);
    }

    #[test]
    fn physical_addresses_keep_56_bits() {
        assert_eq!(PhysAddr::from(usize::MAX).floor().0, (1 << PPN_WIDTH_SV39) - 1);
    }
}
