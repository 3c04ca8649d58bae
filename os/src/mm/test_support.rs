//! 单元测试用的物理内存与处理器替身
//!
//! 页框取自宿主机上按页对齐的一块内存，页框的“物理地址”就是它在宿主机上的指针，
//! 因此[`PhysPageNum::get_pte_array`]无需改动即可使用

use super::{
    address::{PhysAddr, PhysPageNum, VirtAddr, VirtPageNum},
    mapper::Mapper,
    page_table::{PageTable, SATP_ASID_MASK, SATP_ASID_SHIFT},
};
use crate::{
    config::{PAGE_SIZE, PAGE_SIZE_BITS},
    hart::Hart,
};
use std::alloc::{alloc_zeroed, dealloc, Layout};
use std::cell::{Cell, RefCell};
use std::vec::Vec;

/// 作为页框池的一段按页对齐的宿主机内存
pub struct FrameArena {
    base: *mut u8,
    layout: Layout,
}

impl FrameArena {
    pub fn new(pages: usize) -> Self {
        let layout = Layout::from_size_align(pages * PAGE_SIZE, PAGE_SIZE).unwrap();
        let base = unsafe { alloc_zeroed(layout) };
        assert!(!base.is_null(), "宿主机内存分配失败");
        Self { base, layout }
    }

    pub fn start(&self) -> PhysPageNum {
        PhysPageNum(self.base as usize >> PAGE_SIZE_BITS)
    }

    pub fn end(&self) -> PhysPageNum {
        PhysPageNum(self.start().0 + self.layout.size() / PAGE_SIZE)
    }

    pub fn contains(&self, ppn: PhysPageNum) -> bool {
        self.start() <= ppn && ppn < self.end()
    }

    /// 以本段内存为页框池、配有新模拟处理器的映射服务
    pub fn mapper(&self) -> Mapper<SimHart> {
        let mut mapper = Mapper::new(SimHart::new());
        mapper.init_frames(self.start(), self.end());
        mapper
    }

    /// 将整段内存写脏，使清零可被观察到
    pub fn fill(&self, byte: u8) {
        unsafe { self.base.write_bytes(byte, self.layout.size()) };
    }

    pub fn fill_frame(&self, ppn: PhysPageNum, byte: u8) {
        self.frame(ppn).fill(byte);
    }

    pub fn frame_is(&self, ppn: PhysPageNum, byte: u8) -> bool {
        self.frame(ppn).iter().all(|b| *b == byte)
    }

    pub fn read_u64(&self, ppn: PhysPageNum, offset: usize) -> u64 {
        let bytes = &self.frame(ppn)[offset..offset + 8];
        u64::from_ne_bytes(bytes.try_into().unwrap())
    }

    fn frame(&self, ppn: PhysPageNum) -> &'static mut [u8] {
        assert!(self.contains(ppn), "{:?}不在页框池内", ppn);
        ppn.get_bytes_array()
    }
}

impl Drop for FrameArena {
    fn drop(&mut self) {
        unsafe { dealloc(self.base, self.layout) };
    }
}

/// 按顺序记录的[`SimHart`]寄存器写入与地址转换缓存刷新
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HartOp {
    WriteSatp(usize),
    WriteSscratch(usize),
    SfenceVma { va: Option<usize>, asid: usize },
}

#[derive(Clone, Copy)]
struct TlbEntry {
    asid: usize,
    vpn: VirtPageNum,
    ppn: PhysPageNum,
}

/// 以软件完成地址转换、按ASID缓存转换结果的处理器
///
/// 缺失或范围错误的`sfence.vma`会表现为读到过期的转换
pub struct SimHart {
    satp: Cell<usize>,
    sscratch: Cell<usize>,
    tlb: RefCell<Vec<TlbEntry>>,
    ops: RefCell<Vec<HartOp>>,
}

impl SimHart {
    pub fn new() -> Self {
        Self {
            satp: Cell::new(0),
            sscratch: Cell::new(0),
            tlb: RefCell::new(Vec::new()),
            ops: RefCell::new(Vec::new()),
        }
    }

    pub fn ops(&self) -> Vec<HartOp> {
        self.ops.borrow().clone()
    }

    pub fn sscratch(&self) -> usize {
        self.sscratch.get()
    }

    pub fn tlb_holds(&self, asid: usize, vpn: VirtPageNum) -> bool {
        self.tlb.borrow().iter().any(|e| e.asid == asid && e.vpn == vpn)
    }

    /// 像MMU一样转换`va`：先查缓存，未命中时从`satp`中的根页表查表并缓存结果
    pub fn translate(&self, va: VirtAddr) -> Option<PhysAddr> {
        let satp = self.satp.get();
        if satp >> 60 == 0 {
            return Some(PhysAddr(usize::from(va)));
        }
        let asid = (satp >> SATP_ASID_SHIFT) & SATP_ASID_MASK;
        let vpn = va.floor();
        let cached = self
            .tlb
            .borrow()
            .iter()
            .find(|e| e.asid == asid && e.vpn == vpn)
            .map(|e| e.ppn);
        let ppn = match cached {
            Some(ppn) => ppn,
            None => {
                let pte = PageTable::from_token(satp)
                    .translate(vpn)
                    .filter(|pte| pte.is_leaf())?;
                self.tlb.borrow_mut().push(TlbEntry { asid, vpn, ppn: pte.ppn() });
                pte.ppn()
            }
        };
        let pa: PhysAddr = ppn.into();
        Some(PhysAddr(pa.0 + va.page_offset()))
    }

    pub fn write_u64(&self, va: VirtAddr, value: u64) {
        let pa = self.translate(va).expect("写入未映射的地址");
        unsafe { (pa.0 as *mut u64).write(value) };
    }

    pub fn read_u64(&self, va: VirtAddr) -> Option<u64> {
        self.translate(va).map(|pa| unsafe { (pa.0 as *const u64).read() })
    }
}

impl Hart for SimHart {
    fn satp(&self) -> usize {
        self.satp.get()
    }

    fn write_satp(&self, satp: usize) {
        self.ops.borrow_mut().push(HartOp::WriteSatp(satp));
        self.satp.set(satp);
    }

    fn write_sscratch(&self, value: usize) {
        self.ops.borrow_mut().push(HartOp::WriteSscratch(value));
        self.sscratch.set(value);
    }

    fn sfence_vma(&self, va: Option<VirtAddr>, asid: usize) {
        self.ops.borrow_mut().push(HartOp::SfenceVma {
            va: va.map(|va| va.0),
            asid,
        });
        self.tlb
            .borrow_mut()
            .retain(|e| e.asid != asid || va.map_or(false, |va| e.vpn != va.floor()));
    }

    unsafe fn zero_page(&self, va: VirtAddr) {
        let pa = self.translate(va).expect("经由未映射的地址清零");
        (pa.0 as *mut u8).write_bytes(0, PAGE_SIZE);
    }
}
