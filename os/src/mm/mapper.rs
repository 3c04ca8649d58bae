//! 映射服务
//!
//! 页框分配、页框清零和页面映射的对外接口

use super::{
    address::{PPNRange, PhysAddr, PhysPageNum, VirtAddr, IDENTITY_PPN_END},
    error::{VmError, VmResult},
    frame_allocator::{FrameAllocator, FrameAllocatorImpl},
    page_table::PageTable,
    scratch::ScratchWindow,
};
use crate::{
    config::SCRATCH_VA,
    hart::Hart,
};
use log::*;

/// 映射服务
///
/// 唯一持有页框分配器，负责页框的发放与清零，并在给定的页表中建立映射。
/// 页框清零有两个阶段：
/// - 临时清零窗口启用前（启动阶段，地址转换尚未开启），直接经由物理地址清零
/// - 启用后，经由[`ScratchWindow`]清零
pub struct Mapper<H: Hart> {
    frames: FrameAllocatorImpl,
    scratch: Option<ScratchWindow>,
    hart: H,
}

impl<H: Hart> Mapper<H> {
    /// 创建映射服务，此时页框池为空，需调用[`Mapper::init_frames`]
    pub fn new(hart: H) -> Self {
        Self {
            frames: FrameAllocatorImpl::new(),
            scratch: None,
            hart,
        }
    }

    /// 以左闭右开区间`[l, r)`作为页框池
    pub fn init_frames(&mut self, l: PhysPageNum, r: PhysPageNum) {
        self.frames.init(l, r);
    }

    pub fn hart(&self) -> &H {
        &self.hart
    }

    /// 尚可分配的页框数
    pub fn frames_remaining(&self) -> usize {
        self.frames.remaining()
    }

    /// 分配一个物理页框，内容未定义
    pub fn alloc_frame(&mut self) -> VmResult<PhysPageNum> {
        self.frames.alloc()
    }

    /// 分配一个物理页框并保证其内容全为零
    pub fn alloc_zeroed_frame(&mut self) -> VmResult<PhysPageNum> {
        let ppn = self.frames.alloc()?;
        self.zero_frame(ppn);
        Ok(ppn)
    }

    /// 将物理页框`ppn`清零
    pub fn zero_frame(&mut self, ppn: PhysPageNum) {
        match self.scratch.as_mut() {
            Some(window) => window.zero(&self.hart, ppn),
            // 地址转换尚未开启，页框可经由物理地址直接访问
            None => ppn.get_bytes_array().fill(0),
        }
    }

    /// 分配一张空页表
    pub fn new_table(&mut self) -> VmResult<PageTable> {
        Ok(PageTable::from_frame(self.alloc_zeroed_frame()?))
    }

    /// 在`table`中将`va`所在的虚拟页映射到物理页`ppn`
    ///
    /// # 逻辑概要
    /// 1. 沿`va`的三级索引找到叶页表，缺失的中间页表按需分配并清零
    /// 2. 在叶页表中写入（或覆盖）全权限的叶子项
    ///
    /// 重复调用是安全的，后一次写入生效
    pub fn map_page(
        &mut self,
        table: &mut PageTable,
        va: VirtAddr,
        ppn: PhysPageNum,
        user_accessible: bool,
    ) -> VmResult<()> {
        let vpn = va.floor();
        let mut leaf_table = table.walk_create(vpn, || self.alloc_zeroed_frame())?;
        leaf_table.make_entry(vpn.indexes()[2], ppn, false, user_accessible);
        Ok(())
    }

    /// 分配一个清零的页框并将`va`所在的虚拟页映射到它
    ///
    /// # 返回值
    /// 新页框的物理页号
    pub fn map_fresh_page(
        &mut self,
        table: &mut PageTable,
        va: VirtAddr,
        user_accessible: bool,
    ) -> VmResult<PhysPageNum> {
        let ppn = self.alloc_zeroed_frame()?;
        self.map_page(table, va, ppn, user_accessible)?;
        Ok(ppn)
    }

    /// 恒等映射物理页号区间`[from, to)`，仅内核可访问
    ///
    /// 按物理页号升序逐页映射，虚拟地址即物理页号左移12位
    ///
    /// # 返回值
    /// 区间超出[`IDENTITY_PPN_END`]时返回[`VmError::NotIdentityMappable`]，此时不建立任何映射
    pub fn identity_map_range(
        &mut self,
        table: &mut PageTable,
        from: PhysPageNum,
        to: PhysPageNum,
    ) -> VmResult<()> {
        let range = PPNRange::new(from, to);
        if from < to && to.0 > IDENTITY_PPN_END {
            return Err(VmError::NotIdentityMappable { from, to });
        }
        trace!("identity mapping [{:?}, {:?})", from, to);
        for ppn in range {
            let pa: PhysAddr = ppn.into();
            self.map_page(table, VirtAddr(pa.0), ppn, false)?;
        }
        Ok(())
    }

    /// 为临时清零窗口在`table`中建好中间页表，叶子项留空
    ///
    /// 须在地址转换开启前调用，此时新页表仍可经由物理地址清零
    pub fn prepare_scratch(&mut self, table: &mut PageTable) -> VmResult<()> {
        let vpn = VirtAddr::from(SCRATCH_VA).floor();
        table.walk_create(vpn, || self.alloc_zeroed_frame())?;
        Ok(())
    }

    /// 在`table`已生效后启用临时清零窗口，此后所有清零都经由窗口完成
    pub fn arm_scratch(&mut self, table: &PageTable) -> VmResult<()> {
        let window = ScratchWindow::arm(&self.hart, table, VirtAddr::from(SCRATCH_VA))?;
        self.scratch = Some(window);
        Ok(())
    }

    /// 临时清零窗口的虚拟地址，未启用时返回[`None`]
    pub fn scratch_va(&self) -> Option<VirtAddr> {
        self.scratch.as_ref().map(|window| window.va())
    }
}
