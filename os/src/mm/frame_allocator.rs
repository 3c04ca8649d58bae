//! 页框分配器
//!
//! 从内核镜像结束处到物理内存上界的一段空间中逐个发放物理页框

use super::{
    address::{PhysPageNum, PPN_WIDTH_SV39},
    error::{VmError, VmResult},
};
use log::*;

/// 页框分配器接口
pub trait FrameAllocator {
    fn new() -> Self;
    /// 分配一个物理页
    fn alloc(&mut self) -> VmResult<PhysPageNum>;
    /// 尚可分配的物理页数
    fn remaining(&self) -> usize;
}

/// 单调递增的页框分配器
///
/// 发放过的页框不会被回收，也不会被再次发放。
/// 全局只应有一个实例，且不提供任何同步：多核并发分配需要调用者在外部加锁
pub struct BumpFrameAllocator {
    /// 下一个将被发放的物理页号
    current: usize,
    /// 物理页号上界（不含）
    end: usize,
}

impl FrameAllocator for BumpFrameAllocator {
    fn new() -> Self {
        Self { current: 0, end: 0 }
    }

    /// 分配一个物理页
    ///
    /// # 返回值
    /// 计数器已到达上界时返回[`VmError::OutOfPhysicalMemory`]，且之后的每次分配都会失败
    fn alloc(&mut self) -> VmResult<PhysPageNum> {
        if self.current >= self.end {
            error!("frame pool exhausted at {:?}", PhysPageNum(self.end));
            return Err(VmError::OutOfPhysicalMemory {
                end: PhysPageNum(self.end),
            });
        }
        self.current += 1;
        Ok(PhysPageNum(self.current - 1))
    }

    fn remaining(&self) -> usize {
        self.end.saturating_sub(self.current)
    }
}

impl BumpFrameAllocator {
    /// 初始化页框分配器
    ///
    /// # 参数
    /// * `l` - 第一个可用物理页号，通常为内核镜像结束处（上取整）
    /// * `r` - 可用物理页号上界（不含）
    pub fn init(&mut self, l: PhysPageNum, r: PhysPageNum) {
        assert!(l <= r, "frame pool {:?} > {:?}", l, r);
        assert!(r.0 <= 1 << PPN_WIDTH_SV39, "frame pool end {:?} beyond Sv39", r);
        self.current = l.0;
        self.end = r.0;
        debug!("frame pool [{:?}, {:?}), {} frames", l, r, self.remaining());
    }
}

/// 实现了[页框分配器](FrameAllocator)的类
pub type FrameAllocatorImpl = BumpFrameAllocator;
