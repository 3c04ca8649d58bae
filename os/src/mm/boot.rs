//! 内核地址空间的建立顺序

use super::{
    address::PhysPageNum, address_space::AddressSpace, error::VmResult, mapper::Mapper,
    page_table::PageTable,
};
use crate::{config::KERNEL_ASID, hart::Hart};
use log::*;

/// 在`root`上建立内核地址空间并激活
///
/// # 逻辑概要
/// 1. 为临时清零窗口建好中间页表
/// 2. 逐个恒等映射`ranges`中的物理页号区间`[from, to)`
/// 3. 以[`KERNEL_ASID`]激活，然后启用临时清零窗口
///
/// # 参数
/// * `mapper` - 页框池已初始化的映射服务
/// * `root` - 空的根页表
/// * `ranges` - 须恒等映射的区间，通常为内核镜像、页框池和`MMIO`区域
///
/// 调用时地址转换必须尚未开启：1、2步新分配的页表经由物理地址清零
pub fn build_kernel_space<H, I>(
    mapper: &mut Mapper<H>,
    mut root: PageTable,
    ranges: I,
) -> VmResult<AddressSpace>
where
    H: Hart,
    I: IntoIterator<Item = (PhysPageNum, PhysPageNum)>,
{
    mapper.prepare_scratch(&mut root)?;
    for (from, to) in ranges {
        mapper.identity_map_range(&mut root, from, to)?;
    }
    let space = AddressSpace::from_table(root, KERNEL_ASID);
    unsafe { space.activate(mapper.hart()) };
    mapper.arm_scratch(space.page_table())?;
    info!(
        "kernel address space active, {} frames left",
        mapper.frames_remaining()
    );
    Ok(space)
}
