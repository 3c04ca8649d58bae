//! 内核地址空间
//!
//! 启动时建立内核页表并开启SV39分页

use super::{
    address::{PhysAddr, VirtAddr},
    address_space::AddressSpace,
    boot::build_kernel_space,
    error::VmResult,
    mapper::Mapper,
    page_table::{PageTable, PageTableEntry, ENTRIES_PER_TABLE},
};
use crate::{
    config::{MEMORY_END, MMIO, PAGE_SIZE},
    hart::{Hart, RiscvHart},
    sync::UPSafeCell,
};
use core::fmt::{self, Write};
use lazy_static::lazy_static;
use log::*;

extern "C" {
    fn stext();
    fn ekernel();
}

/// 内核根页表，由链接脚本放在`.bss`中并按页对齐
#[repr(C, align(4096))]
struct RootTable([PageTableEntry; ENTRIES_PER_TABLE]);

static mut KERNEL_PT: RootTable = RootTable([PageTableEntry::empty(); ENTRIES_PER_TABLE]);

lazy_static! {
    /// 全局映射服务，唯一持有页框分配器
    pub static ref KERNEL_MAPPER: UPSafeCell<Mapper<RiscvHart>> =
        UPSafeCell::new(Mapper::new(RiscvHart));
    /// 内核地址空间，[`init`]之后才存在
    pub static ref KERNEL_SPACE: UPSafeCell<Option<AddressSpace>> = UPSafeCell::new(None);
}

/// 建立内核地址空间并开启分页
///
/// # 逻辑概要
/// 1. 将内核结束（上取整）到[`MEMORY_END`]（下取整）交给页框分配器
/// 2. 以`.bss`中的[`KERNEL_PT`]为根页表，恒等映射内核镜像、页框池和`MMIO`区域并激活，
///    参见[`build_kernel_space`]
pub fn init() -> VmResult<()> {
    let mut mapper = KERNEL_MAPPER.exclusive_access();
    let kernel_start = PhysAddr::from(stext as usize).floor();
    let kernel_end = PhysAddr::from(ekernel as usize).ceil();
    let memory_end = PhysAddr::from(MEMORY_END).floor();
    mapper.init_frames(kernel_end, memory_end);

    #[allow(unused_unsafe)]
    let root = unsafe { core::ptr::addr_of!(KERNEL_PT) } as usize;
    let root = PageTable::from_root_addr(PhysAddr::from(root))?;
    let mmio = MMIO.iter().map(|&(base, size)| {
        (PhysAddr::from(base).floor(), PhysAddr::from(base + size).ceil())
    });
    let ranges = [(kernel_start, kernel_end), (kernel_end, memory_end)]
        .into_iter()
        .chain(mmio);
    let space = build_kernel_space(&mut *mapper, root, ranges)?;
    *KERNEL_SPACE.exclusive_access() = Some(space);
    Ok(())
}

/// 输出内核页表的内容
pub fn dump_kernel_space(out: &mut dyn Write) -> fmt::Result {
    match KERNEL_SPACE.exclusive_access().as_ref() {
        Some(space) => space.page_table().dump(out),
        None => writeln!(out, "kernel address space not built"),
    }
}

/// 检查分页开启后内核地址空间的基本性质
pub fn kernel_space_test() -> VmResult<()> {
    let mut mapper = KERNEL_MAPPER.exclusive_access();
    let mut kernel_space = KERNEL_SPACE.exclusive_access();
    let Some(space) = kernel_space.as_mut() else {
        panic!("kernel_space_test before mm::init");
    };

    let text = VirtAddr::from(stext as usize);
    assert_eq!(space.translate_va(text), Some(PhysAddr(stext as usize)));
    let end = VirtAddr::from(MEMORY_END - PAGE_SIZE);
    assert_eq!(space.translate_va(end), Some(PhysAddr(MEMORY_END - PAGE_SIZE)));

    // 恒等映射之外的新页，经由新建立的映射读写
    let va = VirtAddr::from(0x4000_0000);
    let ppn = mapper.map_fresh_page(space.page_table_mut(), va, false)?;
    mapper.hart().sfence_vma(Some(va), space.asid());
    let word = usize::from(va) as *mut u64;
    unsafe {
        assert_eq!(word.read_volatile(), 0);
        word.write_volatile(0x5a5a_5a5a);
    }
    let frame = PhysAddr::from(ppn).0 as *const u64;
    assert_eq!(unsafe { frame.read_volatile() }, 0x5a5a_5a5a);
    assert_eq!(space.translate_va(va), Some(PhysAddr::from(ppn)));
    info!("kernel_space_test passed!");
    Ok(())
}
