#![no_std]
#![no_main]

#[macro_use]
mod console;

mod lang_items;
mod logging;
mod sbi;

use core::arch::global_asm;
use log::*;
use sv39_kernel::mm;

global_asm!(include_str!("entry.asm"));

/// 内核入口
///
/// # 逻辑概要
/// 1. 清零`.bss`段，初始化日志
/// 2. 建立内核地址空间并开启SV39分页 [`mm::init`]
/// 3. 自检 [`mm::kernel_space_test`]，日志级别为`TRACE`时输出整张内核页表
/// 4. 关机
#[no_mangle]
pub fn rust_main() -> ! {
    clear_bss();
    logging::init();
    info!("Hello, world!");
    if let Err(err) = mm::init() {
        panic!("failed to build the kernel address space: {}", err);
    }
    if let Err(err) = mm::kernel_space_test() {
        panic!("kernel_space_test failed: {}", err);
    }
    if log_enabled!(Level::Trace) {
        println!("kernel page table:");
        if mm::dump_kernel_space(&mut console::Stdout).is_err() {
            warn!("page table dump truncated");
        }
    }
    sbi::shutdown(false)
}

fn clear_bss() {
    extern "C" {
        fn sbss();
        fn ebss();
    }
    (sbss as usize..ebss as usize).for_each(|a| unsafe { (a as *mut u8).write_volatile(0) });
}
