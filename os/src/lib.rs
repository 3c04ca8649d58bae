//! SV39虚拟内存子系统
//!
//! 在QEMU `virt`开发板上为内核建立恒等映射的三级页表并开启分页，
//! 对外提供页框分配、页面映射、地址空间切换和页表输出

#![cfg_attr(not(test), no_std)]

#[path = "boards/qemu.rs"]
mod board;

pub mod config;
pub mod hart;
pub mod mm;
pub mod sync;
