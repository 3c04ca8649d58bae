//! QEMU开发板相关参数
//!
//!

/// 内存大小
pub const MEMORY_END: usize = 0x8800_0000;

/// IO内存映射区域
///
/// # 格式
/// (起始地址, 大小)
pub const MMIO: &[(usize, usize)] = &[
    (VIRT_PLIC, 0x60_0000),
    (VIRT_UART, 0x100),  // IRQ10
    (VIRT_MMIO, 0x8000), // virtio-mmio-bus.0(IRQ1) ~ virtio-mmio-bus.7(IRQ8)
];

pub const VIRT_PLIC: usize = 0xC00_0000;
pub const VIRT_UART: usize = 0x1000_0000;
pub const VIRT_MMIO: usize = 0x1000_1000;
