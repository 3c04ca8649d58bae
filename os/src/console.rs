//! 控制台
//!
//!

use crate::sbi::console_putchar;
use core::fmt::{self, Write};

/// 经由SBI输出的控制台
pub struct Stdout;

impl Write for Stdout {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for c in s.bytes() {
            console_putchar(c as usize);
        }
        Ok(())
    }
}

/// 输出字符串
pub fn print(args: fmt::Arguments) {
    // SBI控制台输出不会失败
    let _ = Stdout.write_fmt(args);
}

#[macro_export]
/// 输出格式化字符串
macro_rules! print {
    ($fmt: literal $(, $($arg: tt)+)?) => {
        $crate::console::print(format_args!($fmt $(, $($arg)+)?));
    }
}

#[macro_export]
/// 输出格式化字符串并换行
macro_rules! println {
    ($fmt: literal $(, $($arg: tt)+)?) => {
        $crate::console::print(format_args!(concat!($fmt, "\n") $(, $($arg)+)?));
    }
}
