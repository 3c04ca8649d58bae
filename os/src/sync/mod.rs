//! 同步原语
//!
//!

mod up;

pub use up::UPSafeCell;
