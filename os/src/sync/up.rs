//! 单处理器内部可变性

use core::cell::{RefCell, RefMut};

/// 仅在单处理器上使用的内部可变性容器
///
/// 借用规则在运行时检查，重复借用会导致`panic`。
/// 标记为[`Sync`]以便放入全局变量，调用者须保证只在单个处理器上访问
pub struct UPSafeCell<T> {
    inner: RefCell<T>,
}

unsafe impl<T> Sync for UPSafeCell<T> {}

impl<T> UPSafeCell<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: RefCell::new(value),
        }
    }

    /// 独占地借用内部值
    pub fn exclusive_access(&self) -> RefMut<'_, T> {
        self.inner.borrow_mut()
    }
}
