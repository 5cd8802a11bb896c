use crate::slot::GenerationSlot;
use std::fmt;
use std::ops::Deref;

/// A scoped read handle on one generation of a [`LargeAtomic`](crate::LargeAtomic).
///
/// `ReadGuard` is obtained from `LargeAtomic::load()`. It holds one owner credit on the
/// slot that was the head when the load happened, so the value it dereferences to is
/// never modified or dropped while the guard is alive, no matter how many `store`s
/// happen in the meantime. Dropping the guard returns the credit; if it was the last
/// owner of a generation that is no longer the head, that generation is dropped there
/// and then, on the dropping thread.
///
/// The guard is not `Clone`: one `load` gives exactly one credit, and it is given back
/// exactly once. Its lifetime is bound to the register it came from.
///
/// Keep guards short-lived. Every guard pins one ring slot, and writers have to wait
/// once readers pin all but one slot of the ring.
///
/// 一个作用于 [`LargeAtomic`](crate::LargeAtomic) 某一代的作用域读句柄。
/// `ReadGuard` 通过 `LargeAtomic::load()` 获得。它在 load 发生时的 head 槽位上持有一个
/// 所有者凭证，因此在守卫存活期间，它解引用到的值不会被修改或 drop，无论期间发生多少次 `store`。
/// drop 守卫会归还凭证；若它是一个已不再是 head 的代的最后一个所有者，该代会在 drop 守卫的线程上立即被 drop。
/// 守卫不是 `Clone` 的：一次 `load` 恰好获得一个凭证，并恰好归还一次。
#[must_use]
pub struct ReadGuard<'a, T> {
    slot: &'a GenerationSlot<T>,
}

impl<'a, T> ReadGuard<'a, T> {
    /// # Safety
    /// The caller must have won `try_add_owner` on `slot`; the guard takes over that credit.
    #[inline]
    pub(crate) unsafe fn new(slot: &'a GenerationSlot<T>) -> Self {
        ReadGuard { slot }
    }
}

impl<T> Deref for ReadGuard<'_, T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        // SAFETY: the guard owns a credit on the slot until it is dropped.
        unsafe { self.slot.load() }
    }
}

impl<T> Drop for ReadGuard<'_, T> {
    #[inline]
    fn drop(&mut self) {
        self.slot.release_owner();
    }
}

impl<T: fmt::Debug> fmt::Debug for ReadGuard<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ReadGuard").field(&**self).finish()
    }
}

impl<T: fmt::Display> fmt::Display for ReadGuard<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&**self, f)
    }
}
