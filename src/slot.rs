use crate::backoff::Backoff;
use crate::state::{SlotState, StateWord};
use crate::sync::{AtomicU64, Ordering, UnsafeCell};
use std::fmt;
use std::mem::{self, MaybeUninit};

/// One storage cell of the ring, holding at most one generation of the value.
///
/// The slot is driven through the following state machine, where `(STATE, n)`
/// means the slot is in `STATE` and has `n` owners:
///
/// ```text
///   (Empty, 0) <------------------------------+
///      |                                      |
///      | try_fill / try_store                 |
///      v                                      |
///   (Filling, 0) ---- abandoned fill ---------+
///      |                                      |
///      | commit                               |
///      v                                      |
///   (Full, n) ------------------------> (Freeing, 0)
///    |     ^     try_remove_owner, n == 1
///    |     |
///    +-----+
///    try_add_owner / try_remove_owner, n > 1
/// ```
///
/// Every transition is a compare-and-swap on the packed [`StateWord`]. Only the
/// thread that wins `Empty -> Filling` writes the value and only the thread that
/// wins `Full(1) -> Freeing` drops it; `try_add_owner` only succeeds against
/// `Full`, so nobody can observe a value half-written or half-dropped.
///
/// 环中的一个存储单元，每次最多持有值的一个代。
/// 所有状态转换都是对打包 [`StateWord`] 的 CAS。只有赢得 `Empty -> Filling` 的线程
/// 写入值，只有赢得 `Full(1) -> Freeing` 的线程 drop 值；`try_add_owner` 只在 `Full`
/// 状态下成功，因此没有人能观察到写了一半或销毁了一半的值。
#[repr(align(64))]
pub(crate) struct GenerationSlot<T> {
    state: AtomicU64,
    value: UnsafeCell<MaybeUninit<T>>,
}

// SAFETY: the value is written and dropped by exactly one thread (the one that won
// the Filling or Freeing transition) and is otherwise only shared immutably
// between owners, which may live on any thread.
unsafe impl<T: Send> Send for GenerationSlot<T> {}
unsafe impl<T: Send + Sync> Sync for GenerationSlot<T> {}

impl<T> GenerationSlot<T> {
    pub(crate) fn new() -> Self {
        Self {
            state: AtomicU64::new(StateWord::EMPTY.bits()),
            value: UnsafeCell::new(MaybeUninit::uninit()),
        }
    }

    #[inline]
    pub(crate) fn state_word(&self) -> StateWord {
        StateWord::from_bits(self.state.load(Ordering::Acquire))
    }

    #[inline]
    fn transition(&self, current: StateWord, new: StateWord) -> bool {
        self.state
            .compare_exchange(
                current.bits(),
                new.bits(),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Claim the slot for writing: `Empty(0) -> Filling(0)`.
    ///
    /// The returned [`Fill`] is the only handle allowed to touch the storage until it
    /// is committed or dropped. Returns `None` without side effects if the slot is not Empty.
    ///
    /// 认领槽位用于写入：`Empty(0) -> Filling(0)`。
    /// 槽位不为 Empty 时返回 `None`，且没有副作用。
    #[inline]
    pub(crate) fn try_fill(&self) -> Option<Fill<'_, T>> {
        if self.transition(StateWord::EMPTY, StateWord::FILLING) {
            Some(Fill { slot: self })
        } else {
            None
        }
    }

    /// Store `value` if the slot is Empty: `Empty(0) -> Filling(0) -> Full(1)`.
    ///
    /// Hands the value back if the slot was not Empty.
    ///
    /// 若槽位为 Empty 则存入 `value`；否则把值交还。
    #[inline]
    pub(crate) fn try_store(&self, value: T) -> Result<(), T> {
        match self.try_fill() {
            Some(fill) => {
                fill.commit(value);
                Ok(())
            }
            None => Err(value),
        }
    }

    /// `Full(n) -> Full(n + 1)`.
    ///
    /// Fails without side effects if the slot is not Full, or if the word changed
    /// between the read and the CAS; the caller retries with a fresh observation.
    ///
    /// # Panics
    /// Panics if the slot already has `u32::MAX` owners, which takes that many leaked
    /// guards. Wrapping the count would let the value be freed under a live guard.
    ///
    /// `Full(n) -> Full(n + 1)`。
    /// 槽位不为 Full，或读取与 CAS 之间状态字发生变化时失败且无副作用；调用者需重新观察后重试。
    /// 若所有者已达 `u32::MAX` 则 panic，计数回绕会让值在仍有守卫时被释放。
    #[inline]
    pub(crate) fn try_add_owner(&self) -> bool {
        let current = self.state_word();
        if current.state() != SlotState::Full {
            return false;
        }
        debug_assert!(current.owners() > 0, "BUG: Full slot without owners");
        assert!(
            current.owners() < u32::MAX,
            "LargeAtomic owner count overflow: too many ReadGuards on one generation"
        );

        self.transition(current, current.with_added_owner())
    }

    /// `Full(n) -> Full(n - 1)`, or `Full(1) -> Freeing(0) -> Empty(0)` for the last owner.
    ///
    /// The last owner drops the value before the slot becomes Empty again.
    /// A lost CAS returns false and changes nothing.
    ///
    /// 最后一个所有者会在槽位重新变为 Empty 之前 drop 值。CAS 失败时返回 false 且不做任何改变。
    #[inline]
    pub(crate) fn try_remove_owner(&self) -> bool {
        let current = self.state_word();
        if current.state() != SlotState::Full {
            return false;
        }
        debug_assert!(current.owners() > 0, "BUG: Full slot without owners");

        if current.owners() == 1 {
            if !self.transition(current, StateWord::FREEING) {
                return false;
            }
            self.free();
            true
        } else {
            self.transition(current, current.with_removed_owner())
        }
    }

    /// Give back one owner credit, retrying lost races until the credit is returned.
    ///
    /// The caller must hold a credit. A writer releasing the previous head may get
    /// here while that head is still being committed, so a Filling slot is waited out.
    ///
    /// 归还一个所有者凭证，竞争失败时重试直到归还成功。调用者必须持有凭证；
    /// 处于 Filling 的槽位（上一个 head 仍在提交中）会被等待。
    pub(crate) fn release_owner(&self) {
        let mut backoff = Backoff::new();
        while !self.try_remove_owner() {
            debug_assert!(
                matches!(
                    self.state_word().state(),
                    SlotState::Full | SlotState::Filling
                ),
                "BUG: releasing an owner credit on a slot that is neither Full nor Filling"
            );
            backoff.snooze();
        }
    }

    /// Borrow the stored value.
    ///
    /// # Safety
    /// The caller must hold an owner credit on this slot for the whole lifetime of
    /// the returned reference.
    ///
    /// 借用已存储的值。调用者必须在返回引用的整个生命周期内持有该槽位的所有者凭证。
    #[inline]
    pub(crate) unsafe fn load(&self) -> &T {
        debug_assert_eq!(self.state_word().state(), SlotState::Full);
        // SAFETY: an owner credit keeps the slot Full, so the value is initialized
        // and no thread can start dropping it.
        self.value.with(|ptr| unsafe { (*ptr).assume_init_ref() })
    }

    /// Overwrite the state word, bypassing the state machine.
    #[cfg(test)]
    pub(crate) fn force_state(&self, word: StateWord) {
        self.state.store(word.bits(), Ordering::Release);
    }

    /// Move the value out of a Full slot, leaving it Empty.
    /// 将值从 Full 槽位中移出，槽位变为 Empty。
    pub(crate) fn take(&mut self) -> Option<T> {
        if self.state_word().state() != SlotState::Full {
            return None;
        }
        // SAFETY: `&mut self` rules out every other owner, and Full means initialized.
        let value = self.value.with(|ptr| unsafe { (*ptr).assume_init_read() });
        self.state.store(StateWord::EMPTY.bits(), Ordering::Release);
        Some(value)
    }

    /// Drop the value after winning `Full(1) -> Freeing(0)`, then return to Empty.
    fn free(&self) {
        // Returns the slot to Empty even if the destructor unwinds.
        let _reset = ResetToEmpty {
            state: &self.state,
            from: StateWord::FREEING,
        };
        // SAFETY: winning the Freeing transition makes this thread the only one with
        // access to the storage, and the value was initialized while Full.
        self.value.with_mut(|ptr| unsafe { (*ptr).assume_init_drop() });
    }
}

impl<T> Drop for GenerationSlot<T> {
    fn drop(&mut self) {
        drop(self.take());
    }
}

impl<T> fmt::Debug for GenerationSlot<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let word = self.state_word();
        f.debug_struct("GenerationSlot")
            .field("state", &word.state())
            .field("owners", &word.owners())
            .finish()
    }
}

/// Exclusive write access to a slot in the Filling state.
///
/// `commit` publishes the value as `Full(1)`; dropping the `Fill` instead returns
/// the slot to Empty, which also covers a value constructor that panics.
///
/// 对处于 Filling 状态槽位的独占写权限。
/// `commit` 将值发布为 `Full(1)`；直接 drop `Fill` 则把槽位还原为 Empty（构造函数 panic 时同样如此）。
#[must_use]
pub(crate) struct Fill<'a, T> {
    slot: &'a GenerationSlot<T>,
}

impl<'a, T> Fill<'a, T> {
    /// Write `value` and make it visible: `Filling(0) -> Full(1)`.
    /// 写入 `value` 并使其可见：`Filling(0) -> Full(1)`。
    pub(crate) fn commit(self, value: T) {
        let slot = self.slot;
        mem::forget(self);

        // SAFETY: the Filling state grants this thread exclusive access to the storage,
        // which holds no value.
        slot.value.with_mut(|ptr| unsafe {
            (*ptr).write(value);
        });

        let prev = slot.state.swap(StateWord::FRESH.bits(), Ordering::Release);
        debug_assert_eq!(
            StateWord::from_bits(prev),
            StateWord::FILLING,
            "BUG: a Filling slot changed state under its writer"
        );
    }
}

impl<'a, T> Drop for Fill<'a, T> {
    fn drop(&mut self) {
        drop(ResetToEmpty {
            state: &self.slot.state,
            from: StateWord::FILLING,
        });
    }
}

/// Ends an exclusive Filling or Freeing phase by storing `Empty(0)`.
struct ResetToEmpty<'a> {
    state: &'a AtomicU64,
    from: StateWord,
}

impl Drop for ResetToEmpty<'_> {
    fn drop(&mut self) {
        let prev = self.state.swap(StateWord::EMPTY.bits(), Ordering::Release);
        debug_assert_eq!(
            StateWord::from_bits(prev),
            self.from,
            "BUG: an exclusively held slot changed state"
        );
    }
}
