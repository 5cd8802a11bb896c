use crate::backoff::Backoff;
use crate::reader::ReadGuard;
use crate::slot::GenerationSlot;
use crate::state::{DEFAULT_CAPACITY, MIN_CAPACITY};
use crate::sync::{AtomicUsize, Ordering};
use std::fmt;

/// Builder for configuring a `LargeAtomic`.
///
/// - `capacity`: number of slots in the ring, i.e. how many generations may be
///   alive at once (the head plus those still pinned by lagging readers).
///
/// # Example
/// ```
/// use large_atomic::LargeAtomic;
///
/// let register = LargeAtomic::builder()
///     .capacity(8)
///     .build(vec![0u8; 4096]);
/// assert_eq!(register.capacity(), 8);
/// ```
///
/// 用于配置 `LargeAtomic` 的构建器。
#[derive(Debug, Clone)]
pub struct LargeAtomicBuilder {
    capacity: usize,
}

impl LargeAtomicBuilder {
    /// Create a new builder with default settings.
    /// 创建一个带有默认设置的新构建器。
    #[inline]
    pub fn new() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
        }
    }

    /// Set the number of slots in the ring.
    ///
    /// A larger ring lets readers hold on to old generations longer before writers
    /// have to wait for them. Correctness does not depend on it; only writer
    /// progress does. Must be at least 2.
    ///
    /// Default: `100`
    ///
    /// 设置环中槽位的数量。
    /// 更大的环允许读者更久地持有旧代，写入者才需要等待。正确性与其无关，只影响写入者的进度。至少为 2。
    #[inline]
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Build the register, seeding it with `value`.
    ///
    /// # Panics
    /// Panics if the configured capacity is smaller than 2.
    ///
    /// 构建寄存器，并以 `value` 作为初始值。
    pub fn build<T>(self, value: T) -> LargeAtomic<T> {
        assert!(
            self.capacity >= MIN_CAPACITY,
            "LargeAtomic capacity must be at least {MIN_CAPACITY}, got {}",
            self.capacity
        );

        let slots: Box<[GenerationSlot<T>]> =
            (0..self.capacity).map(|_| GenerationSlot::new()).collect();

        // Slot 0 starts out Full(1): the head's own credit on the initial value.
        let seeded = slots[0].try_store(value);
        debug_assert!(seeded.is_ok(), "BUG: a fresh slot refused its first value");

        LargeAtomic {
            head: AtomicUsize::new(0),
            slots,
        }
    }

    /// Build the register, constructing the initial value with `make`.
    /// 构建寄存器，由 `make` 构造初始值。
    #[inline]
    pub fn build_with<T>(self, make: impl FnOnce() -> T) -> LargeAtomic<T> {
        self.build(make())
    }
}

impl Default for LargeAtomicBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A value on its way into a slot: already built, or built once a slot is won.
enum Pending<T, F> {
    Built(T),
    Deferred(F),
}

impl<T, F: FnOnce() -> T> Pending<T, F> {
    #[inline]
    fn build(self) -> T {
        match self {
            Pending::Built(value) => value,
            Pending::Deferred(make) => make(),
        }
    }
}

/// An atomic register for values too large for a native atomic instruction.
///
/// `LargeAtomic<T>` keeps a fixed ring of generation slots. Any number of threads
/// may `store` new values and any number may `load` the current one; a load returns
/// a [`ReadGuard`] that keeps its generation alive, so readers never see a torn or
/// freed value. No operation takes a lock: writers and readers coordinate purely
/// through compare-and-swap on a packed (state, owner count) word per slot and on
/// the head index.
///
/// **How it works**:
/// - The head index designates the slot holding the latest generation. The head
///   counts as one owner of that slot; every live `ReadGuard` counts as one more.
/// - `store` claims the slot after the head, writes the value, publishes it as
///   the new head and gives up the head's credit on the previous slot.
/// - A slot is dropped and becomes reusable once its last owner lets go.
///
/// **Capacity**: if readers keep `capacity - 1` old generations pinned, writers
/// spin until one of them is released. The capacity is slack, not a correctness knob.
///
/// **Typical Usage**:
/// ```
/// use large_atomic::LargeAtomic;
/// use std::sync::Arc;
/// use std::thread;
///
/// let register = Arc::new(LargeAtomic::new([0u64; 64]));
///
/// let reader = {
///     let register = Arc::clone(&register);
///     thread::spawn(move || {
///         let snapshot = register.load();
///         // All 64 words always come from the same store.
///         assert!(snapshot.iter().all(|&word| word == snapshot[0]));
///     })
/// };
///
/// register.store([7u64; 64]);
/// reader.join().unwrap();
/// assert_eq!(register.load()[63], 7);
/// ```
///
/// 用于无法使用原生原子指令的大型值的原子寄存器。
/// `LargeAtomic<T>` 维护一个固定的代槽位环。任意数量的线程都可以 `store` 新值，任意数量的
/// 线程都可以 `load` 当前值；load 返回一个保持其代存活的 [`ReadGuard`]，因此读者永远不会
/// 看到撕裂的或已释放的值。所有操作都不加锁：读写双方只通过每个槽位上打包的
/// （状态，所有者计数）字以及 head 索引上的 CAS 进行协调。
pub struct LargeAtomic<T> {
    head: AtomicUsize,
    slots: Box<[GenerationSlot<T>]>,
}

impl LargeAtomic<()> {
    /// Create a builder for configuring the register.
    ///
    /// The builder is not tied to a value type; `build` picks it from the initial value.
    ///
    /// 创建一个用于配置寄存器的构建器。构建器不绑定值类型，由 `build` 根据初始值确定。
    #[inline]
    pub fn builder() -> LargeAtomicBuilder {
        LargeAtomicBuilder::new()
    }
}

impl<T> LargeAtomic<T> {
    /// Create a register with the default capacity and the given initial value.
    /// 使用默认容量和给定初始值创建寄存器。
    #[inline]
    pub fn new(value: T) -> Self {
        LargeAtomicBuilder::new().build(value)
    }

    /// Create a register with a ring of `capacity` slots.
    ///
    /// # Panics
    /// Panics if `capacity` is smaller than 2.
    ///
    /// 创建一个包含 `capacity` 个槽位的寄存器。`capacity` 小于 2 时 panic。
    #[inline]
    pub fn with_capacity(capacity: usize, value: T) -> Self {
        LargeAtomicBuilder::new().capacity(capacity).build(value)
    }

    /// Number of slots in the ring.
    /// 环中槽位的数量。
    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    fn next_index(&self, index: usize) -> usize {
        (index + 1) % self.slots.len()
    }

    /// Read the current value.
    ///
    /// Returns a guard on the value of the most recently completed `store` (or the
    /// initial value). The value stays valid and unchanged until the guard is dropped,
    /// regardless of later stores.
    ///
    /// Lock-free: retries only while racing other threads on the head slot, or for the
    /// brief moment between a writer publishing a new head and committing its value.
    ///
    /// 读取当前值。
    /// 返回最近一次完成的 `store`（或初始值）的守卫。在守卫被 drop 之前，该值保持有效且不变，
    /// 无论之后发生多少次 store。
    pub fn load(&self) -> ReadGuard<'_, T> {
        let mut backoff = Backoff::new();
        loop {
            if let Some(guard) = self.try_load() {
                return guard;
            }
            backoff.snooze();

            #[cfg(feature = "tracing")]
            {
                if backoff.crossed_long_spin() {
                    tracing::warn!(
                        slot = self.head.load(Ordering::Relaxed),
                        spins = backoff.rounds(),
                        capacity = self.capacity(),
                        "load is spinning on the head slot"
                    );
                }
            }
        }
    }

    /// Make a single attempt to read the current value.
    ///
    /// Returns `None` if the attempt lost a race against a concurrent reader or writer
    /// on the head slot. Callers that need bounded latency can retry this themselves.
    ///
    /// 尝试读取一次当前值。若本次尝试在 head 槽位上与并发读者或写入者竞争失败，返回 `None`。
    pub fn try_load(&self) -> Option<ReadGuard<'_, T>> {
        let head = self.head.load(Ordering::Acquire);
        let slot = &self.slots[head];
        if slot.try_add_owner() {
            // SAFETY: we just won an owner credit on `slot`.
            Some(unsafe { ReadGuard::new(slot) })
        } else {
            None
        }
    }

    /// Clone the current value out of the register.
    /// 克隆寄存器的当前值。
    #[inline]
    pub fn get(&self) -> T
    where
        T: Clone,
    {
        T::clone(&self.load())
    }

    /// Install a new value.
    ///
    /// The value is visible to every `load` that starts after this returns. The
    /// previous generation is dropped as soon as its last reader lets go, possibly
    /// inside this call.
    ///
    /// Spins while the next ring slot is still pinned by lagging readers.
    ///
    /// 安装一个新值。
    /// 该值对本调用返回之后开始的所有 `load` 可见。上一代会在其最后一个读者释放后立即被 drop，
    /// 这也可能发生在本调用内部。
    /// 当环中的下一个槽位仍被滞后的读者占用时会自旋。
    #[inline]
    pub fn store(&self, value: T) {
        self.store_pending(Pending::<T, fn() -> T>::Built(value));
    }

    /// Install a new value constructed by `make`.
    ///
    /// `make` runs exactly once, directly into a slot this writer has already claimed.
    /// If it panics, the slot is released and the register keeps its current value.
    ///
    /// 安装由 `make` 构造的新值。`make` 恰好运行一次，直接写入本写入者已认领的槽位。
    /// 若其 panic，槽位会被释放，寄存器保持当前值。
    #[inline]
    pub fn store_with<F>(&self, make: F)
    where
        F: FnOnce() -> T,
    {
        self.store_pending(Pending::Deferred(make));
    }

    /// Make a single attempt to install `value`.
    ///
    /// Hands the value back if the next ring slot is still in use, or if another
    /// writer advanced the head first.
    ///
    /// 尝试安装一次 `value`。若环中下一个槽位仍在使用，或另一个写入者先推进了 head，则把值交还。
    #[inline]
    pub fn try_store(&self, value: T) -> Result<(), T> {
        self.attempt_store(Pending::<T, fn() -> T>::Built(value))
            .map_err(Pending::build)
    }

    fn store_pending<F>(&self, mut pending: Pending<T, F>)
    where
        F: FnOnce() -> T,
    {
        let mut backoff = Backoff::new();
        loop {
            pending = match self.attempt_store(pending) {
                Ok(()) => return,
                Err(pending) => pending,
            };
            backoff.snooze();

            #[cfg(feature = "tracing")]
            {
                if backoff.crossed_long_spin() {
                    tracing::warn!(
                        slot = self.next_index(self.head.load(Ordering::Relaxed)),
                        spins = backoff.rounds(),
                        capacity = self.capacity(),
                        "store is spinning: the next ring slot is still pinned by readers"
                    );
                }
            }
        }
    }

    /// One round of the write protocol.
    ///
    /// 1. Claim the slot after the observed head (`Empty -> Filling`).
    /// 2. Build the value while the slot is exclusively ours.
    /// 3. Publish the slot with a CAS on `head`; losing it means another writer moved
    ///    the head, so the slot goes back to Empty and the built value is kept.
    /// 4. Commit (`Filling -> Full(1)`), which carries the head's credit.
    /// 5. Give up the head's credit on the previous slot.
    ///
    /// The CAS on `head` is what lets only the writer that actually replaced a head
    /// release that head's credit.
    fn attempt_store<F>(&self, pending: Pending<T, F>) -> Result<(), Pending<T, F>>
    where
        F: FnOnce() -> T,
    {
        let head = self.head.load(Ordering::Acquire);
        let next = self.next_index(head);

        let Some(fill) = self.slots[next].try_fill() else {
            return Err(pending);
        };

        let value = pending.build();

        if self
            .head
            .compare_exchange(head, next, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            drop(fill);
            return Err(Pending::Built(value));
        }

        fill.commit(value);
        self.slots[head].release_owner();
        Ok(())
    }

    /// Consume the register and return the current value.
    /// 消耗寄存器并返回当前值。
    pub fn into_inner(mut self) -> T {
        let head = self.head.load(Ordering::Relaxed);
        match self.slots[head].take() {
            Some(value) => value,
            None => unreachable!("BUG: the head slot of an unshared register is not Full"),
        }
    }

    #[cfg(test)]
    pub(crate) fn head_index(&self) -> usize {
        self.head.load(Ordering::Acquire)
    }

    #[cfg(test)]
    pub(crate) fn slot_words(&self) -> Vec<crate::state::StateWord> {
        self.slots.iter().map(GenerationSlot::state_word).collect()
    }
}

impl<T: Default> Default for LargeAtomic<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T> From<T> for LargeAtomic<T> {
    fn from(value: T) -> Self {
        Self::new(value)
    }
}

impl<T: fmt::Debug> fmt::Debug for LargeAtomic<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LargeAtomic")
            .field("value", &*self.load())
            .field("capacity", &self.capacity())
            .finish()
    }
}
