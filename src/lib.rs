//! # Lock-free register for large values
//!
//! `large_atomic` provides [`LargeAtomic<T>`], a register that behaves like an atomic
//! variable for values too large for a native atomic instruction. Any number of
//! threads may replace the value while any number of threads read consistent,
//! never-torn snapshots of it, and neither side takes a lock.
//!
//! ## Core Concepts
//!
//! - **Generation**: one stored version of the value, living in one ring slot.
//! - **Slot**: a storage cell guarded by a packed `(state, owner count)` word that is
//!   only ever changed by compare-and-swap. States run
//!   `Empty -> Filling -> Full -> Freeing -> Empty`.
//! - **Owner**: the head holds one credit on the latest generation; every live
//!   [`ReadGuard`] holds one credit on the generation it was loaded from. A
//!   generation is dropped when its last credit is returned.
//! - **Capacity**: the number of slots. Writers wait only when readers pin all
//!   older slots of the ring at once.
//!
//! ## Typical Usage
//!
//! ```rust
//! use large_atomic::LargeAtomic;
//!
//! // 1. Create a register with an initial value
//! let register = LargeAtomic::new(vec![1, 2, 3]);
//!
//! // 2. Load: the guard derefs to the value and keeps it alive
//! let guard = register.load();
//! assert_eq!(*guard, vec![1, 2, 3]);
//!
//! // 3. Store: later loads see the new value, the old guard still sees its own
//! register.store(vec![4, 5, 6]);
//! assert_eq!(*register.load(), vec![4, 5, 6]);
//! assert_eq!(*guard, vec![1, 2, 3]);
//!
//! // 4. Dropping the last guard on the old generation drops that value
//! drop(guard);
//! ```
//!
//! # 大型值的无锁寄存器
//!
//! `large_atomic` 提供 [`LargeAtomic<T>`]：一个对于无法使用原生原子指令的大型值，
//! 行为类似原子变量的寄存器。任意数量的线程可以替换值，同时任意数量的线程可以读取
//! 一致且永不撕裂的快照，读写双方都不加锁。
mod backoff;
mod reader;
mod register;
mod slot;
mod state;
mod sync;

pub use reader::ReadGuard;
pub use register::{LargeAtomic, LargeAtomicBuilder};
pub use state::DEFAULT_CAPACITY;

#[cfg(all(test, not(feature = "loom")))]
mod tests;
