/// Default number of slots in the ring.
/// 环中槽位的默认数量。
pub const DEFAULT_CAPACITY: usize = 100;

/// Smallest ring that can hold the head plus one generation being filled.
/// 能同时容纳 head 和一个正在填充的代的最小环。
pub(crate) const MIN_CAPACITY: usize = 2;

const STATE_MASK: u64 = 0xFFFF_FFFF;
const OWNERS_SHIFT: u32 = 32;

/// Lifecycle state of a generation slot.
/// 代槽位的生命周期状态。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub(crate) enum SlotState {
    /// No value stored; the slot may be claimed by a writer.
    Empty = 0,
    /// A writer holds the slot exclusively and is placing a value.
    Filling = 1,
    /// A value is stored and shared by `owners` owners.
    Full = 2,
    /// The last owner is dropping the value.
    Freeing = 3,
}

impl SlotState {
    #[inline]
    fn from_bits(bits: u32) -> Self {
        match bits {
            0 => SlotState::Empty,
            1 => SlotState::Filling,
            2 => SlotState::Full,
            3 => SlotState::Freeing,
            _ => unreachable!("BUG: invalid slot state bits {bits}"),
        }
    }
}

/// A slot state and its owner count packed into one `u64`, so that both change
/// together in a single compare-and-swap.
///
/// Layout: the state occupies the low 32 bits, the owner count the high 32 bits.
///
/// 将槽位状态与所有者计数打包进一个 `u64`，使两者可以通过一次 CAS 同时更新。
/// 布局：低 32 位为状态，高 32 位为所有者计数。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct StateWord(u64);

impl StateWord {
    pub(crate) const EMPTY: StateWord = StateWord::new(SlotState::Empty, 0);
    pub(crate) const FILLING: StateWord = StateWord::new(SlotState::Filling, 0);
    pub(crate) const FRESH: StateWord = StateWord::new(SlotState::Full, 1);
    pub(crate) const FREEING: StateWord = StateWord::new(SlotState::Freeing, 0);

    #[inline]
    pub(crate) const fn new(state: SlotState, owners: u32) -> Self {
        StateWord(((owners as u64) << OWNERS_SHIFT) | (state as u32 as u64))
    }

    #[inline]
    pub(crate) const fn from_bits(bits: u64) -> Self {
        StateWord(bits)
    }

    #[inline]
    pub(crate) const fn bits(self) -> u64 {
        self.0
    }

    #[inline]
    pub(crate) fn state(self) -> SlotState {
        SlotState::from_bits((self.0 & STATE_MASK) as u32)
    }

    #[inline]
    pub(crate) const fn owners(self) -> u32 {
        (self.0 >> OWNERS_SHIFT) as u32
    }

    /// The same state with one more owner. The caller rules out `u32::MAX` owners.
    #[inline]
    pub(crate) fn with_added_owner(self) -> Self {
        debug_assert!(self.owners() < u32::MAX, "BUG: owner count overflow");
        StateWord::new(self.state(), self.owners() + 1)
    }

    /// The same state with one owner fewer.
    #[inline]
    pub(crate) fn with_removed_owner(self) -> Self {
        debug_assert!(self.owners() > 0, "BUG: owner count underflow");
        StateWord::new(self.state(), self.owners() - 1)
    }
}
