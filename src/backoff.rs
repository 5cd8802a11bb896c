use crate::sync;

/// Exponent at which spinning stops growing and the thread starts yielding.
const SPIN_LIMIT: u32 = 6;

/// Number of backoff rounds after which a spin counts as "long" for diagnostics.
#[cfg(feature = "tracing")]
pub(crate) const LONG_SPIN_ROUNDS: u32 = 1 << 12;

/// Exponential backoff for the retry loops of `load`, `store` and owner release.
///
/// Each `snooze()` issues `2^step` pause hints, doubling up to `2^SPIN_LIMIT`,
/// and from then on yields the thread instead.
///
/// 用于 `load`、`store` 以及所有者释放的重试循环的指数退避。
/// 每次 `snooze()` 执行 `2^step` 次 pause 提示，翻倍直到 `2^SPIN_LIMIT`，之后改为让出线程。
#[derive(Debug, Default)]
pub(crate) struct Backoff {
    step: u32,
    #[cfg(any(test, feature = "tracing"))]
    rounds: u32,
}

impl Backoff {
    #[inline]
    pub(crate) const fn new() -> Self {
        Self {
            step: 0,
            #[cfg(any(test, feature = "tracing"))]
            rounds: 0,
        }
    }

    #[inline]
    pub(crate) fn snooze(&mut self) {
        if self.step <= SPIN_LIMIT {
            for _ in 0..(1u32 << self.step) {
                sync::spin_loop();
            }
            self.step += 1;
        } else {
            sync::yield_now();
        }

        #[cfg(any(test, feature = "tracing"))]
        {
            self.rounds = self.rounds.saturating_add(1);
        }
    }

    /// Total rounds snoozed so far.
    #[cfg(any(test, feature = "tracing"))]
    #[inline]
    pub(crate) fn rounds(&self) -> u32 {
        self.rounds
    }

    /// True exactly once, on the round that crosses the long-spin threshold.
    #[cfg(feature = "tracing")]
    #[inline]
    pub(crate) fn crossed_long_spin(&self) -> bool {
        self.rounds == LONG_SPIN_ROUNDS
    }
}

#[cfg(all(test, not(feature = "loom")))]
mod tests {
    use super::*;

    #[test]
    fn counts_rounds_past_the_spin_limit() {
        let mut backoff = Backoff::new();
        for _ in 0..(SPIN_LIMIT + 4) {
            backoff.snooze();
        }
        assert_eq!(backoff.rounds(), SPIN_LIMIT + 4);
        assert_eq!(backoff.step, SPIN_LIMIT + 1);
    }

    #[cfg(feature = "tracing")]
    #[test]
    fn long_spin_is_reported_exactly_once() {
        let mut backoff = Backoff::new();
        let mut crossings = Vec::new();
        for _ in 0..(LONG_SPIN_ROUNDS + 100) {
            backoff.snooze();
            if backoff.crossed_long_spin() {
                crossings.push(backoff.rounds());
            }
        }
        assert_eq!(crossings, vec![LONG_SPIN_ROUNDS]);
    }
}
