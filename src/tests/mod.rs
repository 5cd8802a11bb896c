
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Counts how many tracked values were created and dropped.
/// 统计被跟踪值的创建与 drop 次数。
#[derive(Debug, Default)]
pub(crate) struct DropCounter {
    created: AtomicUsize,
    dropped: AtomicUsize,
}

impl DropCounter {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub(crate) fn dropped(&self) -> usize {
        self.dropped.load(Ordering::SeqCst)
    }

    pub(crate) fn live(&self) -> usize {
        self.created() - self.dropped()
    }
}

/// A value that reports its construction and destruction to a `DropCounter`.
#[derive(Debug)]
pub(crate) struct Tracked {
    pub(crate) value: usize,
    counter: Arc<DropCounter>,
}

impl Tracked {
    pub(crate) fn new(value: usize, counter: &Arc<DropCounter>) -> Self {
        counter.created.fetch_add(1, Ordering::SeqCst);
        Tracked {
            value,
            counter: Arc::clone(counter),
        }
    }
}

impl Drop for Tracked {
    fn drop(&mut self) {
        self.counter.dropped.fetch_add(1, Ordering::SeqCst);
    }
}
