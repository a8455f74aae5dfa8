use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Probe for an external request to stop the evolution loop.
///
/// The tuner checks it between trials, never during one.
pub trait Terminated: Send + Sync {
    fn is_terminated(&self) -> bool;
}

/// A probe that never trips.
#[derive(Debug, Clone, Copy, Default)]
pub struct Never;

impl Terminated for Never {
    fn is_terminated(&self) -> bool {
        false
    }
}

impl Terminated for AtomicBool {
    fn is_terminated(&self) -> bool {
        self.load(Ordering::SeqCst)
    }
}

impl<T: Terminated + ?Sized> Terminated for Arc<T> {
    fn is_terminated(&self) -> bool {
        (**self).is_terminated()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_follows_the_flag() {
        let flag = Arc::new(AtomicBool::new(false));
        assert!(!flag.is_terminated());

        flag.store(true, Ordering::SeqCst);
        assert!(flag.is_terminated());
        assert!(!Never.is_terminated());
    }
}
