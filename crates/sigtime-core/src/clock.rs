//! The `Clock` capability used by the measurement harness.

use crate::timer;

/// A source of tick values that brackets a measured region.
///
/// `read_start` must keep later instructions from starting before the read;
/// `read_end` must keep earlier instructions from being deferred past it.
/// The difference `read_end() - read_start()` is the tick cost of the region.
pub trait Clock {
    /// Read the counter at the start of a measured region.
    fn read_start(&self) -> u64;

    /// Read the counter at the end of a measured region.
    fn read_end(&self) -> u64;

    /// Counter name for diagnostics.
    fn name(&self) -> &'static str;
}

/// The hardware counter of the build target.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleClock;

impl CycleClock {
    /// Create the clock. Reads are stateless; this never fails.
    pub fn new() -> Self {
        Self
    }
}

impl Clock for CycleClock {
    #[inline(always)]
    fn read_start(&self) -> u64 {
        timer::read_start()
    }

    #[inline(always)]
    fn read_end(&self) -> u64 {
        timer::read_end()
    }

    fn name(&self) -> &'static str {
        timer::counter_name()
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    #[inline(always)]
    fn read_start(&self) -> u64 {
        (**self).read_start()
    }

    #[inline(always)]
    fn read_end(&self) -> u64 {
        (**self).read_end()
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}
