//! Hardware tick counters for bracketing a single operation.
//!
//! This crate provides:
//! - `timer` - per-architecture counter reads with execution-ordering barriers,
//!   plus tick frequency calibration
//! - `Clock` - the capability the measurement harness is written against
//!
//! # Counters
//!
//! | Architecture | Start read          | End read            | Nominal rate |
//! |--------------|---------------------|---------------------|--------------|
//! | x86 / x86_64 | `cpuid; rdtsc`      | `rdtscp; cpuid`     | TSC          |
//! | aarch64      | `mrs cntvct_el0`    | `mrs cntvct_el0`    | `cntfrq_el0` |
//! | powerpc64    | `mftb`              | `mftb`              | time base    |
//! | s390x        | `stcke`             | `stcke`             | 4096 MHz     |
//!
//! The counter is chosen when the crate is compiled. Any other target
//! architecture fails to build.
//!
//! Tick values are only comparable on one thread that stays on one core for
//! the whole measurement. Migration between cores is neither detected nor
//! corrected.

#![warn(missing_docs)]
#![cfg_attr(target_arch = "powerpc64", feature(asm_experimental_arch))]

pub mod clock;
pub mod timer;

pub use clock::{Clock, CycleClock};
pub use timer::{counter_frequency_hz, counter_name, read_end, read_start};
