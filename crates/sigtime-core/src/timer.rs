//! Architecture-specific counter reads and tick frequency detection.
//!
//! `read_start` and `read_end` are the two halves of a measurement. On x86 the
//! halves differ: the start read is preceded by a serializing `cpuid` so later
//! instructions cannot begin early, and the end read uses the self-ordering
//! `rdtscp` followed by `cpuid` so earlier instructions cannot be deferred past
//! it. The other architectures read the same register at both ends.
//!
//! None of the reads carry a `nomem` option, so each one is also a compiler
//! barrier for memory accesses.

#[cfg(any(target_arch = "aarch64", target_arch = "powerpc64", target_arch = "s390x"))]
use core::arch::asm;

#[cfg(target_arch = "x86")]
use core::arch::x86 as arch;
#[cfg(target_arch = "x86_64")]
use core::arch::x86_64 as arch;

#[cfg(not(any(
    target_arch = "x86",
    target_arch = "x86_64",
    target_arch = "aarch64",
    target_arch = "powerpc64",
    target_arch = "s390x"
)))]
compile_error!("sigtime-core has no cycle counter for this target architecture");

// =============================================================================
// x86 / x86_64: CPUID + RDTSC / RDTSCP + CPUID
// =============================================================================

/// Read the time stamp counter at the start of a measured region.
#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
#[inline(always)]
#[allow(unused_unsafe)]
pub fn read_start() -> u64 {
    use core::sync::atomic::{compiler_fence, Ordering};

    compiler_fence(Ordering::SeqCst);
    let ticks = unsafe {
        let _ = arch::__cpuid(0);
        arch::_rdtsc()
    };
    compiler_fence(Ordering::SeqCst);
    ticks
}

/// Read the time stamp counter at the end of a measured region.
#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
#[inline(always)]
#[allow(unused_unsafe)]
pub fn read_end() -> u64 {
    use core::sync::atomic::{compiler_fence, Ordering};

    compiler_fence(Ordering::SeqCst);
    let ticks = unsafe {
        let mut aux = 0u32;
        let ticks = arch::__rdtscp(&mut aux);
        let _ = arch::__cpuid(0);
        ticks
    };
    compiler_fence(Ordering::SeqCst);
    ticks
}

// =============================================================================
// ARM64: virtual counter
// =============================================================================

/// Read `cntvct_el0` at the start of a measured region.
#[cfg(target_arch = "aarch64")]
#[inline(always)]
pub fn read_start() -> u64 {
    read_cntvct()
}

/// Read `cntvct_el0` at the end of a measured region.
#[cfg(target_arch = "aarch64")]
#[inline(always)]
pub fn read_end() -> u64 {
    read_cntvct()
}

// No barrier by default: the counter read itself may be reordered by the core
// relative to neighbouring instructions. Enable `aarch64-isb` to add one.
#[cfg(target_arch = "aarch64")]
#[inline(always)]
fn read_cntvct() -> u64 {
    let ticks: u64;
    #[cfg(feature = "aarch64-isb")]
    unsafe {
        asm!("isb", "mrs {}, cntvct_el0", out(reg) ticks, options(nostack));
    }
    #[cfg(not(feature = "aarch64-isb"))]
    unsafe {
        asm!("mrs {}, cntvct_el0", out(reg) ticks, options(nostack));
    }
    ticks
}

// =============================================================================
// PowerPC 64: time base
// =============================================================================

/// Read the time base at the start of a measured region.
#[cfg(target_arch = "powerpc64")]
#[inline(always)]
pub fn read_start() -> u64 {
    read_time_base()
}

/// Read the time base at the end of a measured region.
#[cfg(target_arch = "powerpc64")]
#[inline(always)]
pub fn read_end() -> u64 {
    read_time_base()
}

// A single `mftb` returns all 64 bits on ppc64. 32-bit targets would need the
// upper/lower/upper retry sequence and are not supported.
#[cfg(target_arch = "powerpc64")]
#[inline(always)]
fn read_time_base() -> u64 {
    let ticks: u64;
    unsafe {
        asm!("mftb {}", out(reg) ticks, options(nostack));
    }
    ticks
}

// =============================================================================
// s390x: extended TOD clock
// =============================================================================

/// Nominal rate of the s390x TOD clock in Hz.
///
/// Some machines do not update every low-order bit, but the effective rate
/// stays the same.
#[cfg(target_arch = "s390x")]
pub const S390X_TOD_FREQ_HZ: u64 = 4_096_000_000;

/// Read the TOD clock at the start of a measured region.
#[cfg(target_arch = "s390x")]
#[inline(always)]
pub fn read_start() -> u64 {
    read_tod()
}

/// Read the TOD clock at the end of a measured region.
#[cfg(target_arch = "s390x")]
#[inline(always)]
pub fn read_end() -> u64 {
    read_tod()
}

// STCKE stores 16 bytes: one epoch byte, then the 8 bytes STCK would return.
// The machine is big-endian, so those 8 bytes read as a plain u64.
#[cfg(target_arch = "s390x")]
#[inline(always)]
fn read_tod() -> u64 {
    let mut clock = [0u8; 16];
    unsafe {
        asm!("stcke 0({})", in(reg_addr) clock.as_mut_ptr(), options(nostack));
    }
    let mut tod = [0u8; 8];
    tod.copy_from_slice(&clock[1..9]);
    u64::from_be_bytes(tod)
}

// =============================================================================
// Public API
// =============================================================================

/// Name of the counter read by `read_start` / `read_end`.
pub fn counter_name() -> &'static str {
    #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
    {
        "rdtsc"
    }
    #[cfg(target_arch = "aarch64")]
    {
        "cntvct_el0"
    }
    #[cfg(target_arch = "powerpc64")]
    {
        "mftb"
    }
    #[cfg(target_arch = "s390x")]
    {
        "stcke"
    }
}

/// Detect the counter frequency in Hz.
///
/// - **s390x**: the nominal TOD rate
/// - **aarch64**: `cntfrq_el0`, replaced by a calibrated value when the two
///   disagree by more than 10% (misprogrammed register under virtualization)
/// - **everything else**: calibration against `std::time::Instant`
///
/// The harness never calls this; raw tick deltas are written as-is and
/// converted downstream.
pub fn counter_frequency_hz() -> u64 {
    #[cfg(target_arch = "s390x")]
    {
        S390X_TOD_FREQ_HZ
    }

    #[cfg(target_arch = "aarch64")]
    {
        aarch64_counter_freq_hz()
    }

    #[cfg(not(any(target_arch = "s390x", target_arch = "aarch64")))]
    {
        calibrate_frequency_hz()
    }
}

/// Calibrate ticks per second against the OS monotonic clock.
///
/// Sleeps several times, converts each tick delta to a rate and returns the
/// median. Returns 0 if no sample produced a usable rate.
pub fn calibrate_frequency_hz() -> u64 {
    use std::time::{Duration, Instant};

    const SAMPLES: usize = 5;
    const SLEEP_MS: u64 = 20;

    let mut frequencies = Vec::with_capacity(SAMPLES);

    for _ in 0..SAMPLES {
        let start_ticks = read_start();
        let start_instant = Instant::now();

        std::thread::sleep(Duration::from_millis(SLEEP_MS));

        let end_ticks = read_end();
        let elapsed_ns = start_instant.elapsed().as_nanos() as u64;
        if elapsed_ns == 0 {
            continue;
        }

        let delta = end_ticks.wrapping_sub(start_ticks);
        let freq = ((delta as u128 * 1_000_000_000) / elapsed_ns as u128) as u64;
        if freq > 0 {
            frequencies.push(freq);
        }
    }

    if frequencies.is_empty() {
        tracing::warn!("{} calibration produced no usable samples", counter_name());
        return 0;
    }

    frequencies.sort_unstable();
    let median = frequencies[frequencies.len() / 2];

    tracing::debug!(
        "{} frequency calibrated to {:.2} MHz",
        counter_name(),
        median as f64 / 1_000_000.0
    );

    median
}

#[cfg(target_arch = "aarch64")]
fn aarch64_counter_freq_hz() -> u64 {
    let cntfrq: u64;
    unsafe {
        asm!("mrs {}, cntfrq_el0", out(reg) cntfrq, options(nomem, nostack));
    }

    let calibrated = calibrate_frequency_hz();
    if cntfrq == 0 {
        return calibrated;
    }

    let ratio = calibrated as f64 / cntfrq as f64;
    if !(0.9..=1.1).contains(&ratio) {
        tracing::warn!(
            "cntfrq_el0 ({:.2} MHz) differs from calibrated frequency ({:.2} MHz) by {:.1}%, using calibrated value",
            cntfrq as f64 / 1e6,
            calibrated as f64 / 1e6,
            (ratio - 1.0) * 100.0
        );
        return calibrated;
    }

    cntfrq
}
