//! The measured window must contain the backend signing call and nothing
//! else. This binary installs a counting allocator and runs every backend
//! with a clock that reads the calling thread's heap operation count, so
//! each timing record is the number of allocations, reallocations and
//! frees between `read_start` and `read_end`.

mod common;

use std::alloc::{GlobalAlloc, Layout, System};
use std::cell::Cell;

use common::{random_blocks, Scratch};
use sigtime::{
    Backend, Clock, DeterministicSigner, Harness, KeystoreSigner, PemSigner, RunSummary,
    SexpSigner,
};

thread_local! {
    static HEAP_OPS: Cell<u64> = const { Cell::new(0) };
}

fn count_heap_op() {
    let _ = HEAP_OPS.try_with(|ops| ops.set(ops.get() + 1));
}

struct CountingAlloc;

unsafe impl GlobalAlloc for CountingAlloc {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        count_heap_op();
        unsafe { System.alloc(layout) }
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        count_heap_op();
        unsafe { System.dealloc(ptr, layout) }
    }

    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        count_heap_op();
        unsafe { System.alloc_zeroed(layout) }
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        count_heap_op();
        unsafe { System.realloc(ptr, layout, new_size) }
    }
}

#[global_allocator]
static GLOBAL: CountingAlloc = CountingAlloc;

/// Clock whose ticks are heap operations on the current thread.
struct HeapClock;

impl Clock for HeapClock {
    fn read_start(&self) -> u64 {
        HEAP_OPS.with(Cell::get)
    }

    fn read_end(&self) -> u64 {
        HEAP_OPS.with(Cell::get)
    }

    fn name(&self) -> &'static str {
        "heap operations"
    }
}

fn run_counted(backend: Backend, scratch: &Scratch) -> RunSummary {
    let config = scratch.config(backend);
    let harness = Harness::with_clock(HeapClock);
    match backend {
        Backend::Deterministic => harness.run::<DeterministicSigner>(&config),
        Backend::Pem => harness.run::<PemSigner>(&config),
        Backend::Sexp => harness.run::<SexpSigner>(&config),
        Backend::Keystore => harness.run::<KeystoreSigner>(&config),
    }
    .unwrap()
}

#[test]
fn signing_window_performs_no_heap_operations() {
    for backend in Backend::ALL {
        let scratch = Scratch::new();
        scratch.write_input(&random_blocks(3, 32));

        let summary = run_counted(backend, &scratch);
        assert_eq!(summary.records, 3, "{}", backend);
        assert_eq!(
            scratch.timings(),
            vec![0, 0, 0],
            "{}: heap operations inside the measured window",
            backend
        );
    }
}
