//! Stream-level behavior of a run: edge-case inputs, key failures and
//! sample sanity.

mod common;

use common::{random_blocks, Scratch};
use sigtime::{run, Backend, FailureKind, HarnessError, Stream};

// ============================================================================
// Input shapes
// ============================================================================

#[test]
fn empty_input_succeeds_with_empty_outputs() {
    let scratch = Scratch::new();
    scratch.write_input(&[]);

    let summary = run(&scratch.config(Backend::Deterministic)).unwrap();
    assert_eq!(summary.records, 0);
    assert!(scratch.signatures().is_empty());
    assert!(scratch.timings().is_empty());
}

#[test]
fn one_byte_short_block_fails_without_records() {
    let scratch = Scratch::new();
    scratch.write_input(&random_blocks(1, 31));

    let err = run(&scratch.config(Backend::Deterministic)).unwrap_err();
    assert_eq!(err.kind(), FailureKind::Truncation);
    assert!(matches!(
        err,
        HarnessError::Truncated {
            record: 0,
            read: 31,
            expected: 32
        }
    ));
    assert!(scratch.signatures().is_empty());
    assert!(scratch.timings().is_empty());
}

#[test]
fn trailing_partial_block_keeps_complete_records() {
    let scratch = Scratch::new();
    let mut input = random_blocks(2, 32);
    input.extend_from_slice(&[0xAA; 5]);
    scratch.write_input(&input);

    let err = run(&scratch.config(Backend::Sexp)).unwrap_err();
    assert!(matches!(err, HarnessError::Truncated { record: 2, read: 5, .. }));
    assert_eq!(scratch.timings().len(), 2);
    assert_eq!(scratch.signatures().len(), 2 * 64);
}

#[test]
fn limit_caps_record_count() {
    let scratch = Scratch::new();
    scratch.write_input(&random_blocks(5, 32));

    let config = scratch.config(Backend::Pem).limit(3);
    let summary = run(&config).unwrap();
    assert_eq!(summary.records, 3);
    assert_eq!(scratch.timings().len(), 3);
}

#[test]
fn missing_input_is_resource_failure() {
    let scratch = Scratch::new();
    let err = run(&scratch.config(Backend::Deterministic)).unwrap_err();

    assert_eq!(err.kind(), FailureKind::Resource);
    assert!(matches!(
        err,
        HarnessError::Open {
            stream: Stream::Input,
            ..
        }
    ));
}

// ============================================================================
// Key failures
// ============================================================================

#[test]
fn empty_key_fails_before_reading_input() {
    for backend in Backend::ALL {
        let scratch = Scratch::new();
        scratch.write_input(&random_blocks(3, 32));

        let config = scratch.config(backend);
        if backend == Backend::Keystore {
            std::fs::remove_file(config.key.path().join("signing.p8")).unwrap();
        } else {
            std::fs::write(config.key.path(), "").unwrap();
        }

        let err = run(&config).unwrap_err();
        assert!(
            matches!(err, HarnessError::KeyLoad(_)),
            "{}: {:?}",
            backend,
            err
        );
        assert_eq!(err.kind(), FailureKind::Crypto, "{}", backend);

        // Outputs are created before the key is loaded and stay empty.
        assert!(scratch.path("sigs.bin").exists(), "{}", backend);
        assert!(scratch.signatures().is_empty(), "{}", backend);
        assert!(scratch.timings().is_empty(), "{}", backend);
    }
}

#[test]
fn malformed_tag_value_key_is_rejected() {
    let scratch = Scratch::new();
    scratch.write_input(&random_blocks(1, 32));
    let config = scratch.config(Backend::Sexp);
    std::fs::write(config.key.path(), "curve=NIST P-256\nb=32\nd=00\n").unwrap();

    let err = run(&config).unwrap_err();
    assert!(matches!(err, HarnessError::KeyLoad(_)), "{:?}", err);
}

// ============================================================================
// Samples
// ============================================================================

#[test]
fn samples_are_positive_and_bounded() {
    let scratch = Scratch::new();
    scratch.write_input(&random_blocks(20, 32));

    let summary = run(&scratch.config(Backend::Deterministic)).unwrap();
    let timings = scratch.timings();
    assert_eq!(timings.len(), 20);

    for (i, &ticks) in timings.iter().enumerate() {
        assert!(ticks > 0, "sample {} is zero", i);
        assert!(ticks < 1_000_000_000, "sample {} implausibly large: {}", i, ticks);
    }
    assert_eq!(summary.min_ticks, timings.iter().copied().min());
    assert_eq!(summary.max_ticks, timings.iter().copied().max());
}

// ============================================================================
// Output failures
// ============================================================================

#[cfg(target_os = "linux")]
#[test]
fn full_timing_device_fails_on_first_record() {
    let scratch = Scratch::new();
    scratch.write_input(&random_blocks(50, 32));

    let mut config = scratch.config(Backend::Deterministic);
    config.timings = "/dev/full".into();

    let err = run(&config).unwrap_err();
    assert!(
        matches!(
            err,
            HarnessError::Write {
                stream: Stream::Timings,
                record: 0,
                ..
            }
        ),
        "{:?}",
        err
    );
    assert_eq!(err.kind(), FailureKind::Write);
    assert!(scratch.signatures().is_empty());
}

#[test]
fn short_sexp_block_is_config_failure() {
    let scratch = Scratch::new();
    scratch.write_input(&random_blocks(2, 8));

    let config = scratch.config(Backend::Sexp).block_size(8);
    let err = run(&config).unwrap_err();
    assert_eq!(err.kind(), FailureKind::Config);
    assert!(!scratch.path("sigs.bin").exists());
}
