//! # sigtime
//!
//! Cycle-accurate timing of single ECDSA signing operations.
//!
//! Given a private key and a file of fixed-size data blocks, `sigtime` signs
//! every block once with the selected backend and writes two streams in
//! lockstep: the signatures, and the hardware tick count of each signing
//! call. The raw samples feed downstream side-channel analysis (for example
//! nonce-dependent timing); nothing here interprets them.
//!
//! ## Quick Start
//!
//! ```ignore
//! use sigtime::{run, Backend, RunConfig};
//!
//! let config = RunConfig::new(
//!     Backend::Deterministic,
//!     "blocks.bin",
//!     "signatures.bin",
//!     "timings.bin",
//!     "key.pem",
//! );
//! let summary = run(&config)?;
//! println!("{}", summary);
//! ```
//!
//! ## Backends
//!
//! | Backend         | Key material            | Nonce    | Output        |
//! |-----------------|-------------------------|----------|---------------|
//! | `deterministic` | PKCS#8 PEM              | RFC 6979 | DER           |
//! | `pem`           | PKCS#8 PEM (`ring`)     | random   | DER           |
//! | `sexp`          | tag/value file          | random   | `r \|\| s`    |
//! | `keystore`      | directory of `.p8/.pem` | random   | DER           |
//!
//! Backends differ in how much hashing falls inside the measured window, see
//! [`MeasuredWindow`]. Compare samples within one backend only.
//!
//! ## Measurement hygiene
//!
//! Tick values come from a per-core counter. Pin the process to one core
//! and keep the machine quiet; migration between cores is not detected.

#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod harness;
pub mod keyfile;
pub mod records;
pub mod sexp;
pub mod signer;

pub use config::{ConfigError, RunConfig, DEFAULT_BLOCK_SIZE};
pub use error::{FailureKind, HarnessError, Stream};
pub use harness::{Harness, RunSummary};
pub use signer::{
    Backend, DeterministicSigner, KeyMaterial, KeystoreSigner, MeasuredWindow, PemSigner,
    SexpSigner, Signer, SignerError,
};
pub use sigtime_core::{Clock, CycleClock};

/// Run the backend named by `config.backend` on the hardware counter.
pub fn run(config: &RunConfig) -> Result<RunSummary, HarnessError> {
    let harness = Harness::new();
    match config.backend {
        Backend::Deterministic => harness.run::<DeterministicSigner>(config),
        Backend::Pem => harness.run::<PemSigner>(config),
        Backend::Sexp => harness.run::<SexpSigner>(config),
        Backend::Keystore => harness.run::<KeystoreSigner>(config),
    }
}
