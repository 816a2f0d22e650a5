//! Streaming sign-and-time loop.
//!
//! A run moves through `INIT -> RUNNING -> {DRAINED | FAILED} -> CLEANUP`.
//! INIT opens the input, creates both outputs and loads the key. RUNNING
//! reads one block at a time and, for each full block, records the tick
//! delta of the backend signing call followed by the encoded signature, so
//! the Nth timing and the Nth signature always describe the Nth block.
//! Outputs are unbuffered, so a failed write surfaces on the record that
//! caused it and every record before it is already on disk. CLEANUP drops
//! the key session and the file handles when `run` returns.

use std::fmt;
use std::fs::File;
use std::io::{self, BufReader, Read, Write};
use std::path::Path;

use sigtime_core::{Clock, CycleClock};
use tracing::{debug, error, info, trace, warn};

use crate::config::RunConfig;
use crate::error::{HarnessError, Stream};
use crate::signer::{Backend, MeasuredWindow, Signer};

/// Size of one timing record in bytes.
pub const TIMING_RECORD_LEN: usize = 8;

/// Outcome of a drained run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    /// Backend that produced the records.
    pub backend: Backend,
    /// Work covered by each sample.
    pub window: MeasuredWindow,
    /// Number of blocks signed.
    pub records: u64,
    /// Total bytes written to the signature stream.
    pub signature_bytes: u64,
    /// Smallest tick delta, `None` for an empty run.
    pub min_ticks: Option<u64>,
    /// Largest tick delta, `None` for an empty run.
    pub max_ticks: Option<u64>,
}

impl RunSummary {
    fn new(backend: Backend, window: MeasuredWindow) -> Self {
        Self {
            backend,
            window,
            records: 0,
            signature_bytes: 0,
            min_ticks: None,
            max_ticks: None,
        }
    }

    fn record(&mut self, ticks: u64, signature_len: usize) {
        self.records += 1;
        self.signature_bytes += signature_len as u64;
        self.min_ticks = Some(self.min_ticks.map_or(ticks, |min| min.min(ticks)));
        self.max_ticks = Some(self.max_ticks.map_or(ticks, |max| max.max(ticks)));
    }

    /// Bytes written to the timing stream.
    pub fn timing_bytes(&self) -> u64 {
        self.records * TIMING_RECORD_LEN as u64
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} records, {} signature bytes, {} timing bytes",
            self.backend,
            self.records,
            self.signature_bytes,
            self.timing_bytes()
        )?;
        if let (Some(min), Some(max)) = (self.min_ticks, self.max_ticks) {
            write!(f, ", ticks {}..={}", min, max)?;
        }
        Ok(())
    }
}

/// The two output streams of a run.
///
/// Each record goes straight to its file with `write_all`.
struct Outputs {
    signatures: File,
    timings: File,
    records: u64,
}

impl Outputs {
    fn create(config: &RunConfig) -> Result<Self, HarnessError> {
        Ok(Self {
            signatures: create(Stream::Signatures, &config.signatures)?,
            timings: create(Stream::Timings, &config.timings)?,
            records: 0,
        })
    }

    fn write_record(&mut self, ticks: u64, signature: &[u8]) -> Result<(), HarnessError> {
        let record = self.records;
        self.timings
            .write_all(&ticks.to_ne_bytes())
            .map_err(|source| HarnessError::Write {
                stream: Stream::Timings,
                record,
                len: TIMING_RECORD_LEN,
                source,
            })?;
        self.signatures
            .write_all(signature)
            .map_err(|source| HarnessError::Write {
                stream: Stream::Signatures,
                record,
                len: signature.len(),
                source,
            })?;
        self.records += 1;
        Ok(())
    }
}

fn create(stream: Stream, path: &Path) -> Result<File, HarnessError> {
    File::create(path).map_err(|source| HarnessError::Open {
        stream,
        path: path.to_path_buf(),
        source,
    })
}

/// Fill `buf` from `reader`, stopping early only at end of input.
///
/// Returns the number of bytes read; less than `buf.len()` means the input
/// ended.
fn read_block<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Measurement harness generic over the tick source.
#[derive(Debug, Default)]
pub struct Harness<C: Clock = CycleClock> {
    clock: C,
}

impl Harness<CycleClock> {
    /// Harness reading the hardware counter of the build target.
    pub fn new() -> Self {
        Self::with_clock(CycleClock::new())
    }
}

impl<C: Clock> Harness<C> {
    /// Harness reading `clock`.
    pub fn with_clock(clock: C) -> Self {
        Self { clock }
    }

    /// The tick source.
    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Sign every block of `config.input` with backend `S`.
    ///
    /// The backend is `S`; a `config.backend` naming a different backend is
    /// reported with a warning and otherwise ignored. The error of a failed
    /// run is logged before returning. Records written before the failure
    /// stay in the outputs.
    pub fn run<S: Signer>(&self, config: &RunConfig) -> Result<RunSummary, HarnessError> {
        if config.backend != S::BACKEND {
            warn!(
                "configured backend {} ignored, running {}",
                config.backend,
                S::BACKEND
            );
        }
        config.validate_for(S::BACKEND)?;

        info!(
            "backend {}: measuring {} with {}",
            S::BACKEND,
            S::WINDOW,
            self.clock.name()
        );
        if S::WINDOW.includes_digest() {
            warn!(
                "backend {} times SHA-256 work with the signature; samples are not comparable across backends",
                S::BACKEND
            );
        }

        let input = File::open(&config.input).map_err(|source| HarnessError::Open {
            stream: Stream::Input,
            path: config.input.clone(),
            source,
        })?;
        let mut input = BufReader::new(input);
        let mut outputs = Outputs::create(config)?;
        debug!(
            "opened {}, writing {} and {}",
            config.input.display(),
            config.signatures.display(),
            config.timings.display()
        );

        let outcome = match S::load_key(&config.key) {
            Ok(mut signer) => self.drive(&mut signer, &mut input, &mut outputs, config),
            Err(source) => Err(HarnessError::KeyLoad(source)),
        };

        match outcome {
            Ok(summary) => {
                info!("{}", summary);
                Ok(summary)
            }
            Err(err) => {
                error!("{} ({} failure)", err, err.kind());
                info!("{} complete records kept", outputs.records);
                Err(err)
            }
        }
    }

    fn drive<S: Signer, R: Read>(
        &self,
        signer: &mut S,
        input: &mut R,
        outputs: &mut Outputs,
        config: &RunConfig,
    ) -> Result<RunSummary, HarnessError> {
        let mut block = vec![0u8; config.block_size];
        let mut signature = Vec::with_capacity(signer.max_signature_len());
        let mut summary = RunSummary::new(S::BACKEND, S::WINDOW);
        let mut record: u64 = 0;

        loop {
            if config.limit.is_some_and(|limit| record >= limit) {
                debug!("record limit {} reached", record);
                break;
            }

            let read = read_block(input, &mut block)
                .map_err(|source| HarnessError::Read { record, source })?;
            if read == 0 {
                debug!("input drained after {} records", record);
                break;
            }
            if read < block.len() {
                return Err(HarnessError::Truncated {
                    record,
                    read,
                    expected: block.len(),
                });
            }

            let prepared = signer
                .prepare(&block)
                .map_err(|source| HarnessError::Signer {
                    operation: "prepare",
                    record,
                    source,
                })?;

            let start = self.clock.read_start();
            let response = signer.sign(&prepared);
            let end = self.clock.read_end();
            drop(prepared);

            let response = response.map_err(|source| HarnessError::Signer {
                operation: "sign",
                record,
                source,
            })?;
            let ticks = end.wrapping_sub(start);

            signature.clear();
            signer
                .encode(response, &mut signature)
                .map_err(|source| HarnessError::Signer {
                    operation: "encode",
                    record,
                    source,
                })?;

            outputs.write_record(ticks, &signature)?;
            summary.record(ticks, signature.len());
            trace!(record, ticks, len = signature.len(), "record written");
            record += 1;
        }

        Ok(summary)
    }
}
