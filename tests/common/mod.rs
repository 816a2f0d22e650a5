//! Scratch files and keys shared by the integration tests.

#![allow(dead_code)]

use std::path::PathBuf;

use p256::ecdsa::{SigningKey, VerifyingKey};
use p256::pkcs8::{EncodePrivateKey, LineEnding};
use p256::SecretKey;
use rand_core::OsRng;
use sigtime::{Backend, RunConfig};

/// Temporary directory holding one run's files.
pub struct Scratch {
    pub dir: tempfile::TempDir,
    pub secret: SecretKey,
}

impl Scratch {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
            secret: SecretKey::random(&mut OsRng),
        }
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        *SigningKey::from(&self.secret).verifying_key()
    }

    /// Write the key in the form `backend` expects and return its reference.
    pub fn write_key(&self, backend: Backend) -> PathBuf {
        match backend {
            Backend::Deterministic | Backend::Pem => {
                let path = self.path("key.pem");
                let pem = self.secret.to_pkcs8_pem(LineEnding::LF).unwrap();
                std::fs::write(&path, pem.as_bytes()).unwrap();
                path
            }
            Backend::Sexp => {
                let path = self.path("key.txt");
                let text = format!(
                    "# generated for tests\ncurve=NIST P-256\nd={}\nb=32\n",
                    hex::encode(self.secret.to_bytes())
                );
                std::fs::write(&path, text).unwrap();
                path
            }
            Backend::Keystore => {
                let store = self.path("store");
                std::fs::create_dir_all(&store).unwrap();
                let der = self.secret.to_pkcs8_der().unwrap();
                std::fs::write(store.join("signing.p8"), der.as_bytes()).unwrap();
                store
            }
        }
    }

    pub fn write_input(&self, bytes: &[u8]) {
        std::fs::write(self.path("input.bin"), bytes).unwrap();
    }

    /// Configuration for `backend` with freshly written key material.
    pub fn config(&self, backend: Backend) -> RunConfig {
        let key = self.write_key(backend);
        RunConfig::new(
            backend,
            self.path("input.bin"),
            self.path("sigs.bin"),
            self.path("times.bin"),
            key,
        )
    }

    pub fn signatures(&self) -> Vec<u8> {
        std::fs::read(self.path("sigs.bin")).unwrap()
    }

    pub fn timings(&self) -> Vec<u64> {
        sigtime::records::read_timings(&self.path("times.bin")).unwrap()
    }
}

/// `n` random blocks of `size` bytes.
pub fn random_blocks(n: usize, size: usize) -> Vec<u8> {
    (0..n * size).map(|_| rand::random::<u8>()).collect()
}
