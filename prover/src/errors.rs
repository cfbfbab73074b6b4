//! Error definitions for circuit encoding and proof generation.
use std::path::PathBuf;

use thiserror::Error;
use umbra_privacy::CodecError;

/// Errors raised while laying out a proof vector
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VectorError {
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// A layout slot had no value supplied
    #[error("No value supplied for slot '{0}'")]
    MissingSlot(&'static str),

    /// A repeated slot got the wrong number of items
    #[error("Slot '{label}' expects {expected} items, got {actual}")]
    SlotCount {
        label: &'static str,
        expected: usize,
        actual: usize,
    },

    /// The circuit has no vector layout in this crate
    #[error("No vector layout for circuit {0}")]
    NoLayout(&'static str),
}

/// Errors that can occur during proof generation
#[derive(Error, Debug)]
pub enum ProverError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Compiled circuit or proving key not found
    #[error("Circuit artifacts not found: {0}")]
    ArtifactsMissing(PathBuf),

    /// The proving toolchain exited unsuccessfully
    #[error("{command} failed: {stderr}")]
    CommandFailed { command: String, stderr: String },

    #[error("Proof generation timed out after {0}s")]
    Timeout(u64),

    /// Proof output was not in the expected shape
    #[error("Malformed proof output: {0}")]
    MalformedProof(String),

    #[error("Unknown circuit: {0}")]
    UnknownCircuit(String),

    /// Verification-key registry could not be read
    #[error("Registry error: {0}")]
    Registry(String),

    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// Result type for proving operations
pub type Result<T> = std::result::Result<T, ProverError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = ProverError::CommandFailed {
            command: "zokrates compute-witness".into(),
            stderr: "assertion failed".into(),
        };
        assert_eq!(
            err.to_string(),
            "zokrates compute-witness failed: assertion failed"
        );

        let err = ProverError::Timeout(600);
        assert_eq!(err.to_string(), "Proof generation timed out after 600s");

        let err = VectorError::SlotCount {
            label: "path",
            expected: 32,
            actual: 31,
        };
        assert_eq!(err.to_string(), "Slot 'path' expects 32 items, got 31");
    }

    #[test]
    fn test_codec_error_passes_through() {
        let err: VectorError = CodecError::EncodingOverflow {
            bits: 129,
            width: 128,
        }
        .into();
        assert_eq!(
            err.to_string(),
            "value needs 129 bits but the encoding holds only 128"
        );
    }
}
