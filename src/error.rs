//! Error taxonomy (spec §7). Grounded on the teacher's `AppError`: a
//! `thiserror`-derived enum with one variant per failure class, plus
//! `From` conversions that wrap lower-level errors at the boundary instead
//! of threading a generic `anyhow` error through the core.

use serde::Serialize;
use thiserror::Error;

/// Exit-code tags from spec §6, carried on the error so a CLI adaptor can
/// map straight back to the wire-level `PM3_E*` status values without
/// re-deriving them from the error variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExitCode {
    Success,
    EInvArg,
    EMalloc,
    EFile,
    ETimeout,
    ESoft,
    EWrongAnswer,
    ERfTrans,
    EOpAborted,
    ETearOff,
    EOutOfBound,
    ENotImpl,
}

#[derive(Debug, Error, Serialize)]
pub enum CoreError {
    // --- Transient RF (spec §7 "Transient RF") ---
    #[error("timeout waiting for device reply to opcode {opcode:#06x}")]
    Timeout { opcode: u16 },
    #[error("CRC check failed on received frame")]
    CrcFail,
    #[error("parity check failed on received frame")]
    ParityFail,
    #[error("received frame has unexpected length: got {got}, expected {expected}")]
    WrongLength { got: usize, expected: usize },
    #[error("device replied with NACK (code {0:#04x})")]
    Nack(u8),

    // --- Protocol ---
    #[error("unexpected opcode in device reply: got {got:#06x}, expected {expected:#06x}")]
    UnexpectedOpcode { got: u16, expected: u16 },
    #[error("invalid state transition: {0}")]
    InvalidTransition(String),
    #[error("unsupported mode: {0}")]
    UnsupportedMode(String),

    // --- Authentication ---
    #[error("authentication failed")]
    AuthFailed,
    #[error("MAC verification failed")]
    MacFail,
    #[error("parity mismatch on expected ciphertext")]
    CipherParityMismatch,

    // --- Input ---
    #[error("malformed dump: {0}")]
    MalformedDump(String),
    #[error("file not found: {0}")]
    FileNotFound(String),
    #[error("hex parse error: {0}")]
    HexParse(String),
    #[error("offset {offset} out of bounds (len {len})")]
    OutOfBound { offset: usize, len: usize },

    // --- Resource ---
    #[error("out of memory allocating {0} bytes")]
    OutOfMemory(usize),

    // --- Tear-off ---
    #[error("write deliberately torn off")]
    TearOff,

    // --- Catch-all for not-yet-modeled device/command failures ---
    #[error("command failed: {0}")]
    CommandFailed(String),
    #[error("operation aborted by caller")]
    OpAborted,
    #[error("not implemented: {0}")]
    NotImplemented(String),
}

impl CoreError {
    /// Maps this error to the spec §6 exit-code taxonomy.
    pub fn exit_code(&self) -> ExitCode {
        match self {
            CoreError::Timeout { .. } => ExitCode::ETimeout,
            CoreError::CrcFail
            | CoreError::ParityFail
            | CoreError::Nack(_)
            | CoreError::UnexpectedOpcode { .. }
            | CoreError::AuthFailed
            | CoreError::MacFail
            | CoreError::CipherParityMismatch => ExitCode::EWrongAnswer,
            CoreError::WrongLength { .. } => ExitCode::ERfTrans,
            CoreError::InvalidTransition(_) | CoreError::UnsupportedMode(_) => ExitCode::ESoft,
            CoreError::MalformedDump(_) | CoreError::HexParse(_) => ExitCode::EInvArg,
            CoreError::FileNotFound(_) => ExitCode::EFile,
            CoreError::OutOfBound { .. } => ExitCode::EOutOfBound,
            CoreError::OutOfMemory(_) => ExitCode::EMalloc,
            CoreError::TearOff => ExitCode::ETearOff,
            CoreError::CommandFailed(_) => ExitCode::ESoft,
            CoreError::OpAborted => ExitCode::EOpAborted,
            CoreError::NotImplemented(_) => ExitCode::ENotImpl,
        }
    }
}

impl From<std::io::Error> for CoreError {
    fn from(e: std::io::Error) -> Self {
        CoreError::FileNotFound(e.to_string())
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(e: serde_json::Error) -> Self {
        CoreError::MalformedDump(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_code_mapping_is_stable() {
        assert_eq!(CoreError::AuthFailed.exit_code(), ExitCode::EWrongAnswer);
        assert_eq!(CoreError::TearOff.exit_code(), ExitCode::ETearOff);
        assert_eq!(
            CoreError::OutOfBound { offset: 5, len: 4 }.exit_code(),
            ExitCode::EOutOfBound
        );
    }
}
