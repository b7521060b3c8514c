// ABOUTME: Error taxonomy for GSM modem sessions, from transport failures to modem status codes
// ABOUTME: Distinguishes fatal I/O errors from retryable busy codes and inspectable command failures

use crate::engine::CommandStatus;
use crate::pdu::PduError;
use crate::transport::TransportError;
use thiserror::Error;

/// Errors surfaced by GSM modem operations.
///
/// Transport failures always propagate — the session is unusable until it is
/// reconnected. A terminal `ERROR`/CME/CMS status becomes [`GsmError::Command`]
/// unless the request tolerates errors, and busy code 515 is retried
/// internally, surfacing as [`GsmError::Busy`] only after exhaustion.
#[derive(Debug, Error)]
pub enum GsmError {
    /// The transport could not be opened; the session stays disconnected.
    #[error("connect failed: {0}")]
    Connect(String),

    /// I/O failure mid-command. Fatal, never retried.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The modem answered with a terminal error status.
    #[error("modem reported {status}")]
    Command { status: CommandStatus },

    /// Code 515 ("init or command in progress") persisted through every
    /// allowed retry.
    #[error("modem still busy after {retries} retries")]
    Busy { retries: u32 },

    /// The `> ` prompt expected during an SMS send never arrived.
    #[error("message prompt not received")]
    Prompt,

    /// A response that should have matched a known shape did not.
    #[error("unparseable response: {0}")]
    Parse(String),

    /// Incoming SMS payload could not be decoded. The message is dropped by
    /// the pipeline; this only escapes through the codec API itself.
    #[error(transparent)]
    Pdu(#[from] PduError),

    /// Operation requires a connected session.
    #[error("not connected")]
    NotConnected,
}

/// Result alias for modem operations.
pub type GsmResult<T> = Result<T, GsmError>;
