//! An async driver for AT-command GSM modems over a serial line.
//!
//! The crate speaks the modem-facing side of SMS: it issues AT commands,
//! strips echo and unsolicited chatter out of responses, encodes and decodes
//! SMS PDUs (GSM 7-bit and UCS2, including concatenated messages), and
//! exposes a small session API — boot, send, poll for incoming messages,
//! query signal and network status.
//!
//! ```rust,no_run
//! use atgsm::{GsmModem, ModemConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let modem = GsmModem::new(ModemConfig::new("/dev/ttyUSB0"));
//!     modem.boot(false).await?;
//!     modem.wait_for_network().await?;
//!
//!     modem.send_sms("+250788123456", "Hello, World!").await?;
//!
//!     if let Some(msg) = modem.next_message(true, true).await? {
//!         println!("from {}: {}", msg.sender, msg.text);
//!     }
//!     Ok(())
//! }
//! ```

pub mod engine;
pub mod message;
pub mod modem;
pub mod pdu;
pub mod queue;
pub mod sanitizer;
pub mod transport;

#[cfg(test)]
mod tests;

// Re-export the main session API for easy access
pub use modem::{
    GsmError, GsmModem, GsmResult, Hardware, MessageMode, MessageStatus, MessageStorage,
    ModemConfig, QuirkConfig, SessionState, SignalStrength, SimInfo,
};

pub use engine::{CommandRequest, CommandResponse, CommandStatus};
pub use message::{IncomingMessage, SmsTimestamp};
pub use transport::{Transport, TransportConfig, TransportError};
