// ABOUTME: The high-level modem API - configuration, session driver, and error types
// ABOUTME: Everything an application needs to send and receive SMS through one handle

mod config;
pub(crate) mod error;
mod session;

pub use config::{MessageMode, MessageStatus, MessageStorage, ModemConfig, QuirkConfig};
pub use error::{GsmError, GsmResult};
pub use session::{GsmModem, Hardware, SessionState, SignalStrength, SimInfo};
