// ABOUTME: Session configuration - timing/retry parameters and explicit modem quirk options
// ABOUTME: Quirks are resolved once at boot and carried in the session, not scattered as conditionals

use crate::transport::TransportConfig;
use num_enum::{IntoPrimitive, TryFromPrimitive};
use std::time::Duration;

/// SMS transfer mode selected with `AT+CMGF`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum MessageMode {
    /// Binary PDU mode (`AT+CMGF=0`). Preferred: encoding is unambiguous.
    #[default]
    Pdu = 0,
    /// Text mode (`AT+CMGF=1`), the fallback for firmware without PDU
    /// support.
    Text = 1,
}

/// Message storage selected with `AT+CPMS` at boot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MessageStorage {
    /// SIM storage (`"SM"`).
    #[default]
    Sim,
    /// Modem/phone storage (`"ME"`).
    Phone,
    /// Leave the firmware default alone.
    Default,
}

impl MessageStorage {
    pub(crate) fn memory_name(self) -> Option<&'static str> {
        match self {
            MessageStorage::Sim => Some("SM"),
            MessageStorage::Phone => Some("ME"),
            MessageStorage::Default => None,
        }
    }
}

/// Message status values used by the list command (`AT+CMGL`). The numeric
/// value is the PDU-mode argument; text mode uses the label form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum MessageStatus {
    ReceivedUnread = 0,
    ReceivedRead = 1,
    StoredUnsent = 2,
    StoredSent = 3,
    All = 4,
}

impl MessageStatus {
    pub(crate) fn text_mode_label(self) -> &'static str {
        match self {
            MessageStatus::ReceivedUnread => "REC UNREAD",
            MessageStatus::ReceivedRead => "REC READ",
            MessageStatus::StoredUnsent => "STO UNSENT",
            MessageStatus::StoredSent => "STO SENT",
            MessageStatus::All => "ALL",
        }
    }
}

/// Recognized modem quirk options, applied as a best-effort configuration
/// sequence during boot.
#[derive(Debug, Clone)]
pub struct QuirkConfig {
    /// Issue `ATE0` to disable command echo. The sanitizer copes either way;
    /// disabling it just saves bytes on slow links.
    pub echo_off: bool,
    /// Message mode to request. PDU mode falls back to text mode when the
    /// firmware rejects it; the resolved mode is carried in the session.
    pub preferred_mode: MessageMode,
    /// Storage to select for reading, writing, and receiving.
    pub storage: MessageStorage,
}

impl Default for QuirkConfig {
    fn default() -> Self {
        QuirkConfig {
            echo_off: true,
            preferred_mode: MessageMode::default(),
            storage: MessageStorage::default(),
        }
    }
}

/// Full session configuration.
#[derive(Debug, Clone)]
pub struct ModemConfig {
    pub transport: TransportConfig,
    /// How many times a command is retried when the modem reports busy (515).
    pub max_retries: u32,
    /// Pause between busy retries.
    pub retry_delay: Duration,
    /// Settle pause after every command; modems are slow and get confused
    /// easily.
    pub cmd_delay: Duration,
    pub quirks: QuirkConfig,
}

impl Default for ModemConfig {
    fn default() -> Self {
        ModemConfig {
            transport: TransportConfig::default(),
            max_retries: 10,
            retry_delay: Duration::from_secs(2),
            cmd_delay: Duration::from_millis(100),
            quirks: QuirkConfig::default(),
        }
    }
}

impl ModemConfig {
    /// Configuration for the given serial port, with default timing.
    pub fn new(port: impl Into<String>) -> Self {
        ModemConfig {
            transport: TransportConfig::new(port),
            ..Default::default()
        }
    }

    pub fn baud_rate(mut self, baud: u32) -> Self {
        self.transport.baud_rate = baud;
        self
    }

    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.transport.read_timeout = timeout;
        self
    }

    pub fn max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn cmd_delay(mut self, delay: Duration) -> Self {
        self.cmd_delay = delay;
        self
    }

    pub fn quirks(mut self, quirks: QuirkConfig) -> Self {
        self.quirks = quirks;
        self
    }
}
