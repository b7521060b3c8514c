// ABOUTME: AT command engine - serialized dispatch, response sanitization, and retry-on-busy policy
// ABOUTME: Owns the transport behind an async mutex so no two commands are ever in flight at once

use crate::modem::error::{GsmError, GsmResult};
use crate::queue::EventQueue;
use crate::sanitizer::{LineClass, Notification, Sanitizer};
use crate::transport::Transport;
use std::fmt;
use std::time::Duration;

/// GSM error code for "init or command in progress" — the only status that
/// triggers an internal retry.
const BUSY_CODE: u16 = 515;

/// Terminal status of one AT command exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandStatus {
    /// The modem answered `OK`.
    Ok,
    /// Bare `ERROR` (or the non-standard `COMMAND NOT SUPPORT` some Huawei
    /// firmware emits). `AT+CMEE=1` is issued at boot to get codes instead,
    /// but not every modem obliges.
    Error,
    /// `+CME ERROR: <code>` — mobile equipment error.
    Cme(u16),
    /// `+CMS ERROR: <code>` — message service error.
    Cms(u16),
}

impl CommandStatus {
    /// Detect a terminal status line; `None` means the line is body content.
    pub fn from_line(line: &str) -> Option<CommandStatus> {
        match line {
            "OK" => return Some(CommandStatus::Ok),
            "ERROR" | "COMMAND NOT SUPPORT" => return Some(CommandStatus::Error),
            _ => {}
        }
        if let Some(code) = line.strip_prefix("+CME ERROR:") {
            return Some(match code.trim().parse() {
                Ok(code) => CommandStatus::Cme(code),
                Err(_) => CommandStatus::Error,
            });
        }
        if let Some(code) = line.strip_prefix("+CMS ERROR:") {
            return Some(match code.trim().parse() {
                Ok(code) => CommandStatus::Cms(code),
                Err(_) => CommandStatus::Error,
            });
        }
        None
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, CommandStatus::Ok)
    }

    /// Whether this status is the retryable busy code.
    pub fn is_busy(&self) -> bool {
        matches!(self, CommandStatus::Cme(BUSY_CODE) | CommandStatus::Cms(BUSY_CODE))
    }

    /// The numeric CME/CMS code, if one was reported.
    pub fn code(&self) -> Option<u16> {
        match self {
            CommandStatus::Cme(code) | CommandStatus::Cms(code) => Some(*code),
            _ => None,
        }
    }
}

impl fmt::Display for CommandStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandStatus::Ok => write!(f, "OK"),
            CommandStatus::Error => write!(f, "ERROR"),
            CommandStatus::Cme(code) => write!(f, "+CME ERROR: {code}"),
            CommandStatus::Cms(code) => write!(f, "+CMS ERROR: {code}"),
        }
    }
}

/// One AT command request. Transient: lives for a single [`CommandEngine::command`]
/// invocation, including its retries.
#[derive(Debug, Clone)]
pub struct CommandRequest {
    pub cmd: String,
    pub read_term: String,
    pub read_timeout: Option<Duration>,
    pub write_term: String,
    pub raise_errors: bool,
}

impl CommandRequest {
    pub fn new(cmd: impl Into<String>) -> Self {
        CommandRequest {
            cmd: cmd.into(),
            read_term: "\r\n".to_string(),
            read_timeout: None,
            write_term: "\r".to_string(),
            raise_errors: true,
        }
    }

    /// Override the per-read deadline for this request only.
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = Some(timeout);
        self
    }

    /// Override the bytes appended to the command before writing. SMS payload
    /// writes terminate with Ctrl-Z instead of CR.
    pub fn write_term(mut self, term: impl Into<String>) -> Self {
        self.write_term = term.into();
        self
    }

    /// Return a non-OK response to the caller instead of an error.
    pub fn tolerate_errors(mut self) -> Self {
        self.raise_errors = false;
        self
    }
}

/// The sanitized response to one AT command.
///
/// Invariant: `lines` never contains the command echo, a notification line,
/// blank lines, or the terminal status token itself.
#[derive(Debug, Clone)]
pub struct CommandResponse {
    pub lines: Vec<String>,
    pub status: CommandStatus,
}

impl CommandResponse {
    pub fn ok(&self) -> bool {
        self.status.is_ok()
    }
}

/// Engine timing and retry parameters, resolved from the modem configuration.
#[derive(Debug, Clone)]
pub(crate) struct EngineConfig {
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub cmd_delay: Duration,
    pub read_timeout: Duration,
}

/// Serialized AT command dispatch over one transport.
///
/// AT responses carry no correlation identifier, so overlapping commands
/// would corrupt sanitization; the transport sits behind an async mutex and
/// every exchange (write plus all of its reads) holds the lock. Unsolicited
/// notifications captured mid-command land in [`CommandEngine::notifications`].
pub struct CommandEngine {
    io: tokio::sync::Mutex<Option<Box<dyn Transport>>>,
    notifications: EventQueue<Notification>,
    config: EngineConfig,
}

impl CommandEngine {
    pub(crate) fn new(config: EngineConfig) -> Self {
        CommandEngine {
            io: tokio::sync::Mutex::new(None),
            notifications: EventQueue::new(),
            config,
        }
    }

    /// Install a transport (on connect). Any previous transport is dropped.
    pub(crate) async fn attach(&self, transport: Box<dyn Transport>) {
        *self.io.lock().await = Some(transport);
    }

    /// Remove and return the transport (on disconnect).
    pub(crate) async fn detach(&self) -> Option<Box<dyn Transport>> {
        self.io.lock().await.take()
    }

    /// Unsolicited notifications captured during command execution.
    pub fn notifications(&self) -> &EventQueue<Notification> {
        &self.notifications
    }

    /// Issue one AT command and return its sanitized response.
    ///
    /// If the modem reports error 515 the entire request is re-issued, after
    /// a delay, up to `max_retries` times. Any other failure is terminal for
    /// the attempt: surfaced as [`GsmError::Command`] when the request raises
    /// errors, or returned as a non-OK response otherwise. Transport failures
    /// always propagate.
    pub async fn command(&self, request: CommandRequest) -> GsmResult<CommandResponse> {
        let mut retries = 0;

        loop {
            let response = {
                let mut guard = self.io.lock().await;
                let transport = guard.as_mut().ok_or(GsmError::NotConnected)?;
                self.exchange(transport.as_mut(), &request).await?
            };

            // Give slow firmware a moment to settle between commands.
            if !self.config.cmd_delay.is_zero() {
                tokio::time::sleep(self.config.cmd_delay).await;
            }

            if response.status.is_busy() {
                retries += 1;
                if retries >= self.config.max_retries {
                    tracing::warn!(cmd = %request.cmd, retries, "modem busy, retries exhausted");
                    return Err(GsmError::Busy { retries });
                }
                tracing::debug!(cmd = %request.cmd, retries, "modem busy (515), retrying");
                tokio::time::sleep(self.config.retry_delay).await;
                continue;
            }

            if !response.ok() && request.raise_errors {
                return Err(GsmError::Command {
                    status: response.status,
                });
            }

            return Ok(response);
        }
    }

    /// One write-then-read pass: write the command, classify every line until
    /// a terminal status is seen, and queue captured notifications.
    async fn exchange(
        &self,
        transport: &mut dyn Transport,
        request: &CommandRequest,
    ) -> GsmResult<CommandResponse> {
        tracing::debug!(cmd = %request.cmd, "issuing command");

        let mut wire = request.cmd.clone();
        wire.push_str(&request.write_term);
        transport.write(wire.as_bytes()).await?;

        let timeout = request.read_timeout.unwrap_or(self.config.read_timeout);
        let mut sanitizer = Sanitizer::new(&request.cmd);
        let mut lines = Vec::new();

        loop {
            let raw = transport.read_line(&request.read_term, timeout).await?;
            let line = raw.trim();

            match sanitizer.classify(line) {
                LineClass::Echo | LineClass::Noise => continue,
                LineClass::Notification(notification) => {
                    tracing::debug!(?notification, "captured unsolicited notification");
                    self.notifications.push(notification);
                }
                LineClass::Content(content) => {
                    if let Some(status) = CommandStatus::from_line(&content) {
                        return Ok(CommandResponse { lines, status });
                    }
                    lines.push(content);
                }
            }
        }
    }

    /// Issue a single AT command and return its one content line.
    ///
    /// The contract is strict: the response must carry exactly one content
    /// line, and if `prefix` is given the line must start with it (the prefix
    /// is stripped from the return value). Every other shape — zero or many
    /// lines, an error status, even a transport failure — yields `None`, so
    /// callers never need failure handling for malformed responses.
    pub async fn query(&self, cmd: &str, prefix: Option<&str>) -> Option<String> {
        let response = match self.command(CommandRequest::new(cmd).tolerate_errors()).await {
            Ok(response) if response.ok() => response,
            _ => return None,
        };
        match response.lines.as_slice() {
            [line] => match prefix {
                Some(prefix) => line.strip_prefix(prefix).map(|s| s.trim().to_string()),
                None => Some(line.trim().to_string()),
            },
            _ => None,
        }
    }

    /// Issue a single AT command and return its content lines.
    ///
    /// Requires a terminal `OK`; any failure shape yields an empty vector, so
    /// the result is always iterable. With `prefix`, non-matching lines are
    /// dropped and the prefix is stripped from the rest.
    pub async fn query_list(&self, cmd: &str, prefix: Option<&str>) -> Vec<String> {
        let response = match self.command(CommandRequest::new(cmd).tolerate_errors()).await {
            Ok(response) if response.ok() => response,
            _ => return Vec::new(),
        };

        match prefix {
            Some(prefix) => response
                .lines
                .into_iter()
                .filter_map(|line| line.strip_prefix(prefix).map(|s| s.trim().to_string()))
                .collect(),
            None => response.lines,
        }
    }

    /// Write a single ESC byte, abandoning an SMS payload prompt. If this is
    /// missed after a failed send, all subsequent writes go into the message.
    pub(crate) async fn cancel_prompt(&self) {
        if let Some(transport) = self.io.lock().await.as_mut() {
            let _ = transport.write(&[0x1b]).await;
        }
    }
}

/// Split comma-separated AT output, honoring double quotes. Many query
/// replies strongly resemble single-line CSV without being formally
/// specified as such.
pub(crate) fn split_fields(out: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for ch in out.chars() {
        match ch {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => fields.push(std::mem::take(&mut current)),
            _ => current.push(ch),
        }
    }
    fields.push(current);
    fields.into_iter().map(|f| f.trim().to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_status_detection() {
        assert_eq!(CommandStatus::from_line("OK"), Some(CommandStatus::Ok));
        assert_eq!(CommandStatus::from_line("ERROR"), Some(CommandStatus::Error));
        assert_eq!(
            CommandStatus::from_line("COMMAND NOT SUPPORT"),
            Some(CommandStatus::Error)
        );
        assert_eq!(
            CommandStatus::from_line("+CME ERROR: 515"),
            Some(CommandStatus::Cme(515))
        );
        assert_eq!(
            CommandStatus::from_line("+CMS ERROR: 321"),
            Some(CommandStatus::Cms(321))
        );
        assert_eq!(CommandStatus::from_line("+CSQ: 20,99"), None);
    }

    #[test]
    fn busy_status() {
        assert!(CommandStatus::Cme(515).is_busy());
        assert!(CommandStatus::Cms(515).is_busy());
        assert!(!CommandStatus::Cme(10).is_busy());
        assert!(!CommandStatus::Ok.is_busy());
    }

    #[test]
    fn field_splitting_honors_quotes() {
        assert_eq!(
            split_fields("0,0,\"MTN Rwanda\",2"),
            vec!["0", "0", "MTN Rwanda", "2"]
        );
        assert_eq!(split_fields("\"a,b\",c"), vec!["a,b", "c"]);
        assert_eq!(split_fields("0"), vec!["0"]);
    }
}
