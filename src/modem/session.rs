// ABOUTME: The GSM modem session - lifecycle, SMS send/receive pipeline, and status accessors
// ABOUTME: Orchestrates the command engine, PDU codec, and notification queue behind one handle

use crate::engine::{
    CommandEngine, CommandRequest, CommandResponse, EngineConfig, split_fields,
};
use crate::message::{
    IncomingMessage, MultipartAssembler, SmsTimestamp, decode_text_payload, encode_text_payload,
};
use crate::modem::config::{MessageMode, MessageStatus, ModemConfig};
use crate::modem::error::{GsmError, GsmResult};
use crate::pdu::{DeliverPdu, SubmitPdu};
use crate::queue::EventQueue;
use crate::sanitizer::Notification;
use crate::transport::{SerialTransport, Transport, TransportError};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

/// Connection state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

/// Result of a signal-strength query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalStrength {
    /// Signal as a percentage of the modem's 0–31 RSSI scale.
    Percent(u8),
    /// The modem answered but reported "not known or not detectable" (99).
    Unknown,
    /// The query itself failed or could not be parsed.
    Unavailable,
}

/// Modem identity answers. Contents are entirely manufacturer-dependent and
/// vary wildly between devices; a query the modem does not answer is simply
/// absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Hardware {
    pub manufacturer: Option<String>,
    pub model: Option<String>,
    pub revision: Option<String>,
    pub serial: Option<String>,
    pub imei: Option<String>,
}

/// SIM card identity answers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SimInfo {
    pub iccid: Option<String>,
    pub imsi: Option<String>,
}

/// A session-layer driver for one GSM modem on a serial byte stream.
///
/// All methods take `&self`: the transport sits behind the engine's async
/// mutex (no two commands in flight) and the notification and incoming
/// queues are safe for one producer and one consumer, so a polling task and
/// direct application calls can share a session through an `Arc` without
/// further locking. See [`GsmModem::next_message`] for the cooperative
/// polling contract.
///
/// ```rust,no_run
/// use atgsm::{GsmModem, ModemConfig};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let modem = GsmModem::new(ModemConfig::new("/dev/ttyUSB0"));
///     modem.boot(false).await?;
///     modem.wait_for_network().await?;
///
///     modem.send_sms("+250788123456", "Hey, wake up!").await?;
///
///     while let Some(msg) = modem.next_message(true, true).await? {
///         println!("from {}: {}", msg.sender, msg.text);
///     }
///     Ok(())
/// }
/// ```
pub struct GsmModem {
    config: ModemConfig,
    engine: CommandEngine,
    state: Mutex<SessionState>,
    /// Message mode actually in effect, resolved once at boot.
    mode: Mutex<MessageMode>,
    incoming: EventQueue<IncomingMessage>,
    assembler: MultipartAssembler,
    /// Cache for the AT+COPN operator table; it is slow and large.
    known_networks: Mutex<Option<HashMap<String, String>>>,
}

impl GsmModem {
    /// Create a session around the configured serial port. No I/O happens
    /// until [`GsmModem::connect`] or [`GsmModem::boot`] is called.
    pub fn new(config: ModemConfig) -> Self {
        let engine_config = EngineConfig {
            max_retries: config.max_retries,
            retry_delay: config.retry_delay,
            cmd_delay: config.cmd_delay,
            read_timeout: config.transport.read_timeout,
        };
        GsmModem {
            engine: CommandEngine::new(engine_config),
            state: Mutex::new(SessionState::Disconnected),
            mode: Mutex::new(config.quirks.preferred_mode),
            incoming: EventQueue::new(),
            assembler: MultipartAssembler::new(),
            known_networks: Mutex::new(None),
            config,
        }
    }

    /// Create a session around a ready-made transport, which is treated as
    /// already connected. Useful for tests and for wrapping the serial
    /// connection with custom logic.
    pub async fn with_transport(config: ModemConfig, transport: Box<dyn Transport>) -> Self {
        let modem = GsmModem::new(config);
        modem.engine.attach(transport).await;
        *modem.state.lock().unwrap() = SessionState::Connected;
        modem
    }

    pub fn state(&self) -> SessionState {
        *self.state.lock().unwrap()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == SessionState::Connected
    }

    /// The message mode in effect (meaningful after boot).
    pub fn message_mode(&self) -> MessageMode {
        *self.mode.lock().unwrap()
    }

    fn ensure_connected(&self) -> GsmResult<()> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(GsmError::NotConnected)
        }
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Open the transport. A no-op when already connected, unless
    /// `reconnect` forces the connection to be torn down and re-established
    /// (useful when the connection has died but nobody noticed).
    pub async fn connect(&self, reconnect: bool) -> GsmResult<()> {
        if self.is_connected() && !reconnect {
            return Ok(());
        }
        if reconnect {
            self.disconnect().await?;
        }

        tracing::info!("connecting");
        *self.state.lock().unwrap() = SessionState::Connecting;

        match SerialTransport::open(&self.config.transport) {
            Ok(transport) => {
                self.engine.attach(Box::new(transport)).await;
                *self.state.lock().unwrap() = SessionState::Connected;
                Ok(())
            }
            Err(e) => {
                *self.state.lock().unwrap() = SessionState::Disconnected;
                Err(GsmError::Connect(e.to_string()))
            }
        }
    }

    /// Close the transport and drop any partially assembled multi-part
    /// messages. Already-complete incoming messages stay queued.
    pub async fn disconnect(&self) -> GsmResult<()> {
        tracing::info!("disconnecting");
        if let Some(mut transport) = self.engine.detach().await {
            let _ = transport.close().await;
        }
        *self.state.lock().unwrap() = SessionState::Disconnected;
        self.assembler.clear();
        Ok(())
    }

    /// (Re-)connect and configure the modem, in an often vain attempt to
    /// standardize the behavior of the many vendors and models.
    ///
    /// Every configuration step is best-effort — plenty of modems lack one
    /// command or another — but a transport failure aborts the boot. The
    /// message mode that actually took effect is recorded in the session.
    pub async fn boot(&self, reboot: bool) -> GsmResult<()> {
        tracing::info!(reboot, "booting");

        if reboot {
            self.connect(true).await?;
            self.engine.command(CommandRequest::new("AT+CFUN=1")).await?;
        } else {
            self.connect(false).await?;
        }

        let quirks = &self.config.quirks;
        if quirks.echo_off {
            self.configure("ATE0").await?; // echo off
        }
        self.configure("AT+CMEE=1").await?; // numeric error codes
        self.configure("AT+WIND=0").await?; // disable wavecom notifications

        let mode = match quirks.preferred_mode {
            MessageMode::Pdu => {
                if self.configure("AT+CMGF=0").await?.ok() {
                    MessageMode::Pdu
                } else {
                    tracing::warn!("PDU mode rejected, falling back to text mode");
                    self.configure("AT+CMGF=1").await?;
                    MessageMode::Text
                }
            }
            MessageMode::Text => {
                self.configure("AT+CMGF=1").await?;
                MessageMode::Text
            }
        };
        if mode == MessageMode::Text {
            self.configure("AT+CSCS=\"GSM\"").await?;
        }
        *self.mode.lock().unwrap() = mode;

        if let Some(mem) = quirks.storage.memory_name() {
            self.configure(&format!("AT+CPMS=\"{mem}\",\"{mem}\",\"{mem}\""))
                .await?;
        }

        Ok(())
    }

    /// Disconnect, reconnect, and reset the modem (`AT+CFUN=1` clears all
    /// volatile state). This drops the network registration, so call
    /// [`GsmModem::wait_for_network`] afterwards.
    pub async fn reboot(&self) -> GsmResult<()> {
        self.boot(true).await
    }

    /// One best-effort boot step: modem status failures are tolerated,
    /// transport failures propagate.
    async fn configure(&self, cmd: &str) -> GsmResult<CommandResponse> {
        let response = self
            .engine
            .command(CommandRequest::new(cmd).tolerate_errors())
            .await?;
        if !response.ok() {
            tracing::warn!(cmd, status = %response.status, "configuration step rejected");
        }
        Ok(response)
    }

    /// Issue `AT` and report whether it was acknowledged. Since unsolicited
    /// notifications are intercepted during any command, this doubles as a
    /// cheap poll for new messages.
    pub async fn ping(&self) -> bool {
        self.engine.command(CommandRequest::new("AT")).await.is_ok()
    }

    /// Block until the signal strength indicates the device is active on
    /// the network, polling with a capped backoff. There is no deadline; a
    /// caller wanting to abort must close the connection, which unwinds
    /// this loop with a transport error.
    pub async fn wait_for_network(&self) -> GsmResult<u8> {
        self.ensure_connected()?;
        let mut delay = Duration::from_secs(1);
        loop {
            if let SignalStrength::Percent(percent) = self.signal_strength().await
                && percent > 0
            {
                tracing::info!(percent, "network acquired");
                return Ok(percent);
            }
            tokio::time::sleep(delay).await;
            delay = (delay * 2).min(Duration::from_secs(8));
        }
    }

    // ------------------------------------------------------------------
    // Status accessors
    // ------------------------------------------------------------------

    /// Query the modem's identity strings.
    pub async fn hardware(&self) -> Hardware {
        Hardware {
            manufacturer: self.engine.query("AT+CGMI", None).await,
            model: self.engine.query("AT+CGMM", None).await,
            revision: self.engine.query("AT+CGMR", None).await,
            serial: self.engine.query("AT+CGSN", None).await,
            imei: self.engine.query("AT+GSN", None).await,
        }
    }

    /// Query the SIM card's identity strings.
    pub async fn sim_info(&self) -> SimInfo {
        SimInfo {
            iccid: self.engine.query("AT+CXXCID", Some("+CXXCID:")).await,
            imsi: self.engine.query("AT+CIMI", None).await,
        }
    }

    /// Query the current signal strength (`AT+CSQ`).
    pub async fn signal_strength(&self) -> SignalStrength {
        let Some(data) = self.engine.query("AT+CSQ", Some("+CSQ:")).await else {
            return SignalStrength::Unavailable;
        };
        let Some(rssi) = data
            .split(',')
            .next()
            .and_then(|v| v.trim().parse::<u8>().ok())
        else {
            return SignalStrength::Unavailable;
        };

        if rssi >= 99 {
            SignalStrength::Unknown
        } else {
            let percent = u16::from(rssi.min(31)) * 100 / 31;
            SignalStrength::Percent(percent as u8)
        }
    }

    /// Name of the currently selected network, when it can be determined.
    ///
    /// `AT+COPS?` reports the operator in whatever format the modem is set
    /// to; a numeric operator id is resolved through the modem's own
    /// `AT+COPN` table, fetched once and cached.
    pub async fn network(&self) -> Option<String> {
        let data = self.engine.query("AT+COPS?", Some("+COPS:")).await?;
        let fields = split_fields(&data);

        match fields.as_slice() {
            // Only the mode: nothing is selected, describe why.
            [mode] => plmn_mode_description(mode).map(str::to_string),
            [_, format, operator, ..] => match format.as_str() {
                // Long or short alphanumeric — usable as-is.
                "0" | "1" => Some(operator.clone()),
                "2" => self.lookup_network(operator).await,
                _ => None,
            },
            _ => None,
        }
    }

    async fn lookup_network(&self, id: &str) -> Option<String> {
        {
            let cache = self.known_networks.lock().unwrap();
            if let Some(map) = cache.as_ref() {
                return map.get(id).cloned();
            }
        }

        let lines = self.engine.query_list("AT+COPN", Some("+COPN:")).await;
        let map: HashMap<String, String> = lines
            .iter()
            .filter_map(|line| {
                let fields = split_fields(line);
                match fields.as_slice() {
                    [num, name, ..] => Some((num.clone(), name.clone())),
                    _ => None,
                }
            })
            .collect();

        let result = map.get(id).cloned();
        *self.known_networks.lock().unwrap() = Some(map);
        result
    }

    /// The service-center address in use, or `None` when the modem does not
    /// support `AT+CSCA`.
    pub async fn service_center(&self) -> Option<String> {
        let data = self.engine.query("AT+CSCA?", None).await?;
        let rest = data.strip_prefix("+CSCA:")?;
        let fields = split_fields(rest);
        let number = fields.first()?;
        let valid = !number.is_empty()
            && number
                .strip_prefix('+')
                .unwrap_or(number)
                .bytes()
                .all(|b| b.is_ascii_digit());
        valid.then(|| number.clone())
    }

    /// Set the service-center address. Returns `Ok(false)` when the modem
    /// rejects the command (some lack it entirely).
    pub async fn set_service_center(&self, value: &str) -> GsmResult<bool> {
        let response = self
            .engine
            .command(CommandRequest::new(format!("AT+CSCA=\"{value}\"")).tolerate_errors())
            .await?;
        Ok(response.ok())
    }

    // ------------------------------------------------------------------
    // Message pipeline
    // ------------------------------------------------------------------

    /// Send an SMS to `recipient` and return the modem's message reference.
    ///
    /// In PDU mode the text is encoded with the narrowest alphabet that can
    /// represent it; in text mode, non-ASCII text takes a detour through the
    /// modem's hex/UCS2 payload setting. Text longer than one segment is an
    /// error — no automatic segmentation is attempted.
    pub async fn send_sms(&self, recipient: &str, text: &str) -> GsmResult<u8> {
        self.ensure_connected()?;

        match self.message_mode() {
            MessageMode::Pdu => {
                let pdu = SubmitPdu::new(recipient, text)?;
                self.send_with_prompt(&format!("AT+CMGS={}", pdu.tpdu_len()), &pdu.to_hex())
                    .await
            }
            MessageMode::Text => self.send_text_mode(recipient, text).await,
        }
    }

    async fn send_text_mode(&self, recipient: &str, text: &str) -> GsmResult<u8> {
        let mut payload = text.to_string();
        let mut restore = None;

        // Non-ASCII text: switch the data coding to 8 (hex payload), send
        // the text as hex UTF-16, and put the old mode back afterwards.
        if !text.is_ascii()
            && let Some(csmp) = self.engine.query("AT+CSMP?", Some("+CSMP:")).await
        {
            let mut fields = split_fields(&csmp);
            if fields.len() == 4 {
                let old = fields.join(",");
                fields[3] = "8".to_string();
                self.configure(&format!("AT+CSMP={}", fields.join(","))).await?;
                payload = encode_text_payload(text);
                restore = Some(old);
            }
        }

        let result = self
            .send_with_prompt(&format!("AT+CMGS=\"{recipient}\""), &payload)
            .await;

        if let Some(old) = restore {
            let _ = self.configure(&format!("AT+CSMP={old}")).await;
            let _ = self.configure("AT+CSCS=\"GSM\"").await;
        }
        result
    }

    /// Drive the two-stage `AT+CMGS` dialogue: issue the initiating command
    /// with a short read deadline, expect the deadline to trip with the
    /// `> ` prompt pending (the prompt is never newline-terminated), then
    /// write the payload terminated by Ctrl-Z and confirm `+CMGS: <ref>`.
    ///
    /// We cannot simply wait for the prompt: some modems echo it FOLLOWED BY
    /// a CMS error, which is why the initiating command gets a whole second
    /// to fail first. Whenever the dialogue dies after the prompt may have
    /// appeared, an ESC is written to abandon it — otherwise all subsequent
    /// writes would go into the message body.
    async fn send_with_prompt(&self, initiate: &str, payload: &str) -> GsmResult<u8> {
        let prompt = self
            .engine
            .command(CommandRequest::new(initiate).read_timeout(Duration::from_secs(1)))
            .await;

        match prompt {
            Err(GsmError::Transport(TransportError::Timeout { pending }))
                if pending.contains('>') => {}
            Err(e) => {
                self.engine.cancel_prompt().await;
                return Err(e);
            }
            Ok(_) => {
                // No prompt, no error. No idea what is going on.
                self.engine.cancel_prompt().await;
                return Err(GsmError::Prompt);
            }
        }

        match self
            .engine
            .command(CommandRequest::new(payload).write_term("\u{1a}"))
            .await
        {
            Ok(response) => parse_send_reference(&response)
                .ok_or_else(|| GsmError::Parse("send acknowledgment missing +CMGS".to_string())),
            Err(e) => {
                self.engine.cancel_prompt().await;
                Err(e)
            }
        }
    }

    /// Return the next waiting incoming message, or `None` when there is
    /// nothing to deliver.
    ///
    /// `ping` issues a no-op `AT` first, giving firmware that defers
    /// notification delivery a chance to flush; `fetch` additionally queries
    /// storage for unread messages, which is needed just as often because
    /// most handsets don't support notification-style delivery at all. Both
    /// flags are I/O optimizations for callers already polling elsewhere,
    /// not a correctness requirement.
    pub async fn next_message(&self, ping: bool, fetch: bool) -> GsmResult<Option<IncomingMessage>> {
        if ping {
            self.ping().await;
        }

        // Drain notifications captured during any earlier command.
        while let Some(notification) = self.engine.notifications().pop() {
            match notification {
                Notification::MessageReceived { header, payload } => {
                    // Acknowledge receipt before queueing, so a quick reply
                    // cannot race the acknowledgment. Some networks reject
                    // CNMA; not a big deal.
                    let _ = self
                        .engine
                        .command(CommandRequest::new("AT+CNMA").tolerate_errors())
                        .await;
                    self.enqueue_inline(&header, &payload);
                }
                Notification::MessageStored { storage, index } => {
                    tracing::debug!(%storage, index, "fetching stored message");
                    self.fetch_stored(index).await?;
                }
            }
        }

        if fetch {
            self.fetch_unread().await?;
        }

        Ok(self.incoming.pop())
    }

    /// Delete a stored message by index. Returns `Ok(false)` when the modem
    /// rejects the command.
    pub async fn delete_message(&self, index: u32) -> GsmResult<bool> {
        let response = self
            .engine
            .command(CommandRequest::new(format!("AT+CMGD={index}")).tolerate_errors())
            .await?;
        Ok(response.ok())
    }

    /// Decode an inline (`+CMT`) delivery and queue it.
    fn enqueue_inline(&self, header: &str, payload: &str) {
        match self.message_mode() {
            MessageMode::Pdu => match DeliverPdu::parse(payload) {
                Ok(pdu) => self.enqueue_pdu(pdu),
                Err(e) => tracing::warn!(error = %e, "dropping undecodable inline message"),
            },
            MessageMode::Text => {
                let Some(args) = header.strip_prefix("+CMT:") else {
                    return;
                };
                let fields = split_fields(args);
                let Some(sender) = fields.first().filter(|s| !s.is_empty()) else {
                    tracing::warn!(header, "dropping inline message with unparseable header");
                    return;
                };
                let timestamp = fields.iter().skip(1).find_map(|f| SmsTimestamp::parse_text(f));
                self.enqueue_text(sender.clone(), timestamp, decode_text_payload(payload));
            }
        }
    }

    /// Fetch one stored message by index (`AT+CMGR`) and queue it. An
    /// undecodable message is dropped, not fatal.
    async fn fetch_stored(&self, index: u32) -> GsmResult<()> {
        let response = self
            .engine
            .command(CommandRequest::new(format!("AT+CMGR={index}")).tolerate_errors())
            .await?;
        if !response.ok() {
            tracing::warn!(index, status = %response.status, "stored message fetch failed");
            return Ok(());
        }

        let Some(header) = response.lines.first().filter(|l| l.starts_with("+CMGR:")) else {
            tracing::warn!(index, "unexpected +CMGR response shape");
            return Ok(());
        };

        match self.message_mode() {
            MessageMode::Pdu => match response.lines.get(1).map(|hex| DeliverPdu::parse(hex)) {
                Some(Ok(pdu)) => self.enqueue_pdu(pdu),
                Some(Err(e)) => {
                    tracing::warn!(index, error = %e, "dropping undecodable stored message");
                }
                None => tracing::warn!(index, "+CMGR response missing PDU line"),
            },
            MessageMode::Text => {
                // +CMGR: "REC UNREAD","<sender>",,"<timestamp>"
                let fields = split_fields(header.strip_prefix("+CMGR:").unwrap_or_default());
                let Some(sender) = fields.get(1).filter(|s| !s.is_empty()) else {
                    tracing::warn!(index, "dropping stored message with unparseable header");
                    return Ok(());
                };
                let timestamp = fields.iter().skip(2).find_map(|f| SmsTimestamp::parse_text(f));
                let body: String = response.lines[1..].concat();
                self.enqueue_text(sender.clone(), timestamp, decode_text_payload(body.trim()));
            }
        }
        Ok(())
    }

    /// List unread messages from storage (`AT+CMGL`) and queue every entry.
    /// Listing marks them read on the modem side.
    async fn fetch_unread(&self) -> GsmResult<()> {
        let mode = self.message_mode();
        let cmd = match mode {
            MessageMode::Pdu => format!("AT+CMGL={}", u8::from(MessageStatus::ReceivedUnread)),
            MessageMode::Text => format!(
                "AT+CMGL=\"{}\"",
                MessageStatus::ReceivedUnread.text_mode_label()
            ),
        };

        let response = self
            .engine
            .command(CommandRequest::new(cmd).tolerate_errors())
            .await?;
        if !response.ok() {
            return Ok(());
        }

        match mode {
            MessageMode::Pdu => {
                let mut lines = response.lines.iter();
                while let Some(line) = lines.next() {
                    if !line.starts_with("+CMGL:") {
                        continue;
                    }
                    match lines.next().map(|hex| DeliverPdu::parse(hex)) {
                        Some(Ok(pdu)) => self.enqueue_pdu(pdu),
                        Some(Err(e)) => {
                            tracing::warn!(error = %e, "dropping undecodable listed message");
                        }
                        None => break,
                    }
                }
            }
            MessageMode::Text => {
                // +CMGL: <index>,"REC UNREAD","<sender>",...,"<timestamp>"
                // followed by body lines until the next +CMGL header.
                let mut entry: Option<(String, Option<SmsTimestamp>, String)> = None;
                for line in &response.lines {
                    if let Some(args) = line.strip_prefix("+CMGL:") {
                        if let Some((sender, ts, body)) = entry.take() {
                            self.enqueue_text(sender, ts, decode_text_payload(body.trim()));
                        }
                        let fields = split_fields(args);
                        match fields.get(2).filter(|s| !s.is_empty()) {
                            Some(sender) => {
                                let timestamp = fields
                                    .iter()
                                    .skip(3)
                                    .find_map(|f| SmsTimestamp::parse_text(f));
                                entry = Some((sender.clone(), timestamp, String::new()));
                            }
                            None => tracing::warn!(%line, "dropping unparseable +CMGL header"),
                        }
                    } else if let Some((_, _, body)) = entry.as_mut() {
                        body.push_str(line);
                    }
                }
                if let Some((sender, ts, body)) = entry {
                    self.enqueue_text(sender, ts, decode_text_payload(body.trim()));
                }
            }
        }
        Ok(())
    }

    fn enqueue_pdu(&self, pdu: DeliverPdu) {
        if let Some(msg) = self
            .assembler
            .feed(pdu.sender, pdu.timestamp, pdu.text, pdu.concat)
        {
            tracing::debug!(sender = %msg.sender, "adding incoming message");
            self.incoming.push(msg);
        }
    }

    fn enqueue_text(&self, sender: String, timestamp: Option<SmsTimestamp>, text: String) {
        if let Some(msg) = self.assembler.feed(sender, timestamp, text, None) {
            tracing::debug!(sender = %msg.sender, "adding incoming message");
            self.incoming.push(msg);
        }
    }

    // ------------------------------------------------------------------
    // Raw AT access
    // ------------------------------------------------------------------

    /// Issue a raw AT command through the session's engine. See
    /// [`CommandEngine::command`] for retry and sanitization semantics.
    pub async fn command(&self, request: CommandRequest) -> GsmResult<CommandResponse> {
        self.engine.command(request).await
    }

    /// Single-line query helper; see [`CommandEngine::query`].
    pub async fn query(&self, cmd: &str, prefix: Option<&str>) -> Option<String> {
        self.engine.query(cmd, prefix).await
    }

    /// Multi-line query helper; see [`CommandEngine::query_list`].
    pub async fn query_list(&self, cmd: &str, prefix: Option<&str>) -> Vec<String> {
        self.engine.query_list(cmd, prefix).await
    }
}

/// Extract the message reference from a `+CMGS: <ref>` acknowledgment line.
fn parse_send_reference(response: &CommandResponse) -> Option<u8> {
    response
        .lines
        .iter()
        .find_map(|line| line.strip_prefix("+CMGS:"))
        .and_then(|rest| rest.trim().split(',').next())
        .and_then(|v| v.trim().parse().ok())
}

fn plmn_mode_description(mode: &str) -> Option<&'static str> {
    match mode {
        "0" => Some("(Automatic)"),
        "1" => Some("(Manual)"),
        "2" => Some("(Deregistered)"),
        "3" => Some("(Unreadable)"),
        _ => None,
    }
}
