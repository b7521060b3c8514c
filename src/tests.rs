//! Integration tests for the modem session over a scripted transport

use crate::modem::{
    GsmError, GsmModem, MessageMode, ModemConfig, QuirkConfig, SignalStrength,
};
use crate::pdu::SubmitPdu;
use crate::transport::{Transport, TransportError};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Reference SMS-DELIVER PDU: from 27838890001, text "hellohello".
const DELIVER_HEX: &str =
    "07917283010010F5040BC87238880900F10000993092516195800AE8329BFD4697D9EC37";

#[derive(Debug)]
enum Reply {
    /// Lines the modem answers with, in order.
    Lines(Vec<String>),
    /// No line: the next read times out with this data pending
    /// (how the `> ` prompt surfaces, since it has no terminator).
    Timeout(String),
}

#[derive(Debug)]
struct Step {
    expect: String,
    reply: Reply,
}

type Script = Arc<Mutex<VecDeque<Step>>>;

/// A scripted stand-in for the serial port: each expected command is paired
/// with the reply the fake modem gives. Writing anything off-script fails
/// the test immediately.
struct MockTransport {
    script: Script,
    reads: VecDeque<String>,
    timeout_pending: Option<String>,
    echo: bool,
}

impl MockTransport {
    fn new() -> Self {
        MockTransport {
            script: Arc::new(Mutex::new(VecDeque::new())),
            reads: VecDeque::new(),
            timeout_pending: None,
            echo: false,
        }
    }

    /// Echo every command back before the reply, like a modem that ignored
    /// `ATE0`.
    fn with_echo(mut self) -> Self {
        self.echo = true;
        self
    }

    fn expect(self, cmd: &str, reply: &[&str]) -> Self {
        self.script.lock().unwrap().push_back(Step {
            expect: cmd.to_string(),
            reply: Reply::Lines(reply.iter().map(|s| s.to_string()).collect()),
        });
        self
    }

    fn expect_prompt(self, cmd: &str, pending: &str) -> Self {
        self.script.lock().unwrap().push_back(Step {
            expect: cmd.to_string(),
            reply: Reply::Timeout(pending.to_string()),
        });
        self
    }

    fn handle(&self) -> Script {
        Arc::clone(&self.script)
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        let written = String::from_utf8_lossy(bytes).into_owned();
        let cmd = written.trim_end_matches(['\r', '\u{1a}']);

        let step = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| panic!("unscripted write: {cmd:?}"));
        assert_eq!(cmd, step.expect, "modem got the wrong command");

        if self.echo {
            self.reads.push_back(cmd.to_string());
        }
        match step.reply {
            Reply::Lines(lines) => self.reads.extend(lines),
            Reply::Timeout(pending) => self.timeout_pending = Some(pending),
        }
        Ok(())
    }

    async fn read_line(
        &mut self,
        _read_term: &str,
        _timeout: Duration,
    ) -> Result<String, TransportError> {
        if let Some(pending) = self.timeout_pending.take() {
            return Err(TransportError::Timeout { pending });
        }
        match self.reads.pop_front() {
            Some(line) => Ok(line),
            // Reading past the script means the session expected more than
            // the fake modem was told to say.
            None => Err(TransportError::Timeout {
                pending: String::new(),
            }),
        }
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        Ok(())
    }
}

async fn mock_modem(transport: MockTransport) -> (GsmModem, Script) {
    mock_modem_with(transport, ModemConfig::new("/dev/mock")).await
}

async fn mock_modem_with(transport: MockTransport, config: ModemConfig) -> (GsmModem, Script) {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let script = transport.handle();
    let config = config
        .cmd_delay(Duration::ZERO)
        .retry_delay(Duration::from_millis(1));
    let modem = GsmModem::with_transport(config, Box::new(transport)).await;
    (modem, script)
}

fn assert_script_drained(script: &Script) {
    let remaining = script.lock().unwrap();
    assert!(remaining.is_empty(), "unconsumed script steps: {remaining:?}");
}

#[cfg(test)]
mod session_tests {
    use super::*;

    #[tokio::test]
    async fn test_boot_runs_configuration_sequence() {
        let transport = MockTransport::new()
            .expect("ATE0", &["OK"])
            .expect("AT+CMEE=1", &["OK"])
            // A rejected step must not abort the boot.
            .expect("AT+WIND=0", &["ERROR"])
            .expect("AT+CMGF=0", &["OK"])
            .expect("AT+CPMS=\"SM\",\"SM\",\"SM\"", &["+CPMS: 1,15,1,15,1,15", "OK"]);
        let (modem, script) = mock_modem(transport).await;

        modem.boot(false).await.unwrap();
        assert_eq!(modem.message_mode(), MessageMode::Pdu);
        assert_script_drained(&script);
    }

    #[tokio::test]
    async fn test_boot_falls_back_to_text_mode() {
        let transport = MockTransport::new()
            .expect("ATE0", &["OK"])
            .expect("AT+CMEE=1", &["OK"])
            .expect("AT+WIND=0", &["OK"])
            .expect("AT+CMGF=0", &["ERROR"])
            .expect("AT+CMGF=1", &["OK"])
            .expect("AT+CSCS=\"GSM\"", &["OK"])
            .expect("AT+CPMS=\"SM\",\"SM\",\"SM\"", &["OK"]);
        let (modem, script) = mock_modem(transport).await;

        modem.boot(false).await.unwrap();
        assert_eq!(modem.message_mode(), MessageMode::Text);
        assert_script_drained(&script);
    }

    #[tokio::test]
    async fn test_command_echo_is_stripped() {
        let transport = MockTransport::new()
            .with_echo()
            .expect("AT+CSQ", &["+CSQ: 20,99", "OK"]);
        let (modem, script) = mock_modem(transport).await;

        assert_eq!(
            modem.query("AT+CSQ", Some("+CSQ:")).await,
            Some("20,99".to_string())
        );
        assert_script_drained(&script);
    }

    #[tokio::test]
    async fn test_busy_modem_is_retried() {
        let transport = MockTransport::new()
            .expect("AT+CSQ", &["+CMS ERROR: 515"])
            .expect("AT+CSQ", &["+CMS ERROR: 515"])
            .expect("AT+CSQ", &["+CSQ: 17,99", "OK"]);
        let (modem, script) = mock_modem(transport).await;

        // 17 of 31 ~ 54 percent
        assert_eq!(modem.signal_strength().await, SignalStrength::Percent(54));
        assert_script_drained(&script);
    }

    #[tokio::test]
    async fn test_busy_retries_exhausted() {
        let transport = MockTransport::new()
            .expect("AT", &["+CME ERROR: 515"])
            .expect("AT", &["+CME ERROR: 515"]);
        let config = ModemConfig::new("/dev/mock").max_retries(2);
        let (modem, script) = mock_modem_with(transport, config).await;

        let result = modem.command(crate::CommandRequest::new("AT")).await;
        assert!(matches!(result, Err(GsmError::Busy { retries: 2 })));
        assert_script_drained(&script);
    }

    #[tokio::test]
    async fn test_query_swallows_errors() {
        let transport = MockTransport::new().expect("AT+CXXCID", &["ERROR"]);
        let (modem, script) = mock_modem(transport).await;

        assert_eq!(modem.query("AT+CXXCID", Some("+CXXCID:")).await, None);
        assert_script_drained(&script);
    }

    #[tokio::test]
    async fn test_query_list_strips_prefix() {
        let transport = MockTransport::new().expect(
            "AT+COPN",
            &[
                "+COPN: \"64001\",\"MTN Rwanda\"",
                "+COPN: \"64002\",\"Tigo\"",
                "OK",
            ],
        );
        let (modem, script) = mock_modem(transport).await;

        assert_eq!(
            modem.query_list("AT+COPN", Some("+COPN:")).await,
            vec!["\"64001\",\"MTN Rwanda\"", "\"64002\",\"Tigo\""]
        );
        assert_script_drained(&script);
    }

    #[tokio::test]
    async fn test_query_list_failure_is_empty() {
        let transport = MockTransport::new().expect("AT+COPN", &["ERROR"]);
        let (modem, script) = mock_modem(transport).await;

        assert!(modem.query_list("AT+COPN", Some("+COPN:")).await.is_empty());
        assert_script_drained(&script);
    }

    #[tokio::test]
    async fn test_signal_strength_unknown() {
        let transport = MockTransport::new().expect("AT+CSQ", &["+CSQ: 99,99", "OK"]);
        let (modem, _) = mock_modem(transport).await;

        assert_eq!(modem.signal_strength().await, SignalStrength::Unknown);
    }

    #[tokio::test]
    async fn test_network_resolves_numeric_operator() {
        let transport = MockTransport::new()
            .expect("AT+COPS?", &["+COPS: 0,2,\"64002\"", "OK"])
            .expect(
                "AT+COPN",
                &[
                    "+COPN: \"64001\",\"MTN Rwanda\"",
                    "+COPN: \"64002\",\"Tigo\"",
                    "OK",
                ],
            );
        let (modem, script) = mock_modem(transport).await;

        assert_eq!(modem.network().await, Some("Tigo".to_string()));
        assert_script_drained(&script);

        // The operator table is cached: a second lookup issues only +COPS?.
        script.lock().unwrap().push_back(Step {
            expect: "AT+COPS?".to_string(),
            reply: Reply::Lines(vec!["+COPS: 0,2,\"64001\"".to_string(), "OK".to_string()]),
        });
        assert_eq!(modem.network().await, Some("MTN Rwanda".to_string()));
        assert_script_drained(&script);
    }

    #[tokio::test]
    async fn test_service_center() {
        let transport = MockTransport::new()
            .expect("AT+CSCA?", &["+CSCA: \"+250788110333\",145", "OK"])
            .expect("AT+CSCA=\"+250788110333\"", &["OK"]);
        let (modem, script) = mock_modem(transport).await;

        assert_eq!(
            modem.service_center().await,
            Some("+250788110333".to_string())
        );
        assert!(modem.set_service_center("+250788110333").await.unwrap());
        assert_script_drained(&script);
    }

    #[tokio::test]
    async fn test_send_sms_pdu_mode() {
        let pdu = SubmitPdu::new("+250788123456", "hello").unwrap();
        let transport = MockTransport::new()
            .expect_prompt(&format!("AT+CMGS={}", pdu.tpdu_len()), "\r\n> ")
            .expect(&pdu.to_hex(), &["+CMGS: 42", "OK"]);
        let (modem, script) = mock_modem(transport).await;

        assert_eq!(modem.send_sms("+250788123456", "hello").await.unwrap(), 42);
        assert_script_drained(&script);
    }

    #[tokio::test]
    async fn test_send_sms_error_cancels_prompt() {
        let pdu = SubmitPdu::new("+250788123456", "hello").unwrap();
        let transport = MockTransport::new()
            .expect(&format!("AT+CMGS={}", pdu.tpdu_len()), &["+CMS ERROR: 304"])
            // The session must write ESC so later commands do not end up
            // inside an abandoned message body.
            .expect("\u{1b}", &[]);
        let (modem, script) = mock_modem(transport).await;

        let result = modem.send_sms("+250788123456", "hello").await;
        assert!(matches!(result, Err(GsmError::Command { .. })));
        assert_script_drained(&script);
    }

    #[tokio::test]
    async fn test_inline_delivery_is_captured_mid_command() {
        // The +CMT pair arrives while an unrelated command is in flight.
        let transport = MockTransport::new()
            .expect(
                "AT",
                &[
                    "+CMT: \"27838890001\",,\"99/03/29,15:16:59+00\"",
                    DELIVER_HEX,
                    "OK",
                ],
            )
            .expect("AT+CNMA", &["OK"]);
        let (modem, script) = mock_modem(transport).await;

        assert!(modem.ping().await);

        // No ping, no fetch: the captured notification alone must surface it.
        let msg = modem.next_message(false, false).await.unwrap().unwrap();
        assert_eq!(msg.sender, "27838890001");
        assert_eq!(msg.text, "hellohello");
        assert_script_drained(&script);

        assert!(modem.next_message(false, false).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_rejected_acknowledgment_is_tolerated() {
        let transport = MockTransport::new()
            .expect(
                "AT",
                &["+CMT: \"27838890001\",,\"99/03/29,15:16:59+00\"", DELIVER_HEX, "OK"],
            )
            .expect("AT+CNMA", &["+CMS ERROR: 340"]);
        let (modem, _) = mock_modem(transport).await;

        modem.ping().await;
        let msg = modem.next_message(false, false).await.unwrap().unwrap();
        assert_eq!(msg.text, "hellohello");
    }

    #[tokio::test]
    async fn test_stored_notification_triggers_fetch() {
        let transport = MockTransport::new()
            .expect("AT", &["+CMTI: \"SM\",4", "OK"])
            .expect("AT+CMGR=4", &["+CMGR: 0,,25", DELIVER_HEX, "OK"]);
        let (modem, script) = mock_modem(transport).await;

        modem.ping().await;
        let msg = modem.next_message(false, false).await.unwrap().unwrap();
        assert_eq!(msg.sender, "27838890001");
        assert_eq!(msg.text, "hellohello");
        let ts = msg.timestamp.unwrap();
        assert_eq!((ts.year, ts.month, ts.day), (99, 3, 29));
        assert_script_drained(&script);
    }

    #[tokio::test]
    async fn test_fetch_lists_unread_messages() {
        let transport = MockTransport::new().expect(
            "AT+CMGL=0",
            &["+CMGL: 1,0,,25", DELIVER_HEX, "OK"],
        );
        let (modem, script) = mock_modem(transport).await;

        let msg = modem.next_message(false, true).await.unwrap().unwrap();
        assert_eq!(msg.text, "hellohello");
        assert_script_drained(&script);
    }

    #[tokio::test]
    async fn test_fetch_unread_text_mode() {
        let transport = MockTransport::new()
            .expect("ATE0", &["OK"])
            .expect("AT+CMEE=1", &["OK"])
            .expect("AT+WIND=0", &["OK"])
            .expect("AT+CMGF=1", &["OK"])
            .expect("AT+CSCS=\"GSM\"", &["OK"])
            .expect("AT+CPMS=\"SM\",\"SM\",\"SM\"", &["OK"])
            .expect(
                "AT+CMGL=\"REC UNREAD\"",
                &[
                    "+CMGL: 1,\"REC UNREAD\",\"+250788123456\",,\"10/05/01,09:00:00+08\"",
                    "hello world",
                    "OK",
                ],
            );
        let quirks = QuirkConfig {
            preferred_mode: MessageMode::Text,
            ..Default::default()
        };
        let config = ModemConfig::new("/dev/mock").quirks(quirks);
        let (modem, script) = mock_modem_with(transport, config).await;

        modem.boot(false).await.unwrap();
        let msg = modem.next_message(false, true).await.unwrap().unwrap();
        assert_eq!(msg.sender, "+250788123456");
        assert_eq!(msg.text, "hello world");
        assert_eq!(msg.timestamp.unwrap().tz_quarter_hours, 8);
        assert_script_drained(&script);
    }

    #[tokio::test]
    async fn test_delete_message() {
        let transport = MockTransport::new().expect("AT+CMGD=4", &["OK"]);
        let (modem, script) = mock_modem(transport).await;

        assert!(modem.delete_message(4).await.unwrap());
        assert_script_drained(&script);
    }

    #[tokio::test]
    async fn test_disconnected_session_refuses_commands() {
        let (modem, _) = mock_modem(MockTransport::new()).await;
        modem.disconnect().await.unwrap();

        let result = modem.send_sms("+250788123456", "hi").await;
        assert!(matches!(result, Err(GsmError::NotConnected)));
    }
}
