// ABOUTME: Classifies every line read during a command as echo, noise, notification, or content
// ABOUTME: Keeps unsolicited modem data out of command responses and routes it to the event queue

/// An unsolicited event captured by the sanitizer while a command was in
/// flight. Queued in arrival order; consumed at most once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// `+CMT:` — a message delivered inline, as a header line followed by a
    /// payload line (text or hex PDU depending on the active message mode).
    MessageReceived { header: String, payload: String },

    /// `+CMTI: "<mem>",<index>` — a message arrived and was written to
    /// storage; it must be fetched by index.
    MessageStored { storage: String, index: u32 },
}

/// Classification of one line read from the modem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineClass {
    /// An echo of the command just written (the modem ignored `ATE0`).
    Echo,
    /// Blank lines and unsolicited status chatter (`+WIND:`, `+CREG:`, ...)
    /// that is dropped outright, along with a `+CMT:` header held back until
    /// its payload line arrives.
    Noise,
    /// An unsolicited event to be queued for the message pipeline.
    Notification(Notification),
    /// A line that belongs to the command response body.
    Content(String),
}

// Status prefixes the modem volunteers regardless of AT+WIND=0. They carry
// no information the session tracks, so they never reach the response body.
const NOISE_PREFIXES: &[&str] = &["+WIND:", "+CREG:", "+CGREG:"];

/// Stateful line classifier for a single command exchange.
///
/// Stateful for two reasons: command echo is only stripped once, and an
/// inline message delivery (`+CMT:`) spans two lines, so the header is held
/// until the payload arrives and the pair is emitted as one notification.
pub struct Sanitizer {
    cmd: String,
    echo_seen: bool,
    held_cmt: Option<String>,
}

impl Sanitizer {
    pub fn new(cmd: &str) -> Self {
        Sanitizer {
            cmd: cmd.to_string(),
            echo_seen: false,
            held_cmt: None,
        }
    }

    /// Classify one stripped line.
    pub fn classify(&mut self, line: &str) -> LineClass {
        // A held +CMT: header pairs with the very next line, whatever it is.
        if let Some(header) = self.held_cmt.take() {
            return LineClass::Notification(Notification::MessageReceived {
                header,
                payload: line.to_string(),
            });
        }

        if line.is_empty() {
            return LineClass::Noise;
        }

        if !self.echo_seen && line == self.cmd {
            self.echo_seen = true;
            return LineClass::Echo;
        }

        if NOISE_PREFIXES.iter().any(|p| line.starts_with(p)) {
            tracing::debug!(line, "dropped unsolicited status line");
            return LineClass::Noise;
        }

        if line.starts_with("+CMT:") {
            self.held_cmt = Some(line.to_string());
            return LineClass::Noise;
        }

        if let Some(rest) = line.strip_prefix("+CMTI:") {
            return match parse_cmti(rest) {
                Some((storage, index)) => {
                    LineClass::Notification(Notification::MessageStored { storage, index })
                }
                None => {
                    tracing::warn!(line, "unparseable +CMTI notification dropped");
                    LineClass::Noise
                }
            };
        }

        LineClass::Content(line.to_string())
    }
}

/// Parse the argument part of `+CMTI: "<mem>",<index>`.
fn parse_cmti(rest: &str) -> Option<(String, u32)> {
    let (storage, index) = rest.trim().split_once(',')?;
    let storage = storage.trim().trim_matches('"').to_string();
    let index = index.trim().parse().ok()?;
    Some((storage, index))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn echo_is_stripped_once() {
        let mut s = Sanitizer::new("AT+CSQ");
        assert_eq!(s.classify("AT+CSQ"), LineClass::Echo);
        // A second identical line is real content, not echo.
        assert_eq!(
            s.classify("AT+CSQ"),
            LineClass::Content("AT+CSQ".to_string())
        );
    }

    #[test]
    fn status_chatter_is_noise() {
        let mut s = Sanitizer::new("AT");
        assert_eq!(s.classify(""), LineClass::Noise);
        assert_eq!(s.classify("+WIND: 4"), LineClass::Noise);
        assert_eq!(s.classify("+CREG: 1"), LineClass::Noise);
        assert_eq!(s.classify("+CGREG: 0,1"), LineClass::Noise);
    }

    #[test]
    fn cmti_yields_stored_notification() {
        let mut s = Sanitizer::new("AT");
        assert_eq!(
            s.classify("+CMTI: \"SM\",4"),
            LineClass::Notification(Notification::MessageStored {
                storage: "SM".to_string(),
                index: 4,
            })
        );
    }

    #[test]
    fn cmt_header_pairs_with_next_line() {
        let mut s = Sanitizer::new("AT");
        let header = "+CMT: \"+250788123456\",,\"10/05/01,09:00:00+00\"";
        assert_eq!(s.classify(header), LineClass::Noise);
        assert_eq!(
            s.classify("hello world"),
            LineClass::Notification(Notification::MessageReceived {
                header: header.to_string(),
                payload: "hello world".to_string(),
            })
        );
    }

    #[test]
    fn plain_lines_are_content() {
        let mut s = Sanitizer::new("AT+CSQ");
        assert_eq!(
            s.classify("+CSQ: 20,99"),
            LineClass::Content("+CSQ: 20,99".to_string())
        );
    }
}
