use crate::keyboard::KeyEvent;
use chrono::{DateTime, Local};
use std::fmt;

/// The format of the timestamp at the start of every log line.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// A captured key press, as written to the log files.
///
/// Displays as `[<timestamp>]: <text>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedEvent {
    text: String,
    timestamp: DateTime<Local>,
}

impl CapturedEvent {
    pub fn new(text: impl Into<String>, timestamp: DateTime<Local>) -> Self {
        Self {
            text: text.into(),
            timestamp,
        }
    }

    /// Create an event stamped with the current local time.
    pub fn now(text: impl Into<String>) -> Self {
        Self::new(text, Local::now())
    }

    /// The symbolic name of the key.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn timestamp(&self) -> DateTime<Local> {
        self.timestamp
    }

    /// The log line for this event, without the trailing newline.
    pub fn format_line(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for CapturedEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}]: {}",
            self.timestamp.format(TIMESTAMP_FORMAT),
            self.text
        )
    }
}

impl From<&KeyEvent> for CapturedEvent {
    fn from(ev: &KeyEvent) -> Self {
        Self::new(ev.code.to_string(), ev.ts.with_timezone(&Local))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key_code::KeyCode;
    use crate::keyboard::KeyEventCause;
    use chrono::{TimeZone, Utc};

    #[test]
    fn formats_timestamp_and_text() {
        let ts = Local.with_ymd_and_hms(2024, 3, 9, 17, 4, 5).unwrap();
        let ev = CapturedEvent::new("A", ts);

        assert_eq!(ev.format_line(), "[2024-03-09 17:04:05.000000]: A");
    }

    #[test]
    fn formatting_is_idempotent() {
        let ev = CapturedEvent::now("SPACE");

        assert_eq!(ev.format_line().as_bytes(), ev.format_line().as_bytes());
        assert_eq!(ev.clone().to_string(), ev.to_string());
    }

    #[test]
    fn converts_key_events() {
        let ts = Utc.timestamp_opt(1_700_000_000, 123_456_000).unwrap();
        let key_event = KeyEvent {
            ts,
            cause: KeyEventCause::Press,
            code: KeyCode::LeftShift,
        };

        let ev = CapturedEvent::from(&key_event);

        assert_eq!(ev.text(), "LEFT_SHIFT");
        assert_eq!(ev.timestamp(), ts.with_timezone(&Local));
        assert!(ev.format_line().ends_with(".123456]: LEFT_SHIFT"));
    }
}
