//! JSON-lines transport: one decoded reading per line.
//!
//! A line holding `null` is delivered as an absent reading. Lines that do
//! not decode are logged and skipped.

use crate::runtime::MonitorEvent;
use crate::telemetry::types::{ConnectionStatus, RawSample};
use crossbeam_channel::Sender;
use std::io::BufRead;
use std::thread::{self, JoinHandle};
use tracing::{debug, warn};

/// Decode one line into a reading. `null` decodes to `None`.
pub fn decode_line(line: &str) -> Result<Option<RawSample>, serde_json::Error> {
    serde_json::from_str::<Option<RawSample>>(line)
}

/// Read lines from `reader` on a background thread and forward them.
///
/// The thread reports `Connected` when it starts and `Disconnected` at end
/// of input or on a read error, then drops its sender.
pub fn spawn_line_reader<R>(reader: R, sender: Sender<MonitorEvent>) -> JoinHandle<()>
where
    R: BufRead + Send + 'static,
{
    thread::spawn(move || {
        let _ = sender.send(MonitorEvent::Connectivity(ConnectionStatus::Connected));

        for (line_no, line) in reader.lines().enumerate() {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    warn!("Transport read failed: {}", e);
                    break;
                }
            };
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            match decode_line(trimmed) {
                Ok(raw) => {
                    if sender.send(MonitorEvent::Sample(raw)).is_err() {
                        debug!("Monitor gone, transport stopping");
                        return;
                    }
                }
                Err(e) => warn!("Undecodable message on line {}: {}", line_no + 1, e),
            }
        }

        let _ = sender.send(MonitorEvent::Connectivity(ConnectionStatus::Disconnected));
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_decode_null_is_absent() {
        assert!(decode_line("null").unwrap().is_none());
        assert!(decode_line("{}").unwrap().is_some());
        assert!(decode_line("{oops").is_err());
    }

    #[test]
    fn test_line_reader_forwards_in_order() {
        let input = concat!(
            r#"{"eyeBlinkRate": 12, "drowsinessLevel": 30, "headMovement": {}}"#,
            "\n\nnot json\nnull\n",
            r#"{"eyeBlinkRate": 14, "drowsinessLevel": 35, "headMovement": {}}"#,
            "\n"
        );
        let (sender, receiver) = crossbeam_channel::unbounded();
        spawn_line_reader(Cursor::new(input), sender).join().unwrap();

        let events: Vec<MonitorEvent> = receiver.try_iter().collect();
        assert_eq!(events.len(), 5);
        assert!(matches!(
            events[0],
            MonitorEvent::Connectivity(ConnectionStatus::Connected)
        ));
        assert!(matches!(&events[1], MonitorEvent::Sample(Some(raw)) if raw.eye_blink_rate == Some(12.0)));
        assert!(matches!(events[2], MonitorEvent::Sample(None)));
        assert!(matches!(&events[3], MonitorEvent::Sample(Some(raw)) if raw.eye_blink_rate == Some(14.0)));
        assert!(matches!(
            events[4],
            MonitorEvent::Connectivity(ConnectionStatus::Disconnected)
        ));
    }
}
