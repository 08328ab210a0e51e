//! Signal sources: the adapter boundary between a host editor and the
//! tracker. The tracker never depends on a concrete host — anything that can
//! push [`ActivitySignal`]s into a channel is a source.

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use pulsetrack_core::ActivitySignal;

/// A running signal source. Dropping or disposing the handle stops it.
pub struct SourceHandle {
    task: JoinHandle<()>,
}

impl SourceHandle {
    pub fn dispose(&self) {
        self.task.abort();
    }
}

impl Drop for SourceHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Anything that can emit activity signals into the tracker channel.
pub trait SignalSource {
    fn spawn(self, tx: mpsc::Sender<ActivitySignal>) -> SourceHandle;
}

/// Parse one NDJSON signal line. Blank lines and malformed JSON are skipped
/// with a warning — a bad line from the host must never stop tracking.
pub(crate) fn parse_signal_line(line: &str) -> Option<ActivitySignal> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    match serde_json::from_str(line) {
        Ok(signal) => Some(signal),
        Err(e) => {
            tracing::warn!("ignoring malformed signal line: {e}");
            None
        }
    }
}

/// Reads newline-delimited JSON [`ActivitySignal`]s from stdin until EOF.
pub struct StdinSource;

impl SignalSource for StdinSource {
    fn spawn(self, tx: mpsc::Sender<ActivitySignal>) -> SourceHandle {
        let task = tokio::spawn(async move {
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        if let Some(signal) = parse_signal_line(&line) {
                            if tx.send(signal).await.is_err() {
                                break; // tracker gone
                            }
                        }
                    }
                    Ok(None) => break, // EOF
                    Err(e) => {
                        tracing::warn!("stdin read error: {e}");
                        break;
                    }
                }
            }
        });
        SourceHandle { task }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_valid_signal_line() {
        let signal = parse_signal_line(r#"{"file":"src/a.rs","language":"rust"}"#)
            .expect("valid line");
        assert_eq!(signal.file.as_deref(), Some("src/a.rs"));
        assert_eq!(signal.language.as_deref(), Some("rust"));
    }

    #[test]
    fn blank_and_malformed_lines_are_skipped() {
        assert!(parse_signal_line("").is_none());
        assert!(parse_signal_line("   ").is_none());
        assert!(parse_signal_line("not json").is_none());
        assert!(parse_signal_line(r#"{"file":3}"#).is_none());
    }

    #[tokio::test]
    async fn dispose_stops_the_source() {
        let (tx, _rx) = mpsc::channel(1);
        let handle = StdinSource.spawn(tx);
        handle.dispose();
        // Abort is asynchronous; the handle just must not hang on drop.
    }
}
