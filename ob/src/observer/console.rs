//! Sample observer that prints notifications

use std::io::{self, IsTerminal, Write};

use chrono::DateTime;
use colored::*;
use parking_lot::Mutex;

use crate::cli::OutputFormat;
use crate::domain::{FinishedNotification, Notification, ProgressNotification, StartedNotification};
use crate::error::ObserverError;

use super::Observer;

/// Prints one line per notification, as text or JSON
///
/// Progress is noisy, so it is only printed when enabled.
pub struct ConsoleObserver {
    out: Mutex<Box<dyn Write + Send>>,
    format: OutputFormat,
    show_progress: bool,
    color: bool,
}

impl ConsoleObserver {
    /// Print to standard output, colored when attached to a terminal
    pub fn stdout(format: OutputFormat, show_progress: bool) -> Self {
        let color = io::stdout().is_terminal();
        Self {
            out: Mutex::new(Box::new(io::stdout())),
            format,
            show_progress,
            color,
        }
    }

    /// Print to an arbitrary writer, without color
    pub fn with_writer(writer: impl Write + Send + 'static, format: OutputFormat, show_progress: bool) -> Self {
        Self {
            out: Mutex::new(Box::new(writer)),
            format,
            show_progress,
            color: false,
        }
    }

    fn render(&self, notification: &Notification) -> Result<String, ObserverError> {
        match self.format {
            OutputFormat::Json => serde_json::to_string(notification).map_err(|e| ObserverError::failed(self.name(), e.to_string())),
            OutputFormat::Text => {
                let (label, timestamp) = match notification {
                    Notification::Started(n) => ("Started:", n.timestamp),
                    Notification::Progress(n) => ("Progress:", n.timestamp),
                    Notification::Finished(n) => ("Finished:", n.timestamp),
                };
                let label = if !self.color {
                    label.normal()
                } else {
                    match notification {
                        Notification::Started(_) => label.green(),
                        Notification::Progress(_) => label.dimmed(),
                        Notification::Finished(n) if n.failure.is_some() => label.red(),
                        Notification::Finished(_) => label.cyan(),
                    }
                };
                Ok(format!("[{}] {} {}", clock(timestamp), label, notification))
            }
        }
    }

    fn print(&self, notification: &Notification) -> Result<(), ObserverError> {
        let line = self.render(notification)?;
        let mut out = self.out.lock();
        writeln!(out, "{}", line)
            .and_then(|_| out.flush())
            .map_err(|e| ObserverError::failed(self.name(), e.to_string()))
    }
}

/// Wall-clock rendering of an epoch-millis timestamp
fn clock(millis: u64) -> String {
    i64::try_from(millis)
        .ok()
        .and_then(DateTime::from_timestamp_millis)
        .map(|t| t.format("%H:%M:%S%.3f").to_string())
        .unwrap_or_else(|| millis.to_string())
}

impl Observer for ConsoleObserver {
    fn name(&self) -> &str {
        "console"
    }

    fn started(&self, notification: &StartedNotification) -> Result<(), ObserverError> {
        self.print(&Notification::Started(notification.clone()))
    }

    fn progress(&self, notification: &ProgressNotification) -> Result<(), ObserverError> {
        if !self.show_progress {
            return Ok(());
        }
        self.print(&Notification::Progress(notification.clone()))
    }

    fn finished(&self, notification: &FinishedNotification) -> Result<(), ObserverError> {
        self.print(&Notification::Finished(notification.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::OperationId;
    use serde_json::json;
    use std::sync::Arc;

    /// Writer that shares its buffer with the test
    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl SharedBuf {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().clone()).unwrap()
        }
    }

    fn progress() -> ProgressNotification {
        ProgressNotification {
            id: OperationId::new(3),
            timestamp: 0,
            details: json!("50%"),
        }
    }

    #[test]
    fn test_text_output() {
        let buf = SharedBuf::default();
        let console = ConsoleObserver::with_writer(buf.clone(), OutputFormat::Text, false);

        console
            .started(&StartedNotification {
                timestamp: 0,
                id: OperationId::new(1),
                parent_id: None,
                details: json!("root"),
            })
            .unwrap();

        let out = buf.contents();
        assert!(out.starts_with("[00:00:00.000] Started: StartedNotification{id=1"));
        assert!(out.ends_with('\n'));
    }

    #[test]
    fn test_progress_hidden_by_default() {
        let buf = SharedBuf::default();
        let console = ConsoleObserver::with_writer(buf.clone(), OutputFormat::Text, false);
        console.progress(&progress()).unwrap();
        assert!(buf.contents().is_empty());

        let console = ConsoleObserver::with_writer(buf.clone(), OutputFormat::Text, true);
        console.progress(&progress()).unwrap();
        assert!(buf.contents().contains("Progress:"));
    }

    #[test]
    fn test_json_output() {
        let buf = SharedBuf::default();
        let console = ConsoleObserver::with_writer(buf.clone(), OutputFormat::Json, true);
        console.progress(&progress()).unwrap();

        let value: serde_json::Value = serde_json::from_str(buf.contents().trim()).unwrap();
        assert_eq!(value["type"], "progress");
        assert_eq!(value["details"], "50%");
    }
}
