//! Append-only chat event log with line-oriented persistence.
//!
//! One event per line:
//! - text:  `<sender>: <body>` (body newlines and backslashes escaped)
//! - file:  `#Attached <blob-hex> <sender> <fileName>`
//!
//! The file name comes last so it may contain spaces; the blob id ties
//! the event to the exact bytes that were broadcast.

use std::fmt;
use std::io::ErrorKind;
use std::path::PathBuf;

use parking_lot::Mutex;
use tokio::fs;
use tracing::{debug, info, warn};

use crate::blobs::BlobId;
use crate::error::RelayError;

const FILE_LINE_PREFIX: &str = "#Attached ";

/// A single entry in the relay's broadcast history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryEvent {
    Text {
        sender: String,
        body: String,
    },
    File {
        file_name: String,
        sender: String,
        blob: BlobId,
    },
}

impl HistoryEvent {
    /// Parse one persisted line; `None` for lines that don't match
    /// either form (the caller skips and logs them).
    pub fn parse_line(line: &str) -> Option<Self> {
        if let Some(rest) = line.strip_prefix(FILE_LINE_PREFIX) {
            let mut parts = rest.splitn(3, ' ');
            let blob = BlobId::from_hex(parts.next()?)?;
            let sender = parts.next()?.to_string();
            let file_name = parts.next()?.to_string();
            if sender.is_empty() || file_name.is_empty() {
                return None;
            }
            Some(Self::File {
                file_name,
                sender,
                blob,
            })
        } else {
            let (sender, body) = line.split_once(": ")?;
            if sender.is_empty() {
                return None;
            }
            Some(Self::Text {
                sender: sender.to_string(),
                body: unescape_body(body),
            })
        }
    }
}

impl fmt::Display for HistoryEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text { sender, body } => write!(f, "{sender}: {}", escape_body(body)),
            Self::File {
                file_name,
                sender,
                blob,
            } => write!(f, "{FILE_LINE_PREFIX}{blob} {sender} {file_name}"),
        }
    }
}

fn escape_body(body: &str) -> String {
    let mut out = String::with_capacity(body.len());
    for c in body.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
    out
}

fn unescape_body(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

/// In-memory ordered event log, loaded at startup and flushed once at
/// shutdown. The lock guards only the vector, never any I/O.
pub struct HistoryStore {
    path: PathBuf,
    events: Mutex<Vec<HistoryEvent>>,
}

impl HistoryStore {
    /// Load the log from disk, best-effort: a missing file is an empty
    /// history, an unreadable one is logged and treated as empty.
    pub async fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let events = match fs::read_to_string(&path).await {
            Ok(contents) => {
                let events: Vec<HistoryEvent> = contents
                    .lines()
                    .filter(|line| !line.is_empty())
                    .filter_map(|line| {
                        let parsed = HistoryEvent::parse_line(line);
                        if parsed.is_none() {
                            warn!(line, "skipping unparseable history line");
                        }
                        parsed
                    })
                    .collect();
                info!(path = %path.display(), events = events.len(), "history loaded");
                events
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!(path = %path.display(), "no existing history");
                Vec::new()
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to read history, starting empty");
                Vec::new()
            }
        };

        Self {
            path,
            events: Mutex::new(events),
        }
    }

    /// Append an event; does not persist synchronously.
    pub fn append(&self, event: HistoryEvent) {
        self.events.lock().push(event);
    }

    /// Ordered snapshot of the full log, for replay.
    pub fn events(&self) -> Vec<HistoryEvent> {
        self.events.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    /// Serialize the full sequence to disk, atomically replacing the
    /// previous contents. Called once at shutdown.
    pub async fn persist(&self) -> Result<(), RelayError> {
        let events = self.events();
        let mut out = String::new();
        for event in &events {
            out.push_str(&event.to_string());
            out.push('\n');
        }

        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, out).await?;
        fs::rename(&tmp, &self.path).await?;

        debug!(path = %self.path.display(), events = events.len(), "history persisted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn text(sender: &str, body: &str) -> HistoryEvent {
        HistoryEvent::Text {
            sender: sender.to_string(),
            body: body.to_string(),
        }
    }

    #[test]
    fn text_line_round_trip() {
        let event = text("Alice", "hi there");
        assert_eq!(event.to_string(), "Alice: hi there");
        assert_eq!(HistoryEvent::parse_line("Alice: hi there"), Some(event));
    }

    #[test]
    fn body_may_contain_separator_and_newlines() {
        let event = text("Alice", "note: line one\nline two");
        let line = event.to_string();
        assert!(!line.contains('\n'));
        assert_eq!(HistoryEvent::parse_line(&line), Some(event));
    }

    #[test]
    fn sender_with_colon_round_trips() {
        // registration rejects whitespace in identities, but ':' is
        // allowed and must not confuse the separator
        let event = text("a:b", "hi");
        assert_eq!(event.to_string(), "a:b: hi");
        assert_eq!(HistoryEvent::parse_line("a:b: hi"), Some(event));
    }

    #[test]
    fn file_line_round_trip_with_spaces_in_name() {
        let event = HistoryEvent::File {
            file_name: "holiday photos.zip".to_string(),
            sender: "Bob".to_string(),
            blob: BlobId::digest(b"zip bytes"),
        };
        let line = event.to_string();
        assert!(line.starts_with("#Attached "));
        assert_eq!(HistoryEvent::parse_line(&line), Some(event));
    }

    #[test]
    fn malformed_lines_are_rejected() {
        assert_eq!(HistoryEvent::parse_line("no separator here"), None);
        assert_eq!(HistoryEvent::parse_line(": empty sender"), None);
        assert_eq!(HistoryEvent::parse_line("#Attached nothex Bob f.txt"), None);
        assert_eq!(HistoryEvent::parse_line("#Attached"), None);
    }

    #[tokio::test]
    async fn missing_file_loads_empty() {
        let dir = tempdir().unwrap();
        let store = HistoryStore::load(dir.path().join("chat_history.txt")).await;
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn unreadable_lines_are_skipped_on_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("chat_history.txt");
        std::fs::write(&path, "Alice: hi\ngarbage line\nBob: hello\n").unwrap();

        let store = HistoryStore::load(&path).await;
        assert_eq!(store.events(), vec![text("Alice", "hi"), text("Bob", "hello")]);
    }

    #[tokio::test]
    async fn persist_then_reload_preserves_order() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("chat_history.txt");

        let store = HistoryStore::load(&path).await;
        store.append(text("Alice", "first"));
        store.append(HistoryEvent::File {
            file_name: "a.txt".to_string(),
            sender: "Bob".to_string(),
            blob: BlobId::digest(b"contents"),
        });
        store.append(text("Alice", "third"));
        store.persist().await.unwrap();

        let reloaded = HistoryStore::load(&path).await;
        assert_eq!(reloaded.events(), store.events());
    }

    #[tokio::test]
    async fn persist_overwrites_previous_contents() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("chat_history.txt");
        std::fs::write(&path, "Old: stale entry\n").unwrap();

        let store = HistoryStore::load(&path).await;
        assert_eq!(store.len(), 1);

        let fresh = HistoryStore {
            path: path.clone(),
            events: Mutex::new(vec![text("Alice", "only entry")]),
        };
        fresh.persist().await.unwrap();

        let reloaded = HistoryStore::load(&path).await;
        assert_eq!(reloaded.events(), vec![text("Alice", "only entry")]);
    }
}
