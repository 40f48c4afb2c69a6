//! Output buffering and cleanup for captured tool output.
//!
//! `LogBuffer` collects the lines of a streamed run and can keep only the tail of a
//! verbose build. `TimelineBuffer` is the application-wide activity log shown in the UI.

use std::collections::VecDeque;

use strip_ansi_escapes::strip;

use crate::panels::PanelKind;

/// Indicates the source stream of a captured line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Stdout,
    Stderr,
}

/// A single captured line.
#[derive(Debug, Clone)]
pub struct LogLine {
    pub text: String,
    pub stream: StreamKind,
}

/// A growable line buffer with an optional cap; when capped, the oldest lines are dropped.
#[derive(Debug, Clone)]
pub struct LogBuffer {
    max_lines: Option<usize>,
    lines: VecDeque<LogLine>,
}

impl LogBuffer {
    /// Creates a buffer that keeps every line.
    pub fn unbounded() -> Self {
        Self {
            max_lines: None,
            lines: VecDeque::new(),
        }
    }

    /// Creates a buffer that keeps only the last `max_lines` lines.
    pub fn new(max_lines: usize) -> Self {
        Self {
            max_lines: Some(max_lines),
            lines: VecDeque::with_capacity(max_lines.min(1024)),
        }
    }

    /// Adds a line to the buffer.
    ///
    /// Returns `true` if an old line was dropped to make room.
    pub fn push(&mut self, line: LogLine) -> bool {
        let mut dropped = false;
        self.lines.push_back(line);
        if let Some(max) = self.max_lines {
            while self.lines.len() > max {
                self.lines.pop_front();
                dropped = true;
            }
        }
        dropped
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Number of buffered lines that came from standard error.
    pub fn stderr_lines(&self) -> usize {
        self.lines
            .iter()
            .filter(|line| line.stream == StreamKind::Stderr)
            .count()
    }

    pub fn into_lines(self) -> Vec<String> {
        self.lines.into_iter().map(|l| l.text).collect()
    }
}

/// Severity of an activity-log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryLevel {
    Info,
    Error,
    Output,
}

/// An entry in the activity log.
#[derive(Debug, Clone)]
pub struct TimelineEntry {
    pub text: String,
    pub panel: Option<PanelKind>,
    pub level: EntryLevel,
}

/// A fixed-capacity ring buffer for storing `TimelineEntry`s.
#[derive(Debug, Clone)]
pub struct TimelineBuffer {
    max_lines: usize,
    entries: VecDeque<TimelineEntry>,
}

impl TimelineBuffer {
    pub fn new(max_lines: usize) -> Self {
        Self {
            max_lines,
            entries: VecDeque::with_capacity(max_lines.min(1024)),
        }
    }

    /// Adds an entry to the buffer.
    ///
    /// Returns `true` if an old entry was dropped to make room.
    pub fn push(&mut self, entry: TimelineEntry) -> bool {
        let mut dropped = false;
        self.entries.push_back(entry);
        while self.entries.len() > self.max_lines {
            self.entries.pop_front();
            dropped = true;
        }
        dropped
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TimelineEntry> {
        self.entries.iter()
    }
}

/// Strips ANSI escape codes. Invalid UTF-8 sequences are replaced.
pub fn sanitize_text(text: &str) -> String {
    let stripped = strip(text.as_bytes());
    String::from_utf8_lossy(&stripped).to_string()
}

/// Decodes a raw output line: lossy UTF-8, ANSI codes removed, surrounding whitespace trimmed.
///
/// Returns `None` for lines that end up blank.
pub fn clean_line(raw: &[u8]) -> Option<String> {
    let decoded = String::from_utf8_lossy(raw);
    // Progress bars redraw with '\r'; only the last frame matters.
    decoded
        .rsplit('\r')
        .map(|part| sanitize_text(part).trim().to_string())
        .find(|part| !part.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(text: &str) -> LogLine {
        LogLine {
            text: text.into(),
            stream: StreamKind::Stdout,
        }
    }

    #[test]
    fn log_buffer_drops_oldest() {
        let mut buffer = LogBuffer::new(2);
        buffer.push(line("a"));
        buffer.push(line("b"));
        let dropped = buffer.push(line("c"));
        assert!(dropped);
        assert_eq!(buffer.into_lines(), vec!["b", "c"]);
    }

    #[test]
    fn unbounded_buffer_keeps_everything() {
        let mut buffer = LogBuffer::unbounded();
        for i in 0..500 {
            assert!(!buffer.push(line(&i.to_string())));
        }
        assert_eq!(buffer.len(), 500);
        assert_eq!(buffer.stderr_lines(), 0);
        let lines = buffer.into_lines();
        assert_eq!(&lines[498..], ["498", "499"]);
    }

    #[test]
    fn clean_line_strips_ansi_and_blank() {
        assert_eq!(clean_line(b"\x1b[32m  ok \x1b[0m\r\n"), Some("ok".to_string()));
        assert_eq!(clean_line(b"   \t"), None);
        assert_eq!(clean_line(b"10%\r50%\r"), Some("50%".to_string()));
    }

    #[test]
    fn timeline_buffer_drops_oldest() {
        let mut buffer = TimelineBuffer::new(1);
        buffer.push(TimelineEntry {
            text: "x".into(),
            panel: None,
            level: EntryLevel::Info,
        });
        let dropped = buffer.push(TimelineEntry {
            text: "y".into(),
            panel: Some(PanelKind::Pack),
            level: EntryLevel::Error,
        });
        assert!(dropped);
        assert_eq!(buffer.len(), 1);
        assert_eq!(buffer.iter().next().unwrap().text, "y");
    }
}
