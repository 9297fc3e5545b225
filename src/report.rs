// Report lines: short event descriptions for the panel's scrolling report view

use std::collections::VecDeque;

use crate::config::REPORT_LINE_CHARS;

/// Receives report lines; must not block the control cycle
pub trait ReportSink {
    fn emit(&mut self, text: &str);
}

/// Bounded ring of report lines, dropping the oldest line on overflow
///
/// Lines are cut at an embedded NUL or after [`REPORT_LINE_CHARS`] characters.
#[derive(Debug, Clone)]
pub struct ReportBuffer {
    lines: VecDeque<String>,
    capacity: usize,
    dropped: u64,
}

impl ReportBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            lines: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
            dropped: 0,
        }
    }

    /// Take all buffered lines, oldest first
    pub fn drain(&mut self) -> impl Iterator<Item = String> + '_ {
        self.lines.drain(..)
    }

    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Lines lost to overflow since creation
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Retained lines joined by newlines, oldest first
    pub fn render(&self) -> String {
        self.lines().collect::<Vec<_>>().join("\n")
    }
}

impl ReportSink for ReportBuffer {
    fn emit(&mut self, text: &str) {
        if self.lines.len() >= self.capacity {
            self.lines.pop_front();
            self.dropped += 1;
        }
        self.lines.push_back(truncate_line(text));
    }
}

fn truncate_line(text: &str) -> String {
    text.split('\0')
        .next()
        .unwrap_or_default()
        .chars()
        .take(REPORT_LINE_CHARS)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drops_oldest_on_overflow() {
        let mut buffer = ReportBuffer::new(3);
        for i in 0..5 {
            buffer.emit(&format!("line {}", i));
        }
        assert_eq!(buffer.lines().collect::<Vec<_>>(), vec!["line 2", "line 3", "line 4"]);
        assert_eq!(buffer.dropped(), 2);
        assert_eq!(buffer.render(), "line 2\nline 3\nline 4");
    }

    #[test]
    fn test_truncates_lines() {
        let mut buffer = ReportBuffer::new(4);
        buffer.emit(&"x".repeat(60));
        buffer.emit("before\0after");
        let lines: Vec<_> = buffer.lines().collect();
        assert_eq!(lines[0].len(), REPORT_LINE_CHARS);
        assert_eq!(lines[1], "before");
    }

    #[test]
    fn test_drain_empties_buffer() {
        let mut buffer = ReportBuffer::new(4);
        buffer.emit("a");
        buffer.emit("b");
        assert_eq!(buffer.drain().collect::<Vec<_>>(), vec!["a", "b"]);
        assert!(buffer.is_empty());
        assert_eq!(buffer.render(), "");
    }
}
