use std::collections::VecDeque;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogLevel {
    Warn,
    Fail,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Warn => "WARN",
            LogLevel::Fail => "FAIL",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub level: LogLevel,
    pub message: String,
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.level.as_str(), self.message)
    }
}

/// Bounded ring of monitor findings, oldest evicted first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvariantLog {
    entries: VecDeque<LogEntry>,
    capacity: usize,
}

impl InvariantLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    /// Appends `entry` unless it repeats the newest entry. Returns whether it was appended.
    pub fn push(&mut self, entry: LogEntry) -> bool {
        if self.entries.back() == Some(&entry) {
            return false;
        }
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
        true
    }

    pub fn last(&self) -> Option<&LogEntry> {
        self.entries.back()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter()
    }

    /// Newest `count` entries, oldest first.
    pub fn tail(&self, count: usize) -> impl Iterator<Item = &LogEntry> {
        self.entries
            .iter()
            .skip(self.entries.len().saturating_sub(count))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn warn(message: &str) -> LogEntry {
        LogEntry {
            level: LogLevel::Warn,
            message: message.to_string(),
        }
    }

    #[test]
    fn ring_never_exceeds_capacity() {
        let mut log = InvariantLog::new(12);
        for idx in 0..20 {
            log.push(warn(&format!("w{idx}")));
            assert!(log.len() <= 12);
        }
        assert_eq!(log.len(), 12);
        assert_eq!(log.iter().next().map(|entry| entry.message.as_str()), Some("w8"));
        assert_eq!(log.last().map(|entry| entry.message.as_str()), Some("w19"));
    }

    #[test]
    fn consecutive_duplicates_collapse() {
        let mut log = InvariantLog::new(12);
        assert!(log.push(warn("same")));
        assert!(!log.push(warn("same")));
        assert_eq!(log.len(), 1);
        assert!(log.push(LogEntry {
            level: LogLevel::Fail,
            message: "same".to_string(),
        }));
        assert!(log.push(warn("same")));
        assert_eq!(log.len(), 3);
    }

    #[test]
    fn entries_render_with_level_prefix() {
        let entry = LogEntry {
            level: LogLevel::Fail,
            message: "Global enemy cap exceeded (13/12)".to_string(),
        };
        assert_eq!(entry.to_string(), "FAIL: Global enemy cap exceeded (13/12)");
        let mut log = InvariantLog::new(4);
        for idx in 0..4 {
            log.push(warn(&idx.to_string()));
        }
        let tail = log.tail(2).map(|entry| entry.message.clone()).collect::<Vec<_>>();
        assert_eq!(tail, vec!["2".to_string(), "3".to_string()]);
    }
}
