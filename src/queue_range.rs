use std::{fmt, ops::Range, str::FromStr};

use crate::error::ConfigError;

// ==========================================
// "start:end" → [start, end) 队列号区间
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueRange {
    start: u16,
    end: u16,
}

impl QueueRange {
    pub fn new(start: u16, end: u16) -> Option<Self> {
        (start < end).then_some(Self { start, end })
    }

    pub fn parse(spec: &str) -> Result<Self, ConfigError> {
        let err = |reason: &'static str| ConfigError::QueueRange {
            spec: spec.to_string(),
            reason,
        };

        let (start, end) = spec.trim().split_once(':').ok_or_else(|| err("expected start:end"))?;
        let start: u16 = start.trim().parse().map_err(|_| err("start is not a queue number"))?;
        let end: u16 = end.trim().parse().map_err(|_| err("end is not a queue number"))?;

        Self::new(start, end).ok_or_else(|| err("start must be below end"))
    }

    pub fn start(&self) -> u16 {
        self.start
    }

    pub fn end(&self) -> u16 {
        self.end
    }

    /// Number of workers: one per queue id.
    pub fn count(&self) -> usize {
        usize::from(self.end - self.start)
    }

    pub fn ids(&self) -> Range<u16> {
        self.start..self.end
    }

    pub fn overlaps(&self, other: &QueueRange) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Last queue id actually served (inclusive), as iptables expects it.
    pub fn last(&self) -> u16 {
        self.end - 1
    }
}

impl FromStr for QueueRange {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for QueueRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.start, self.end)
    }
}
