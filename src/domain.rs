use std::fmt;

use camino::Utf8PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutcomeCategory {
    Success,
    Exists,
    Failure,
}

impl fmt::Display for OutcomeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutcomeCategory::Success => write!(f, "success"),
            OutcomeCategory::Exists => write!(f, "exists"),
            OutcomeCategory::Failure => write!(f, "failure"),
        }
    }
}

/// Result of one download attempt. Built once by the task that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutcomeRecord {
    pub url: String,
    pub destination: Option<Utf8PathBuf>,
    pub category: OutcomeCategory,
    pub error: Option<String>,
}

impl OutcomeRecord {
    pub fn success(url: &str, destination: Utf8PathBuf) -> Self {
        Self {
            url: url.to_string(),
            destination: Some(destination),
            category: OutcomeCategory::Success,
            error: None,
        }
    }

    pub fn exists(url: &str, destination: Utf8PathBuf) -> Self {
        Self {
            url: url.to_string(),
            destination: Some(destination),
            category: OutcomeCategory::Exists,
            error: None,
        }
    }

    pub fn failure(url: &str, destination: Option<Utf8PathBuf>, error: impl fmt::Display) -> Self {
        Self {
            url: url.to_string(),
            destination,
            category: OutcomeCategory::Failure,
            error: Some(error.to_string()),
        }
    }
}

/// Settled outcomes of one batch, partitioned in settle order.
#[derive(Debug, Clone, Default)]
pub struct BatchOutcome {
    pub total: usize,
    pub failed: Vec<OutcomeRecord>,
    pub existing: Vec<OutcomeRecord>,
    pub succeeded: Vec<OutcomeRecord>,
}

impl BatchOutcome {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            ..Self::default()
        }
    }

    pub fn push(&mut self, record: OutcomeRecord) {
        match record.category {
            OutcomeCategory::Success => self.succeeded.push(record),
            OutcomeCategory::Exists => self.existing.push(record),
            OutcomeCategory::Failure => self.failed.push(record),
        }
    }

    pub fn settled(&self) -> usize {
        self.failed.len() + self.existing.len() + self.succeeded.len()
    }

    /// True when every input URL resolved to success or exists.
    pub fn is_complete(&self) -> bool {
        self.existing.len() + self.succeeded.len() == self.total
    }

    pub fn failed_urls(&self) -> Vec<&str> {
        urls(&self.failed)
    }

    pub fn existing_urls(&self) -> Vec<&str> {
        urls(&self.existing)
    }

    pub fn succeeded_urls(&self) -> Vec<&str> {
        urls(&self.succeeded)
    }
}

fn urls(records: &[OutcomeRecord]) -> Vec<&str> {
    records.iter().map(|record| record.url.as_str()).collect()
}

/// Splits an input file into URLs: one per line, blank lines ignored.
pub fn parse_url_list(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}
