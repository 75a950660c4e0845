use bytesize::ByteSize;
use chrono::{DateTime, Local};
use console::{Term, style};
use log::{error, info};
use std::io;

/// Per-index counters for a successful load
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnitStats {
    pub documents: usize,
    pub rows_written: u64,
    pub rows_skipped: u64,
    pub artifact_bytes: u64,
}

/// How an index that did not fail ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitOutcome {
    Loaded(UnitStats),
    /// No documents, nothing written
    Empty,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitFailure {
    pub index: String,
    pub reason: String,
}

/// Outcome of every index in a run
#[derive(Debug, Clone)]
pub struct RunReport {
    started_at: DateTime<Local>,
    finished_at: Option<DateTime<Local>>,
    succeeded: Vec<(String, UnitStats)>,
    empty: Vec<String>,
    failures: Vec<UnitFailure>,
    not_found: Vec<String>,
}

impl Default for RunReport {
    fn default() -> Self {
        Self::new()
    }
}

impl RunReport {
    pub fn new() -> Self {
        Self {
            started_at: Local::now(),
            finished_at: None,
            succeeded: Vec::new(),
            empty: Vec::new(),
            failures: Vec::new(),
            not_found: Vec::new(),
        }
    }

    pub fn record(&mut self, index: &str, result: Result<UnitOutcome, String>) {
        match result {
            Ok(UnitOutcome::Loaded(stats)) => self.succeeded.push((index.to_string(), stats)),
            Ok(UnitOutcome::Empty) => self.empty.push(index.to_string()),
            Err(reason) => self.failures.push(UnitFailure {
                index: index.to_string(),
                reason,
            }),
        }
    }

    /// Requested indices that the catalog does not list
    pub fn record_not_found(&mut self, names: &[String]) {
        self.not_found.extend_from_slice(names);
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Local::now());
    }

    pub fn success_count(&self) -> usize {
        self.succeeded.len()
    }

    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }

    pub fn failures(&self) -> &[UnitFailure] {
        &self.failures
    }

    pub fn succeeded(&self) -> &[(String, UnitStats)] {
        &self.succeeded
    }

    pub fn empty(&self) -> &[String] {
        &self.empty
    }

    pub fn not_found(&self) -> &[String] {
        &self.not_found
    }

    pub fn total_documents(&self) -> usize {
        self.succeeded.iter().map(|(_, s)| s.documents).sum()
    }

    pub fn summary_line(&self) -> String {
        format!(
            "ETL run completed: {} OK, {} FAIL",
            self.success_count(),
            self.failure_count()
        )
    }

    /// Operator-facing lines: the tally followed by one line per failure
    pub fn lines(&self) -> Vec<String> {
        let mut lines = vec![self.summary_line()];

        let bytes: u64 = self.succeeded.iter().map(|(_, s)| s.artifact_bytes).sum();
        let mut detail = format!(
            "{} documents, {} of JSON",
            self.total_documents(),
            ByteSize(bytes)
        );
        if !self.empty.is_empty() {
            detail.push_str(&format!(", {} empty indices skipped", self.empty.len()));
        }
        if let Some(finished) = self.finished_at {
            let elapsed = (finished - self.started_at).to_std().unwrap_or_default();
            detail.push_str(&format!(" in {:.2?}", elapsed));
        }
        lines.push(detail);

        for name in &self.not_found {
            lines.push(format!("Index '{}' not found in Elasticsearch", name));
        }
        for failure in &self.failures {
            lines.push(format!(
                "Failure in index '{}': {}",
                failure.index, failure.reason
            ));
        }
        lines
    }

    pub fn print(&self, term: &Term) -> io::Result<()> {
        let mut lines = self.lines().into_iter();
        if let Some(summary) = lines.next() {
            let summary = if self.failures.is_empty() {
                style(summary).green().bold()
            } else {
                style(summary).red().bold()
            };
            term.write_line(&summary.to_string())?;
        }
        for line in lines {
            term.write_line(&line)?;
        }
        Ok(())
    }

    /// Mirror the summary into the log
    pub fn log(&self) {
        info!("{}", self.summary_line());
        for (index, stats) in &self.succeeded {
            info!(
                "Index '{}': {} documents, {} rows written, {} rows skipped",
                index, stats.documents, stats.rows_written, stats.rows_skipped
            );
        }
        for name in &self.empty {
            info!("Index '{}' is empty", name);
        }
        for failure in &self.failures {
            error!("Failure in index '{}': {}", failure.index, failure.reason);
        }
    }
}
