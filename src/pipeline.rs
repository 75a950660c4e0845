//! Per-index orchestration.
//!
//! Each index runs `Pending -> Fetching -> (Empty | Flattening -> SchemaReady ->
//! TableReady -> Upserting -> Done) | Failed`, one index at a time. A failure
//! is recorded against its index and the run moves on.

use indicatif::ProgressBar;
use log::{debug, error, info};
use std::fmt;
use std::path::PathBuf;

use crate::artifact::write_json_artifact;
use crate::cli::ExtraColumns;
use crate::config::EtlConfig;
use crate::error::EtlError;
use crate::flatten::flatten;
use crate::progress::stage_message;
use crate::report::{RunReport, UnitOutcome, UnitStats};
use crate::schema::infer_schema;
use crate::source::{DocumentSource, collect_pages};
use crate::store::{TableStore, UpsertOutcome, ensure_table, upsert};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitState {
    Pending,
    Fetching,
    Empty,
    Flattening,
    SchemaReady,
    TableReady,
    Upserting,
    Done,
    Failed,
}

impl fmt::Display for UnitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            UnitState::Pending => "pending",
            UnitState::Fetching => "fetching",
            UnitState::Empty => "empty",
            UnitState::Flattening => "flattening",
            UnitState::SchemaReady => "schema ready",
            UnitState::TableReady => "table ready",
            UnitState::Upserting => "upserting",
            UnitState::Done => "done",
            UnitState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Settings the orchestrator needs from the run configuration
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub batch_size: usize,
    pub output_dir: PathBuf,
    pub extra_columns: ExtraColumns,
}

impl From<&EtlConfig> for PipelineOptions {
    fn from(config: &EtlConfig) -> Self {
        Self {
            batch_size: config.batch_size,
            output_dir: config.output_dir.clone(),
            extra_columns: config.extra_columns,
        }
    }
}

/// Why an index failed: the stage it reached and every error raised
#[derive(Debug)]
pub struct UnitFailed {
    pub state: UnitState,
    pub errors: Vec<EtlError>,
}

impl UnitFailed {
    pub fn reason(&self) -> String {
        self.errors
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Sequentially moves indices from a [`DocumentSource`] into JSON files and a [`TableStore`]
pub struct Pipeline<'a, S: DocumentSource + ?Sized, T: TableStore + ?Sized> {
    source: &'a S,
    store: &'a T,
    options: PipelineOptions,
    progress: ProgressBar,
}

impl<'a, S: DocumentSource + ?Sized, T: TableStore + ?Sized> Pipeline<'a, S, T> {
    pub fn new(source: &'a S, store: &'a T, options: PipelineOptions) -> Self {
        Self {
            source,
            store,
            options,
            progress: ProgressBar::hidden(),
        }
    }

    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    /// Process every index in order and report the outcome of each
    pub async fn run(&self, indices: &[String]) -> RunReport {
        let mut report = RunReport::new();
        self.progress.set_length(indices.len() as u64);

        for index in indices {
            let result = self
                .process_index(index)
                .await
                .map_err(|failed| failed.reason());
            match &result {
                Ok(UnitOutcome::Loaded(stats)) => info!(
                    "Index '{}': OK ({} documents, {} rows)",
                    index, stats.documents, stats.rows_written
                ),
                Ok(UnitOutcome::Empty) => info!("Index '{}' is empty, skipped", index),
                Err(reason) => error!("Index '{}': FAIL: {}", index, reason),
            }
            report.record(index, result);
            self.progress.inc(1);
        }

        report.finish();
        self.progress.finish_with_message(format!(
            "{} OK, {} FAIL",
            report.success_count(),
            report.failure_count()
        ));
        report
    }

    fn enter(&self, index: &str, state: &mut UnitState, next: UnitState) {
        debug!("{}: {} -> {}", index, state, next);
        *state = next;
        self.progress
            .set_message(stage_message(index, &next.to_string()));
    }

    fn fail(&self, index: &str, state: &mut UnitState, errors: Vec<EtlError>) -> UnitFailed {
        let failed_in = *state;
        self.enter(index, state, UnitState::Failed);
        UnitFailed {
            state: failed_in,
            errors,
        }
    }

    /// Run one index through the pipeline.
    ///
    /// The JSON file and the table are both attempted once documents are
    /// fetched; the index fails if either does.
    pub async fn process_index(&self, index: &str) -> Result<UnitOutcome, UnitFailed> {
        let mut state = UnitState::Pending;

        self.enter(index, &mut state, UnitState::Fetching);
        let pages = match collect_pages(self.source, index).await {
            Ok(pages) => pages,
            Err(e) => return Err(self.fail(index, &mut state, vec![e])),
        };

        let first_page_len = pages.first().map_or(0, Vec::len);
        let hits: Vec<_> = pages.into_iter().flatten().collect();
        if hits.is_empty() {
            self.enter(index, &mut state, UnitState::Empty);
            return Ok(UnitOutcome::Empty);
        }

        let mut errors = Vec::new();
        let artifact = write_json_artifact(&self.options.output_dir, index, &hits).await;
        let artifact_bytes = match artifact {
            Ok(artifact) => artifact.bytes,
            Err(e) => {
                errors.push(e);
                0
            }
        };

        self.enter(index, &mut state, UnitState::Flattening);
        let rows = flatten(&hits);

        // The first page alone decides the table layout
        let spec = infer_schema(&rows[..first_page_len]);
        self.enter(index, &mut state, UnitState::SchemaReady);

        let loaded = match ensure_table(self.store, index, &spec).await {
            Ok(()) => {
                self.enter(index, &mut state, UnitState::TableReady);
                self.enter(index, &mut state, UnitState::Upserting);
                upsert(
                    self.store,
                    index,
                    &spec,
                    &rows,
                    self.options.batch_size,
                    self.options.extra_columns,
                )
                .await
            }
            Err(e) => Err(e),
        };

        let outcome = match loaded {
            Ok(outcome) => outcome,
            Err(e) => {
                errors.push(e);
                UpsertOutcome::default()
            }
        };

        if !errors.is_empty() {
            return Err(self.fail(index, &mut state, errors));
        }

        self.enter(index, &mut state, UnitState::Done);
        Ok(UnitOutcome::Loaded(UnitStats {
            documents: hits.len(),
            rows_written: outcome.written,
            rows_skipped: outcome.skipped,
            artifact_bytes,
        }))
    }
}
