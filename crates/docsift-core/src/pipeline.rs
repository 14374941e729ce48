//! Batch orchestration: documents in, one consolidated table out.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::aggregate::Aggregator;
use crate::error::{DocumentError, Result, SiftError};
use crate::extract::DocumentProcessor;
use crate::models::config::SiftConfig;
use crate::models::document::SourcedDocument;
use crate::models::record::{DocumentRecord, ResultTable, SOURCE_ID_COLUMN};
use crate::rules::RuleSet;

/// Cooperative cancellation signal shared between a run and its caller.
///
/// Cancelling stops new documents from being dispatched; documents already
/// being processed still complete and end up in the partial table.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Callback invoked once for every processed document.
pub type RecordCallback = Arc<dyn Fn(&DocumentRecord) + Send + Sync>;

/// Runs the document processor over a batch and aggregates the results.
pub struct Pipeline {
    rules: Arc<RuleSet>,
    processor: DocumentProcessor,
    workers: usize,
    sort_by: Option<String>,
    cancel: CancellationToken,
    on_record: Option<RecordCallback>,
}

impl Pipeline {
    /// Create a pipeline for an already validated rule set.
    pub fn new(rules: impl Into<Arc<RuleSet>>, config: &SiftConfig) -> Self {
        Self {
            rules: rules.into(),
            processor: DocumentProcessor::new(config.matching.clone())
                .with_max_pages(config.pipeline.max_pages),
            workers: config.pipeline.workers.max(1),
            sort_by: config.pipeline.sort_by.clone(),
            cancel: CancellationToken::new(),
            on_record: None,
        }
    }

    /// Set the number of worker threads (1 = sequential).
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Use an externally owned cancellation token.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Register a progress callback.
    pub fn on_record(mut self, callback: impl Fn(&DocumentRecord) + Send + Sync + 'static) -> Self {
        self.on_record = Some(Arc::new(callback));
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// Process documents that were already extracted.
    pub fn run<I>(&self, documents: I) -> Result<ResultTable>
    where
        I: IntoIterator<Item = SourcedDocument>,
    {
        self.run_with(documents, |document| document)
    }

    /// Process arbitrary inputs, turning each into a document with `load`
    /// inside the worker that processes it.
    ///
    /// Records reach the aggregator in input order regardless of the number
    /// of workers, so duplicate detection and row order are deterministic.
    pub fn run_with<I, T, F>(&self, inputs: I, load: F) -> Result<ResultTable>
    where
        I: IntoIterator<Item = T>,
        T: Send,
        F: Fn(T) -> SourcedDocument + Sync,
    {
        self.check_sort_key()?;

        let start = Instant::now();
        let mut aggregator =
            Aggregator::new(self.rules.schema()).with_sort_key(self.sort_by.clone());

        info!(
            "Starting run with {} rules on {} worker(s)",
            self.rules.len(),
            self.workers
        );

        if self.workers == 1 {
            for (ordinal, input) in inputs.into_iter().enumerate() {
                if self.cancel.is_cancelled() {
                    aggregator.mark_cancelled();
                    break;
                }
                let record = self.process_one(ordinal, input, &load);
                self.aggregate(&mut aggregator, record)?;
            }
        } else {
            let inputs: Vec<T> = inputs.into_iter().collect();
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(self.workers)
                .build()
                .map_err(|e| SiftError::Config(format!("cannot start worker pool: {}", e)))?;

            let records: Vec<Option<DocumentRecord>> = pool.install(|| {
                inputs
                    .into_par_iter()
                    .enumerate()
                    .map(|(ordinal, input)| {
                        if self.cancel.is_cancelled() {
                            return None;
                        }
                        Some(self.process_one(ordinal, input, &load))
                    })
                    .collect()
            });

            if records.iter().any(Option::is_none) {
                aggregator.mark_cancelled();
            }
            for record in records.into_iter().flatten() {
                self.aggregate(&mut aggregator, record)?;
            }
        }

        let table = aggregator.into_table();
        info!(
            "Run finished: {} documents, {} flagged, cancelled={}, {:?}",
            table.len(),
            table.flagged().count(),
            table.cancelled,
            start.elapsed()
        );

        Ok(table)
    }

    fn process_one<T, F>(&self, ordinal: usize, input: T, load: &F) -> DocumentRecord
    where
        F: Fn(T) -> SourcedDocument,
    {
        // A panicking loader only costs its own row.
        let document = panic::catch_unwind(AssertUnwindSafe(|| load(input)))
            .unwrap_or_else(|payload| {
                let source_id = format!("input #{}", ordinal + 1);
                warn!("Loader panicked on {}", source_id);
                Err(DocumentError::new(
                    source_id,
                    format!("extraction panicked: {}", panic_message(payload.as_ref())),
                ))
            });
        let record = self.processor.process_sourced(&document, &self.rules);
        if let Some(callback) = &self.on_record {
            callback(&record);
        }
        record
    }

    fn aggregate(&self, aggregator: &mut Aggregator, record: DocumentRecord) -> Result<()> {
        if let Some(reason) = &record.processing_error {
            warn!("Failed to process {}: {}", record.source_id, reason);
        } else if !record.missing_required.is_empty() {
            debug!(
                "{} is missing required rules: {}",
                record.source_id,
                record.missing_required.join(", ")
            );
        }
        aggregator.add(record)?;
        Ok(())
    }

    fn check_sort_key(&self) -> Result<()> {
        match &self.sort_by {
            Some(key) if key != SOURCE_ID_COLUMN && !self.rules.schema().contains(key) => Err(
                SiftError::Config(format!("unknown sort column '{}'", key)),
            ),
            _ => Ok(()),
        }
    }
}

/// Text of a panic payload, when it carries one.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
