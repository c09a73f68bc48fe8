// Analysis Orchestrator
// Drives segmentation, per-segment AI analysis and classification for one document

use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use super::classifier::classify_document;
use super::legal_analyzer::SegmentAnalyzer;
use super::segmenter::{split_text, Segment, SegmentError};
use crate::models::{DocumentText, DocumentType};
use crate::services::providers::ProviderError;

/// Joins per-segment results into the report.
pub const REPORT_SEPARATOR: &str = "\n\n---\n\n";
pub const DEFAULT_MAX_SEGMENT_CHARS: usize = 12_000;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Segmentation(#[from] SegmentError),
    #[error("analyzer not configured: {0}")]
    NotConfigured(#[source] ProviderError),
    #[error("analysis of part {part}/{total} failed: {source}")]
    SegmentFailed {
        part: usize,
        total: usize,
        #[source]
        source: ProviderError,
    },
    #[error("analysis task failed: {0}")]
    TaskFailed(String),
}

impl PipelineError {
    /// Input and configuration problems, detected before any network call.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            PipelineError::Segmentation(_) | PipelineError::NotConfigured(_)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Running,
    Failed,
    Completed,
}

impl RunState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, RunState::Running)
    }

    /// Terminal states absorb further transitions.
    pub fn transition(self, next: RunState) -> RunState {
        if self.is_terminal() {
            self
        } else {
            next
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineOptions {
    pub max_segment_chars: usize,
    /// 1 analyzes segments strictly one after another.
    pub concurrency: usize,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            max_segment_chars: DEFAULT_MAX_SEGMENT_CHARS,
            concurrency: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisOutcome {
    pub report: String,
    pub document_type: DocumentType,
    pub segment_count: usize,
    pub state: RunState,
}

pub struct AnalysisPipeline<A> {
    analyzer: Arc<A>,
    options: PipelineOptions,
}

impl<A> AnalysisPipeline<A>
where
    A: SegmentAnalyzer + 'static,
{
    pub fn new(analyzer: A, options: PipelineOptions) -> Self {
        Self::with_shared(Arc::new(analyzer), options)
    }

    pub fn with_shared(analyzer: Arc<A>, options: PipelineOptions) -> Self {
        Self { analyzer, options }
    }

    pub fn options(&self) -> PipelineOptions {
        self.options
    }

    /// Analyze the whole document.
    ///
    /// The first failing segment aborts the run and its cause is returned;
    /// results gathered before it are discarded. Classification uses the full
    /// text and does not depend on segmentation.
    pub async fn run(&self, text: &DocumentText) -> Result<AnalysisOutcome, PipelineError> {
        let started = Instant::now();
        self.analyzer
            .check_ready()
            .map_err(PipelineError::NotConfigured)?;

        let segments = split_text(text.as_str(), self.options.max_segment_chars)?;
        let total = segments.len();
        let mut state = RunState::Running;
        info!(
            chars = text.char_count(),
            max_segment_chars = self.options.max_segment_chars,
            concurrency = self.options.concurrency,
            "[PIPELINE] document split into {} parts",
            total
        );

        let results = if self.options.concurrency > 1 && total > 1 {
            self.analyze_parallel(segments).await
        } else {
            self.analyze_sequential(segments).await
        };

        let results = match results {
            Ok(results) => results,
            Err(e) => {
                state = state.transition(RunState::Failed);
                error!(
                    state = ?state,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "[PIPELINE] run failed: {}",
                    e
                );
                return Err(e);
            }
        };

        let report = results.join(REPORT_SEPARATOR);
        let document_type = classify_document(text.as_str());
        state = state.transition(RunState::Completed);

        info!(
            state = ?state,
            document_type = document_type.code(),
            report_chars = report.chars().count(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "[PIPELINE] analysis complete"
        );

        Ok(AnalysisOutcome {
            report,
            document_type,
            segment_count: total,
            state,
        })
    }

    async fn analyze_sequential(
        &self,
        segments: Vec<Segment>,
    ) -> Result<Vec<String>, PipelineError> {
        let total = segments.len();
        let mut results = Vec::with_capacity(total);

        for segment in segments {
            let part = segment.index + 1;
            info!("[PIPELINE] analyzing part {}/{} ({} chars)", part, total, segment.char_len);

            match self.analyzer.analyze_segment(&segment.text).await {
                Ok(result) => {
                    info!(
                        "[PIPELINE] part {}/{} done, result {} chars",
                        part,
                        total,
                        result.chars().count()
                    );
                    results.push(result);
                }
                Err(source) => {
                    warn!(
                        "[PIPELINE] part {}/{} failed, discarding {} completed parts: {}",
                        part,
                        total,
                        results.len(),
                        source
                    );
                    return Err(PipelineError::SegmentFailed { part, total, source });
                }
            }
        }

        Ok(results)
    }

    /// Bounded fan-out. Results are placed by segment index, so the report
    /// order never depends on completion order. The first error aborts every
    /// task still in flight. More permits than segments are never handed out.
    async fn analyze_parallel(
        &self,
        segments: Vec<Segment>,
    ) -> Result<Vec<String>, PipelineError> {
        let total = segments.len();
        let permits = self
            .options
            .concurrency
            .min(total)
            .clamp(1, Semaphore::MAX_PERMITS);
        let semaphore = Arc::new(Semaphore::new(permits));
        let mut join_set: JoinSet<(usize, Result<String, ProviderError>)> = JoinSet::new();

        for segment in segments {
            let analyzer = Arc::clone(&self.analyzer);
            let semaphore = Arc::clone(&semaphore);
            join_set.spawn(async move {
                // Permit is held only while the request is in flight.
                let _permit = semaphore.acquire().await;
                let result = analyzer.analyze_segment(&segment.text).await;
                (segment.index, result)
            });
        }

        let mut slots: Vec<Option<String>> = vec![None; total];
        let mut done = 0usize;
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((index, Ok(result))) => {
                    done += 1;
                    info!(
                        "[PIPELINE] part {}/{} done ({}/{} complete)",
                        index + 1,
                        total,
                        done,
                        total
                    );
                    slots[index] = Some(result);
                }
                Ok((index, Err(source))) => {
                    join_set.abort_all();
                    warn!(
                        "[PIPELINE] part {}/{} failed, cancelling {} remaining parts: {}",
                        index + 1,
                        total,
                        total - done - 1,
                        source
                    );
                    return Err(PipelineError::SegmentFailed {
                        part: index + 1,
                        total,
                        source,
                    });
                }
                Err(e) => {
                    join_set.abort_all();
                    return Err(PipelineError::TaskFailed(e.to_string()));
                }
            }
        }

        slots
            .into_iter()
            .enumerate()
            .map(|(i, slot)| {
                slot.ok_or_else(|| {
                    PipelineError::TaskFailed(format!("part {} produced no result", i + 1))
                })
            })
            .collect()
    }
}
