// Document Service
// Caller-facing entry point: intake -> analysis pipeline -> history

use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::models::{AnalysisRecord, AnalysisResponse, RelevantLaw};
use crate::services::analysis::{
    AnalysisPipeline, LegalAnalyzer, PipelineError, PipelineOptions, SegmentAnalyzer,
};
use crate::services::config_store::AppConfig;
use crate::services::history_store::{
    AnalysisRepository, JsonlHistoryStore, StoreError, DEFAULT_HISTORY_LIMIT,
};
use crate::services::pdf_intake::{
    extract_document_text, IntakeError, PdfExtractText, PdfTextExtractor,
};
use crate::services::providers::{ProviderClient, ProviderError};

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error(transparent)]
    Intake(#[from] IntakeError),
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    #[error("failed to load history: {0}")]
    History(#[source] StoreError),
    #[error("background task failed: {0}")]
    TaskFailed(String),
}

/// JSON error body returned to callers.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub code: &'static str,
    pub status: u16,
}

impl ServiceError {
    /// HTTP-style classification: 400 for input and configuration problems,
    /// 500 for upstream and storage failures.
    pub fn status_code(&self) -> u16 {
        match self {
            ServiceError::Intake(_) => 400,
            ServiceError::Pipeline(e) if e.is_client_error() => 400,
            ServiceError::Pipeline(_) => 500,
            ServiceError::History(_) => 500,
            ServiceError::TaskFailed(_) => 500,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::Intake(e) => e.code(),
            ServiceError::Pipeline(PipelineError::NotConfigured(_)) => "CONFIGURATION_ERROR",
            ServiceError::Pipeline(PipelineError::Segmentation(_)) => "INVALID_INPUT",
            ServiceError::Pipeline(_) => "ANALYSIS_ERROR",
            ServiceError::History(_) => "HISTORY_ERROR",
            ServiceError::TaskFailed(_) => "INTERNAL_ERROR",
        }
    }

    pub fn to_body(&self) -> ErrorBody {
        ErrorBody {
            error: self.to_string(),
            code: self.code(),
            status: self.status_code(),
        }
    }
}

pub struct DocumentService<A> {
    pipeline: AnalysisPipeline<A>,
    extractor: Arc<dyn PdfTextExtractor>,
    repository: Arc<dyn AnalysisRepository>,
    history_limit: usize,
}

impl DocumentService<LegalAnalyzer> {
    /// Wire the production stack from configuration.
    pub fn from_config(config: &AppConfig) -> Result<Self, ProviderError> {
        let settings = config.provider_settings();
        info!(settings = ?settings, "[DOCUMENT] provider configured");

        let analyzer = LegalAnalyzer::new(ProviderClient::new(settings)?)
            .with_retry(config.analysis.max_attempts, config.retry_backoff());
        let repository = Arc::new(JsonlHistoryStore::new(config.history_path()));

        Ok(Self::new(
            AnalysisPipeline::new(analyzer, config.pipeline_options()),
            Arc::new(PdfExtractText),
            repository,
        )
        .with_history_limit(config.storage.history_limit))
    }
}

impl<A> DocumentService<A>
where
    A: SegmentAnalyzer + 'static,
{
    pub fn new(
        pipeline: AnalysisPipeline<A>,
        extractor: Arc<dyn PdfTextExtractor>,
        repository: Arc<dyn AnalysisRepository>,
    ) -> Self {
        Self {
            pipeline,
            extractor,
            repository,
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }

    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }

    pub fn pipeline_options(&self) -> PipelineOptions {
        self.pipeline.options()
    }

    /// Analyze an uploaded PDF. A failure to persist the result is logged and
    /// does not affect the returned analysis.
    ///
    /// PDF parsing and the history write run on the blocking pool so
    /// concurrent analyses keep sharing the async workers.
    pub async fn analyze_document(
        &self,
        filename: &str,
        bytes: &[u8],
    ) -> Result<AnalysisResponse, ServiceError> {
        info!("[DOCUMENT] analysis requested for {}", filename);

        let extractor = Arc::clone(&self.extractor);
        let name = filename.to_string();
        let data = bytes.to_vec();
        let text = tokio::task::spawn_blocking(move || {
            extract_document_text(extractor.as_ref(), &name, &data)
        })
        .await
        .map_err(|e| ServiceError::TaskFailed(e.to_string()))?
        .map_err(|e| {
            error!("[DOCUMENT] intake failed for {}: {}", filename, e);
            e
        })?;

        let outcome = self.pipeline.run(&text).await?;

        let record = AnalysisRecord::new(
            filename,
            outcome.document_type,
            outcome.report.as_str(),
            &text,
        );
        let repository = Arc::clone(&self.repository);
        match tokio::task::spawn_blocking(move || repository.save(&record)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("[DOCUMENT] failed to save analysis for {}: {}", filename, e),
            Err(e) => warn!("[DOCUMENT] save task for {} failed: {}", filename, e),
        }

        info!(
            document_type = outcome.document_type.code(),
            parts = outcome.segment_count,
            "[DOCUMENT] analysis ready ({} chars)",
            outcome.report.chars().count()
        );

        Ok(AnalysisResponse::new(
            outcome.report,
            outcome.document_type,
            filename.to_string(),
        ))
    }

    /// Newest-first history; `None` uses the configured limit.
    pub fn history(&self, limit: Option<usize>) -> Result<Vec<AnalysisRecord>, ServiceError> {
        self.repository
            .history(limit.unwrap_or(self.history_limit))
            .map_err(|e| {
                error!("[DOCUMENT] history lookup failed: {}", e);
                ServiceError::History(e)
            })
    }
}

/// Reference codes of the Republic of Kazakhstan the analysis cites most.
pub fn relevant_laws() -> Vec<RelevantLaw> {
    [
        ("Гражданский кодекс РК", "https://adilet.zan.kz/rus/docs/K950001000_"),
        ("Налоговый кодекс РК", "https://adilet.zan.kz/rus/docs/K2100000409"),
        ("Трудовой кодекс РК", "https://adilet.zan.kz/rus/docs/K1500000011"),
        (
            "Кодекс об административных правонарушениях РК",
            "https://adilet.zan.kz/rus/docs/K1400000233",
        ),
    ]
    .into_iter()
    .map(|(name, url)| RelevantLaw {
        name: name.to_string(),
        url: url.to_string(),
    })
    .collect()
}
