// Legal Analyzer
// Prompt templates and per-segment legal risk analysis via the chat provider

use std::future::Future;
use std::time::Duration;
use tracing::{info, warn};

use crate::services::providers::{ProviderClient, ProviderError};

const DEFAULT_BACKOFF_MS: u64 = 400;

/// System instruction: legal expert on Kazakhstan legislation.
pub const LEGAL_SYSTEM_PROMPT: &str = "Ты — юридический эксперт по законодательству Казахстана. Анализируй документы и давай развернутые ответы с конкретными ссылками на законы.";

const LEGAL_USER_PROMPT_HEADER: &str = r#"Проанализируй следующий юридический документ на соответствие законодательству Казахстана.
Выяви потенциальные риски, несоответствия и проблемные формулировки.
Сгруппируй результаты по категориям:
1. Правовые риски
2. Неясные формулировки
3. Возможные нарушения
4. Рекомендации

Для каждой проблемы укажи:
- Описание
- Закон/статью
- Уровень риска (высокий, средний, низкий)
- Рекомендации по исправлению

Документ:
"#;

/// Embed one segment into the analysis prompt.
pub fn build_user_prompt(segment: &str) -> String {
    let mut prompt = String::with_capacity(LEGAL_USER_PROMPT_HEADER.len() + segment.len());
    prompt.push_str(LEGAL_USER_PROMPT_HEADER);
    prompt.push_str(segment);
    prompt
}

/// Analyzes one segment of a document. Implemented by [`LegalAnalyzer`] and
/// by test fakes.
pub trait SegmentAnalyzer: Send + Sync {
    fn analyze_segment(
        &self,
        segment: &str,
    ) -> impl Future<Output = Result<String, ProviderError>> + Send;

    /// Configuration problems detectable without network I/O.
    fn check_ready(&self) -> Result<(), ProviderError> {
        Ok(())
    }
}

pub struct LegalAnalyzer {
    client: ProviderClient,
    max_attempts: usize,
    backoff: Duration,
}

impl LegalAnalyzer {
    /// Single attempt per segment.
    pub fn new(client: ProviderClient) -> Self {
        Self {
            client,
            max_attempts: 1,
            backoff: Duration::from_millis(DEFAULT_BACKOFF_MS),
        }
    }

    /// Retry transient failures up to `max_attempts` total attempts with
    /// linear backoff (`backoff * attempt`).
    pub fn with_retry(mut self, max_attempts: usize, backoff: Duration) -> Self {
        self.max_attempts = max_attempts.max(1);
        self.backoff = backoff;
        self
    }

    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }
}

impl SegmentAnalyzer for LegalAnalyzer {
    async fn analyze_segment(&self, segment: &str) -> Result<String, ProviderError> {
        let user_prompt = build_user_prompt(segment);
        info!(
            "[LEGAL_ANALYZER] sending segment to AI ({} chars)",
            segment.chars().count()
        );

        let mut attempt = 1;
        loop {
            match self.client.chat(LEGAL_SYSTEM_PROMPT, &user_prompt).await {
                Ok(result) => {
                    info!(
                        attempt,
                        latency_ms = result.latency_ms,
                        "[LEGAL_ANALYZER] received answer ({} chars)",
                        result.content.chars().count()
                    );
                    return Ok(result.content);
                }
                Err(e) if e.is_transient() && attempt < self.max_attempts => {
                    warn!(
                        "[LEGAL_ANALYZER] attempt {}/{} failed, retrying: {}",
                        attempt, self.max_attempts, e
                    );
                    tokio::time::sleep(self.backoff * attempt as u32).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn check_ready(&self) -> Result<(), ProviderError> {
        self.client.ensure_configured()
    }
}
