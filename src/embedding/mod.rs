//! 임베딩 모듈 - OpenAI 호환 API를 통한 텍스트 벡터화
//!
//! 텍스트 목록을 같은 순서의 벡터 목록으로 변환합니다.
//! 벡터 차원은 첫 응답에서 결정되고 이후 고정됩니다.
//!
//! ## 사용법
//! ```rust,ignore
//! let embedder = OpenAiEmbedding::new(&config.api, &config.embedding)?;
//! let vectors = embedder.embed_batch(&texts).await?;
//! ```

use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::{ApiConfig, EmbeddingConfig};
use crate::error::{ConfigError, EmbeddingError};

// ============================================================================
// EmbeddingProvider Trait
// ============================================================================

/// 임베딩 프로바이더 트레이트
///
/// 배치 호출은 원자적입니다. 배치 하나가 실패하면 전체 호출이 실패합니다.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// 배치 임베딩 (입력 순서 유지, 입력당 벡터 하나)
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    /// 단일 텍스트 임베딩 (쿼리 시점)
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let mut vectors = self.embed_batch(&[text.to_string()]).await?;
        if vectors.len() != 1 {
            return Err(EmbeddingError::CountMismatch {
                expected: 1,
                got: vectors.len(),
            });
        }
        Ok(vectors.remove(0))
    }

    /// 프로바이더 이름
    fn name(&self) -> &str;
}

// ============================================================================
// OpenAI-compatible Embedding
// ============================================================================

/// 재시도 시 초기 백오프
const INITIAL_BACKOFF: Duration = Duration::from_millis(1000);
/// 백오프 상한
const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// OpenAI 호환 `/embeddings` 구현체
#[derive(Debug)]
pub struct OpenAiEmbedding {
    client: reqwest::Client,
    url: String,
    api_key: String,
    model: String,
    batch_size: usize,
    max_retries: u32,
    backoff: Duration,
    dimension: OnceLock<usize>,
}

impl OpenAiEmbedding {
    /// 설정으로 생성 (API 키 필수)
    pub fn new(api: &ApiConfig, embedding: &EmbeddingConfig) -> Result<Self, ConfigError> {
        let api_key = api.api_key.clone().ok_or(ConfigError::MissingApiKey)?;
        if embedding.batch_size == 0 {
            return Err(ConfigError::InvalidValue {
                key: "RAG_EMBED_BATCH_SIZE",
                message: "must be at least 1".to_string(),
            });
        }

        Ok(Self {
            client: api.http_client()?,
            url: api.endpoint("embeddings"),
            api_key,
            model: embedding.model.clone(),
            batch_size: embedding.batch_size,
            max_retries: api.max_retries,
            backoff: INITIAL_BACKOFF,
            dimension: OnceLock::new(),
        })
    }

    /// 초기 백오프 변경
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// 배치 하나 요청 (재시도 포함)
    async fn request_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let request = EmbedRequest {
            model: &self.model,
            input: texts,
        };

        let mut last_error = EmbeddingError::Transport("no attempt made".to_string());

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let backoff = self.backoff_delay(attempt);
                tracing::warn!(
                    "{}, retrying in {:?} (attempt {}/{})",
                    last_error,
                    backoff,
                    attempt,
                    self.max_retries
                );
                tokio::time::sleep(backoff).await;
            }

            let response = match self
                .client
                .post(&self.url)
                .bearer_auth(&self.api_key)
                .json(&request)
                .send()
                .await
            {
                Ok(resp) => resp,
                Err(e) => {
                    last_error = EmbeddingError::Transport(e.to_string());
                    continue;
                }
            };

            let status = response.status();
            let body = response
                .text()
                .await
                .map_err(|e| EmbeddingError::Transport(e.to_string()))?;

            if status.is_success() {
                return parse_response(&body, texts.len());
            }

            last_error = EmbeddingError::Api {
                status: status.as_u16(),
                body: api_error_message(&body),
            };

            // 429/5xx만 재시도
            if !(status.as_u16() == 429 || status.is_server_error()) {
                break;
            }
        }

        Err(last_error)
    }

    /// n번째 재시도 전 대기 시간 (지수 증가, 상한 있음)
    fn backoff_delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.backoff.saturating_mul(factor).min(MAX_BACKOFF)
    }

    /// 차원 고정 확인
    fn check_dimension(&self, vectors: &[Vec<f32>]) -> Result<(), EmbeddingError> {
        for v in vectors {
            if v.is_empty() {
                return Err(EmbeddingError::InvalidResponse(
                    "empty embedding vector".to_string(),
                ));
            }
            let expected = *self.dimension.get_or_init(|| v.len());
            if v.len() != expected {
                return Err(EmbeddingError::DimensionMismatch {
                    expected,
                    got: v.len(),
                });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    data: Vec<EmbedData>,
}

#[derive(Debug, Deserialize)]
struct EmbedData {
    index: usize,
    embedding: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

/// 응답 파싱: `index` 순으로 정렬 후 개수 확인
fn parse_response(body: &str, expected: usize) -> Result<Vec<Vec<f32>>, EmbeddingError> {
    let mut response: EmbedResponse =
        serde_json::from_str(body).map_err(|e| EmbeddingError::InvalidResponse(e.to_string()))?;

    if response.data.len() != expected {
        return Err(EmbeddingError::CountMismatch {
            expected,
            got: response.data.len(),
        });
    }

    response.data.sort_by_key(|d| d.index);
    if response
        .data
        .iter()
        .enumerate()
        .any(|(i, d)| d.index != i)
    {
        return Err(EmbeddingError::InvalidResponse(
            "response indices do not cover the batch".to_string(),
        ));
    }

    Ok(response.data.into_iter().map(|d| d.embedding).collect())
}

fn api_error_message(body: &str) -> String {
    serde_json::from_str::<ApiErrorBody>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| body.to_string())
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbedding {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let mut results = Vec::with_capacity(texts.len());
        let total_batches = texts.len().div_ceil(self.batch_size);

        for (i, batch) in texts.chunks(self.batch_size).enumerate() {
            tracing::debug!(
                "Embedding batch {}/{} ({} texts)",
                i + 1,
                total_batches,
                batch.len()
            );
            let vectors = self.request_batch(batch).await?;
            self.check_dimension(&vectors)?;
            results.extend(vectors);
        }

        Ok(results)
    }

    fn name(&self) -> &str {
        &self.model
    }
}

// ============================================================================
// Factory Function
// ============================================================================

/// 임베딩 프로바이더 생성
pub fn create_embedder(
    api: &ApiConfig,
    embedding: &EmbeddingConfig,
) -> Result<OpenAiEmbedding, ConfigError> {
    let embedder = OpenAiEmbedding::new(api, embedding)?;
    tracing::info!(
        "Using embedding model {} (batch size {})",
        embedder.model,
        embedder.batch_size
    );
    Ok(embedder)
}

// ============================================================================
// Test Support
// ============================================================================


// ============================================================================
// Tests
// ============================================================================
