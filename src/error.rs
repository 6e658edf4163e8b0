//! 에러 타입 모듈
//!
//! 실패 범주마다 별도의 에러 타입을 둡니다.
//! 호출자는 에러 종류만으로 재시도/중단을 결정할 수 있습니다.
//!
//! - 설정 에러: 생성 시점에 치명적, 재시도 없음
//! - 수집(ingestion) 에러: 파일 단위 실패는 건너뛰고, 전체 실패는 치명적
//! - 인덱스 로드 에러: `NotFound`는 전체 재구축으로 복구
//! - 쿼리 에러: 검색 엔진 내부에서 문자열 결과로 변환
//! - 에이전트 에러: 재시도 예산 소진 시 해당 턴만 실패

use std::path::PathBuf;

use thiserror::Error;

// ============================================================================
// Configuration
// ============================================================================

/// 설정 에러
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("chunk_size must be at least {min} (got {got})")]
    ChunkSizeTooSmall { min: usize, got: usize },

    #[error("overlap must be smaller than chunk_size (overlap={overlap}, chunk_size={chunk_size})")]
    InvalidOverlap { overlap: usize, chunk_size: usize },

    #[error("document root does not exist or is not a directory: {0}")]
    MissingRoot(PathBuf),

    #[error("invalid value for {key}: {message}")]
    InvalidValue { key: &'static str, message: String },

    #[error("OPENAI_API_KEY not set. Export it or add it to .env")]
    MissingApiKey,

    #[error("failed to create HTTP client: {0}")]
    HttpClient(String),
}

// ============================================================================
// Extraction
// ============================================================================

/// 파일 단위 텍스트 추출 에러 (해당 파일만 건너뜀)
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("PDF extraction failed for {path}: {message}")]
    Pdf { path: PathBuf, message: String },

    #[error("DOCX extraction failed for {path}: {message}")]
    Docx { path: PathBuf, message: String },

    #[error("extraction task failed: {0}")]
    Task(String),
}

// ============================================================================
// Embedding
// ============================================================================

/// 임베딩 서비스 에러 (배치 단위로 원자적 실패)
#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("embedding request failed: {0}")]
    Transport(String),

    #[error("embedding API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("invalid embedding response: {0}")]
    InvalidResponse(String),

    #[error("embedding service returned {got} vectors for {expected} inputs")]
    CountMismatch { expected: usize, got: usize },

    #[error("embedding dimension changed from {expected} to {got}")]
    DimensionMismatch { expected: usize, got: usize },
}

// ============================================================================
// Vector Index
// ============================================================================

/// 벡터 인덱스 에러
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("no index found (expected {index_path} and {meta_path})")]
    NotFound {
        index_path: PathBuf,
        meta_path: PathBuf,
    },

    #[error("index I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupt index: {0}")]
    Corrupt(String),

    #[error("vector has dimension {got}, index expects {expected}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("{vectors} vectors supplied for {chunks} chunks")]
    LengthMismatch { vectors: usize, chunks: usize },
}

// ============================================================================
// Ingestion
// ============================================================================

/// 수집 파이프라인 에러 (모두 치명적)
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("no .pdf/.docx/.txt documents found under {0}")]
    NoDocuments(PathBuf),

    #[error("none of the {attempted} documents under {root} could be extracted")]
    NoExtractableDocuments { root: PathBuf, attempted: usize },

    #[error("embedding batch failed, ingestion aborted: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("chunk {row} has embedding dimension {got}, expected {expected}")]
    DimensionMismatch {
        row: usize,
        expected: usize,
        got: usize,
    },

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error("document discovery failed: {0}")]
    Discovery(String),
}

// ============================================================================
// Retrieval Engine
// ============================================================================

/// 검색 엔진 초기화 에러
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error("engine already initialized for {existing}, refusing {requested}")]
    RootMismatch {
        existing: PathBuf,
        requested: PathBuf,
    },
}

/// 쿼리 시점 에러 (도구 결과 문자열로 변환됨)
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("the question must not be empty")]
    EmptyQuestion,

    #[error("k must be between {min} and {max} (got {got})")]
    InvalidK { got: usize, min: usize, max: usize },

    #[error("could not embed the question: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error(transparent)]
    Index(#[from] IndexError),
}

// ============================================================================
// Agent
// ============================================================================

/// 언어 모델 호출의 전송 계층 에러
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("model request failed: {0}")]
    Transport(String),

    #[error("model API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("could not decode model response: {0}")]
    Decode(String),
}

/// 에이전트 루프 에러 (해당 사용자 턴만 실패)
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("assistant produced no usable output after {attempts} attempts (last: {last_reason})")]
    RetriesExhausted { attempts: u32, last_reason: String },
}

// ============================================================================
// Tests
// ============================================================================
