//! 설정 모듈
//!
//! 기본값 → 환경변수 → CLI 플래그 순으로 값을 덮어씁니다.
//! 검증은 [`Config::validate`]에서 한 번만 수행합니다.
//!
//! ## 사용법
//! ```rust,ignore
//! dotenvy::dotenv().ok();
//! let config = Config::from_env()?;
//! config.validate()?;
//! ```

use std::path::PathBuf;
use std::str::FromStr;

use crate::error::ConfigError;
use crate::knowledge::ChunkConfig;

// ============================================================================
// Defaults
// ============================================================================

/// 검색 결과 개수 하한
pub const MIN_K: usize = 1;
/// 검색 결과 개수 상한
pub const MAX_K: usize = 10;
/// 도구 호출 시 k 기본값
pub const DEFAULT_K: usize = 3;

/// 기본 문서 루트
pub const DEFAULT_DATA_DIR: &str = "data";
/// 문서 루트 아래 기본 인덱스 폴더 이름
pub const DEFAULT_INDEX_SUBDIR: &str = "index";

/// OpenAI 호환 API 기본 엔드포인트
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
/// 기본 임베딩 모델
pub const DEFAULT_EMBED_MODEL: &str = "text-embedding-3-large";
/// 기본 채팅 모델
pub const DEFAULT_CHAT_MODEL: &str = "gpt-4.1-mini";
/// 임베딩 배치 크기 (프로바이더 최대치보다 작게)
pub const DEFAULT_EMBED_BATCH_SIZE: usize = 100;

/// 임베딩 HTTP 재시도 상한
pub const MAX_HTTP_RETRIES: u32 = 10;

/// 사용자 턴당 어시스턴트 재시도 예산
pub const DEFAULT_MAX_RETRIES: u32 = 3;
/// 사용자 턴당 도구 라운드 상한
pub const DEFAULT_MAX_TOOL_ROUNDS: usize = 5;

// ============================================================================
// Config Types
// ============================================================================

/// 전체 설정
#[derive(Debug, Clone)]
pub struct Config {
    /// 문서 루트 디렉토리
    pub data_dir: PathBuf,
    /// 인덱스 폴더 (없으면 `<data_dir>/index`)
    pub index_dir: Option<PathBuf>,
    pub chunking: ChunkConfig,
    pub retrieval: RetrievalConfig,
    pub embedding: EmbeddingConfig,
    pub api: ApiConfig,
    pub agent: AgentConfig,
    pub log: LogConfig,
}

/// 검색 설정
#[derive(Debug, Clone)]
pub struct RetrievalConfig {
    /// 모델이 k를 생략했을 때 사용할 값
    pub default_k: usize,
}

/// 임베딩 설정
#[derive(Debug, Clone)]
pub struct EmbeddingConfig {
    pub model: String,
    pub batch_size: usize,
}

/// OpenAI 호환 API 접속 설정 (임베딩/채팅 공용)
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
    /// 429/5xx/연결 에러 시 HTTP 재시도 횟수
    pub max_retries: u32,
}

/// 에이전트 설정
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub chat_model: String,
    pub max_retries: u32,
    pub max_tool_rounds: usize,
    /// 시스템 프롬프트에 들어갈 사용자 이름
    pub user_name: Option<String>,
    /// 기본 지시문 대체
    pub system_prompt: Option<String>,
}

/// 로깅 설정
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub level: String,
    pub dir: PathBuf,
    pub to_file: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            index_dir: None,
            chunking: ChunkConfig::default(),
            retrieval: RetrievalConfig {
                default_k: DEFAULT_K,
            },
            embedding: EmbeddingConfig {
                model: DEFAULT_EMBED_MODEL.to_string(),
                batch_size: DEFAULT_EMBED_BATCH_SIZE,
            },
            api: ApiConfig {
                base_url: DEFAULT_BASE_URL.to_string(),
                api_key: None,
                timeout_secs: 60,
                max_retries: 3,
            },
            agent: AgentConfig {
                chat_model: DEFAULT_CHAT_MODEL.to_string(),
                max_retries: DEFAULT_MAX_RETRIES,
                max_tool_rounds: DEFAULT_MAX_TOOL_ROUNDS,
                user_name: None,
                system_prompt: None,
            },
            log: LogConfig {
                level: "info".to_string(),
                dir: PathBuf::from("logs"),
                to_file: true,
            },
        }
    }
}

// ============================================================================
// Loading
// ============================================================================

impl Config {
    /// 환경변수에서 설정 로드
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 임의의 키 조회 함수로 설정 로드 (테스트에서 환경변수 대신 사용)
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(dir) = get("RAG_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Some(dir) = get("RAG_INDEX_DIR") {
            config.index_dir = Some(PathBuf::from(dir));
        }
        if let Some(v) = parse_value("RAG_CHUNK_SIZE", get("RAG_CHUNK_SIZE"))? {
            config.chunking.chunk_size = v;
        }
        if let Some(v) = parse_value("RAG_CHUNK_OVERLAP", get("RAG_CHUNK_OVERLAP"))? {
            config.chunking.overlap = v;
        }
        if let Some(v) = parse_value("RAG_DEFAULT_K", get("RAG_DEFAULT_K"))? {
            config.retrieval.default_k = v;
        }
        if let Some(model) = get("RAG_EMBED_MODEL") {
            config.embedding.model = model;
        }
        if let Some(v) = parse_value("RAG_EMBED_BATCH_SIZE", get("RAG_EMBED_BATCH_SIZE"))? {
            config.embedding.batch_size = v;
        }

        if let Some(url) = get("OPENAI_BASE_URL") {
            config.api.base_url = url.trim_end_matches('/').to_string();
        }
        config.api.api_key = get("OPENAI_API_KEY");
        if let Some(v) = parse_value("OPENAI_TIMEOUT_SECS", get("OPENAI_TIMEOUT_SECS"))? {
            config.api.timeout_secs = v;
        }
        if let Some(v) = parse_value("OPENAI_MAX_RETRIES", get("OPENAI_MAX_RETRIES"))? {
            config.api.max_retries = v;
        }

        if let Some(model) = get("AGENT_CHAT_MODEL") {
            config.agent.chat_model = model;
        }
        if let Some(v) = parse_value("AGENT_MAX_RETRIES", get("AGENT_MAX_RETRIES"))? {
            config.agent.max_retries = v;
        }
        if let Some(v) = parse_value("AGENT_MAX_TOOL_ROUNDS", get("AGENT_MAX_TOOL_ROUNDS"))? {
            config.agent.max_tool_rounds = v;
        }
        config.agent.user_name = get("AGENT_USER_NAME");
        config.agent.system_prompt = get("AGENT_SYSTEM_PROMPT");

        if let Some(level) = get("RAG_LOG_LEVEL") {
            config.log.level = level;
        }
        if let Some(dir) = get("RAG_LOG_DIR") {
            config.log.dir = PathBuf::from(dir);
        }

        Ok(config)
    }

    /// 설정 검증
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.chunking.validate()?;

        if !(MIN_K..=MAX_K).contains(&self.retrieval.default_k) {
            return Err(ConfigError::InvalidValue {
                key: "RAG_DEFAULT_K",
                message: format!(
                    "must be between {} and {} (got {})",
                    MIN_K, MAX_K, self.retrieval.default_k
                ),
            });
        }

        if self.embedding.batch_size == 0 {
            return Err(ConfigError::InvalidValue {
                key: "RAG_EMBED_BATCH_SIZE",
                message: "must be at least 1".to_string(),
            });
        }

        if self.api.max_retries > MAX_HTTP_RETRIES {
            return Err(ConfigError::InvalidValue {
                key: "OPENAI_MAX_RETRIES",
                message: format!(
                    "must be at most {} (got {})",
                    MAX_HTTP_RETRIES, self.api.max_retries
                ),
            });
        }

        if self.agent.max_retries == 0 {
            return Err(ConfigError::InvalidValue {
                key: "AGENT_MAX_RETRIES",
                message: "must be at least 1".to_string(),
            });
        }

        url::Url::parse(&self.api.base_url).map_err(|e| ConfigError::InvalidValue {
            key: "OPENAI_BASE_URL",
            message: e.to_string(),
        })?;

        Ok(())
    }

    /// 인덱스 폴더 경로
    pub fn index_dir(&self) -> PathBuf {
        self.index_dir
            .clone()
            .unwrap_or_else(|| self.data_dir.join(DEFAULT_INDEX_SUBDIR))
    }

    /// API 키 (없으면 설정 에러)
    pub fn require_api_key(&self) -> Result<&str, ConfigError> {
        self.api
            .api_key
            .as_deref()
            .ok_or(ConfigError::MissingApiKey)
    }
}

impl ApiConfig {
    /// 타임아웃이 적용된 HTTP 클라이언트 생성
    pub fn http_client(&self) -> Result<reqwest::Client, ConfigError> {
        reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(self.timeout_secs))
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))
    }

    /// `<base_url>/<path>`
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }
}

/// 환경변수 값을 숫자로 파싱
fn parse_value<T>(key: &'static str, raw: Option<String>) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.map(|v| {
        v.trim().parse::<T>().map_err(|e| ConfigError::InvalidValue {
            key,
            message: format!("{:?}: {}", v, e),
        })
    })
    .transpose()
}

// ============================================================================
// Tests
// ============================================================================
