//! Retrieval Engine - 인덱스 로드/구축 + 질의
//!
//! 엔진은 프로세스의 조립 지점(main/CLI)에서 명시적으로 생성되어 주입됩니다.
//! [`EngineRegistry`]는 문서 루트별 get-or-create 가드입니다.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::OnceCell;

use crate::config::{Config, MAX_K, MIN_K};
use crate::embedding::EmbeddingProvider;
use crate::error::{ConfigError, EngineError, IndexError, QueryError};

use super::chunker::{ChunkConfig, WindowChunker};
use super::ingest::{ingest_directory, IngestReport};
use super::vector::{FlatL2Index, IndexPaths, SearchResult};

// ============================================================================
// Options
// ============================================================================

/// 엔진 초기화 옵션
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// 문서 루트
    pub root: PathBuf,
    /// 인덱스 폴더
    pub index_dir: PathBuf,
    pub chunking: ChunkConfig,
    /// 기존 아티팩트가 있어도 재구축
    pub force_rebuild: bool,
}

impl EngineOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            root: config.data_dir.clone(),
            index_dir: config.index_dir(),
            chunking: config.chunking.clone(),
            force_rebuild: false,
        }
    }

    pub fn force_rebuild(mut self, force: bool) -> Self {
        self.force_rebuild = force;
        self
    }
}

/// 인덱스를 어떻게 얻었는지
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexOrigin {
    /// 디스크 아티팩트에서 로드
    Loaded,
    /// 문서에서 새로 구축
    Built(IngestReport),
}

// ============================================================================
// RetrievalEngine
// ============================================================================

/// 검색 엔진
///
/// 초기화 이후 인덱스는 읽기 전용입니다.
pub struct RetrievalEngine {
    root: PathBuf,
    paths: IndexPaths,
    index: FlatL2Index,
    origin: IndexOrigin,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl std::fmt::Debug for RetrievalEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetrievalEngine")
            .field("root", &self.root)
            .field("paths", &self.paths)
            .field("rows", &self.index.len())
            .field("dimension", &self.index.dimension())
            .field("origin", &self.origin)
            .field("embedder", &self.embedder.name())
            .finish()
    }
}

impl RetrievalEngine {
    /// 로드 시도 후, 아티팩트가 없으면 전체 구축 + 저장
    pub async fn initialize(
        options: EngineOptions,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Result<Self, EngineError> {
        let chunker = WindowChunker::new(options.chunking.clone())?;
        if !options.root.is_dir() {
            return Err(ConfigError::MissingRoot(options.root.clone()).into());
        }

        let paths = IndexPaths::in_dir(&options.index_dir);

        let loaded = if options.force_rebuild {
            tracing::info!("Forced rebuild requested for {:?}", options.root);
            None
        } else {
            match FlatL2Index::load(&paths) {
                Ok(index) => Some(index),
                Err(IndexError::NotFound { .. }) => {
                    tracing::info!("No index in {:?}, building a new one", options.index_dir);
                    None
                }
                Err(e) => return Err(e.into()),
            }
        };

        let (index, origin) = match loaded {
            Some(index) => (index, IndexOrigin::Loaded),
            None => {
                let (index, report) =
                    ingest_directory(&options.root, &options.index_dir, &chunker, embedder.as_ref())
                        .await?;
                index.persist(&paths)?;
                (index, IndexOrigin::Built(report))
            }
        };

        tracing::info!(
            "Retrieval engine ready: {} chunks, {} dimensions",
            index.len(),
            index.dimension()
        );

        Ok(Self {
            root: options.root,
            paths,
            index,
            origin,
            embedder,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn paths(&self) -> &IndexPaths {
        &self.paths
    }

    pub fn index(&self) -> &FlatL2Index {
        &self.index
    }

    pub fn origin(&self) -> &IndexOrigin {
        &self.origin
    }

    /// 질의 (구조화된 결과)
    pub async fn try_query(
        &self,
        question: &str,
        k: usize,
    ) -> Result<Vec<SearchResult>, QueryError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(QueryError::EmptyQuestion);
        }
        if !(MIN_K..=MAX_K).contains(&k) {
            return Err(QueryError::InvalidK {
                got: k,
                min: MIN_K,
                max: MAX_K,
            });
        }

        let query_vector = self.embedder.embed(question).await?;
        Ok(self.index.search(&query_vector, k)?)
    }

    /// 질의 (도구 결과용 문자열)
    ///
    /// 실패하지 않습니다. 모든 에러는 설명 문자열로 변환됩니다.
    pub async fn query(&self, question: &str, k: usize) -> String {
        match self.try_query(question, k).await {
            Ok(results) if results.is_empty() => {
                "No relevant documents were found for your question.".to_string()
            }
            Ok(results) => format_results(&results),
            Err(e @ (QueryError::EmptyQuestion | QueryError::InvalidK { .. })) => {
                tracing::debug!("Rejected query: {}", e);
                format!("Invalid query: {}.", e)
            }
            Err(e) => {
                tracing::error!("Retrieval query failed: {}", e);
                format!("Internal query error: {}", e)
            }
        }
    }
}

/// `1. <text>\n2. <text>\n...`
fn format_results(results: &[SearchResult]) -> String {
    results
        .iter()
        .enumerate()
        .map(|(i, r)| format!("{}. {}\n", i + 1, r.chunk.text))
        .collect()
}

// ============================================================================
// EngineRegistry
// ============================================================================

/// 문서 루트당 한 번만 초기화되는 엔진 보관소
///
/// 첫 호출의 루트가 고정됩니다. 다른 루트로 다시 요청하면 에러입니다.
#[derive(Debug, Default)]
pub struct EngineRegistry {
    engine: OnceCell<Arc<RetrievalEngine>>,
}

impl EngineRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 초기화된 엔진 반환, 없으면 초기화
    pub async fn get_or_init(
        &self,
        options: EngineOptions,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Result<Arc<RetrievalEngine>, EngineError> {
        let requested = options.root.clone();
        let engine = self
            .engine
            .get_or_try_init(|| async move {
                RetrievalEngine::initialize(options, embedder)
                    .await
                    .map(Arc::new)
            })
            .await?;

        if !same_path(engine.root(), &requested) {
            return Err(EngineError::RootMismatch {
                existing: engine.root().to_path_buf(),
                requested,
            });
        }

        Ok(Arc::clone(engine))
    }

    /// 이미 초기화된 엔진
    pub fn get(&self) -> Option<Arc<RetrievalEngine>> {
        self.engine.get().cloned()
    }
}

fn same_path(a: &Path, b: &Path) -> bool {
    match (std::fs::canonicalize(a), std::fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::*;
    use crate::embedding::fake::LetterEmbedder;
    use crate::error::IngestError;

    fn options(root: &Path) -> EngineOptions {
        EngineOptions {
            root: root.to_path_buf(),
            index_dir: root.join("index"),
            chunking: ChunkConfig {
                chunk_size: 100,
                overlap: 25,
            },
            force_rebuild: false,
        }
    }

    fn corpus() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("geo.txt"),
            "The capital of Freedonia is Fredville.",
        )
        .unwrap();
        std::fs::write(dir.path().join("zoo.txt"), "Zebras queue quietly by the zoo.")
            .unwrap();
        dir
    }

    #[tokio::test]
    async fn test_builds_then_loads() {
        let dir = corpus();
        let embedder = Arc::new(LetterEmbedder::default());

        let first = RetrievalEngine::initialize(options(dir.path()), embedder.clone())
            .await
            .unwrap();
        assert!(matches!(first.origin(), IndexOrigin::Built(_)));
        assert!(first.paths().exist());
        assert_eq!(first.index().len(), 2);

        let second = RetrievalEngine::initialize(options(dir.path()), embedder.clone())
            .await
            .unwrap();
        assert_eq!(second.origin(), &IndexOrigin::Loaded);
        assert_eq!(second.index().len(), 2);
        // 로드 시에는 문서 임베딩 없음
        assert_eq!(embedder.batch_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_index_folder_not_ingested() {
        let dir = corpus();
        let embedder = Arc::new(LetterEmbedder::default());

        RetrievalEngine::initialize(options(dir.path()), embedder.clone())
            .await
            .unwrap();
        let rebuilt = RetrievalEngine::initialize(
            options(dir.path()).force_rebuild(true),
            embedder.clone(),
        )
        .await
        .unwrap();

        // 메타데이터 사이드카(.txt)가 문서로 수집되지 않음
        assert_eq!(rebuilt.index().len(), 2);
    }

    #[tokio::test]
    async fn test_query_formats_numbered_list() {
        let dir = corpus();
        let engine = RetrievalEngine::initialize(
            options(dir.path()),
            Arc::new(LetterEmbedder::default()),
        )
        .await
        .unwrap();

        let answer = engine.query("capital of Freedonia", 2).await;
        assert!(answer.starts_with("1. The capital of Freedonia is Fredville.\n"));
        assert!(answer.contains("\n2. "));
        assert!(answer.ends_with('\n'));
    }

    #[tokio::test]
    async fn test_query_validation_returns_text() {
        let dir = corpus();
        let engine = RetrievalEngine::initialize(
            options(dir.path()),
            Arc::new(LetterEmbedder::default()),
        )
        .await
        .unwrap();

        for (question, k) in [("", 3), ("   ", 3), ("x", 0), ("x", 11)] {
            let answer = engine.query(question, k).await;
            assert!(answer.starts_with("Invalid query:"), "{question:?} k={k}: {answer}");
        }
        assert!(matches!(
            engine.try_query("x", 11).await,
            Err(QueryError::InvalidK { got: 11, .. })
        ));
    }

    #[tokio::test]
    async fn test_query_embedding_failure_is_text() {
        let dir = corpus();
        let embedder = Arc::new(LetterEmbedder::default());
        let engine = RetrievalEngine::initialize(options(dir.path()), embedder.clone())
            .await
            .unwrap();

        embedder.fail.store(true, Ordering::SeqCst);
        let answer = engine.query("anything", 3).await;
        assert!(answer.starts_with("Internal query error:"));
    }

    #[tokio::test]
    async fn test_embedding_failure_writes_no_index() {
        let dir = corpus();
        let result =
            RetrievalEngine::initialize(options(dir.path()), Arc::new(LetterEmbedder::failing()))
                .await;

        assert!(matches!(
            result,
            Err(EngineError::Ingest(IngestError::Embedding(_)))
        ));
        let paths = IndexPaths::in_dir(&dir.path().join("index"));
        assert!(!paths.index_path.exists());
        assert!(!paths.meta_path.exists());
    }

    #[tokio::test]
    async fn test_corrupt_index_is_not_rebuilt() {
        let dir = corpus();
        let paths = IndexPaths::in_dir(&dir.path().join("index"));
        std::fs::create_dir_all(dir.path().join("index")).unwrap();
        std::fs::write(&paths.index_path, b"garbage").unwrap();
        std::fs::write(&paths.meta_path, "geo.txt|x\n").unwrap();

        let result =
            RetrievalEngine::initialize(options(dir.path()), Arc::new(LetterEmbedder::default()))
                .await;
        assert!(matches!(
            result,
            Err(EngineError::Index(IndexError::Corrupt(_)))
        ));
    }

    #[tokio::test]
    async fn test_invalid_chunking_is_config_error() {
        let dir = corpus();
        let mut opts = options(dir.path());
        opts.chunking.chunk_size = 10;

        let embedder = Arc::new(LetterEmbedder::default());
        let result = RetrievalEngine::initialize(opts, embedder.clone()).await;
        assert!(matches!(
            result,
            Err(EngineError::Config(ConfigError::ChunkSizeTooSmall { .. }))
        ));
        assert_eq!(embedder.batch_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_registry_is_idempotent() {
        let dir = corpus();
        let embedder = Arc::new(LetterEmbedder::default());
        let registry = EngineRegistry::new();

        let a = registry
            .get_or_init(options(dir.path()), embedder.clone())
            .await
            .unwrap();
        let b = registry
            .get_or_init(options(dir.path()), embedder.clone())
            .await
            .unwrap();

        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(embedder.batch_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_registry_rejects_second_root() {
        let dir = corpus();
        let other = corpus();
        let embedder = Arc::new(LetterEmbedder::default());
        let registry = EngineRegistry::new();

        registry
            .get_or_init(options(dir.path()), embedder.clone())
            .await
            .unwrap();
        let result = registry.get_or_init(options(other.path()), embedder).await;
        assert!(matches!(result, Err(EngineError::RootMismatch { .. })));
    }
}
