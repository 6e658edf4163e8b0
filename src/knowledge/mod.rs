//! Knowledge 모듈 - 로컬 문서 검색 엔진
//!
//! - Chunker: 고정 크기 슬라이딩 윈도우 분할
//! - Vector: 정확한 L2 최근접 이웃 인덱스 + 디스크 아티팩트
//! - Ingest: 탐색 → 추출 → 청킹 → 임베딩 파이프라인
//! - Engine: 로드-또는-구축 초기화와 질의

mod chunker;
mod engine;
mod ingest;
mod vector;

// Re-exports
pub use chunker::{
    Chunk, ChunkConfig, Chunker, WindowChunker, DEFAULT_CHUNK_SIZE, DEFAULT_OVERLAP,
    MIN_CHUNK_SIZE,
};
pub use engine::{EngineOptions, EngineRegistry, IndexOrigin, RetrievalEngine};
pub use ingest::{ingest_directory, IngestReport};
pub use vector::{
    squared_l2, FlatL2Index, IndexPaths, IndexedChunk, SearchResult, INDEX_FILE_NAME,
    META_FILE_NAME,
};
