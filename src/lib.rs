//! rag-agent - 로컬 문서 RAG 에이전트
//!
//! 문서 폴더를 청킹/임베딩해 Flat L2 벡터 인덱스로 만들고,
//! 도구 호출 루프를 가진 채팅 에이전트가 그 인덱스를 검색합니다.
//!
//! - collector / extractor: 문서 수집과 텍스트 추출 (txt, pdf, docx)
//! - knowledge: 청킹, 인덱스 구축/영속화, 검색 엔진
//! - embedding: OpenAI 호환 임베딩 클라이언트
//! - agent: 제어 루프, 도구, 채팅 세션

pub mod agent;
pub mod cli;
pub mod collector;
pub mod config;
pub mod embedding;
pub mod error;
pub mod extractor;
pub mod knowledge;

// Re-exports
pub use agent::{
    AgentLoop, ChatModel, ChatSession, Conversation, ModelOutput, OpenAiChatModel, RetrievalTool,
    Role, Tool, ToolCall, ToolDefinition, ToolRegistry, Turn, APOLOGY,
};
pub use config::Config;
pub use embedding::{create_embedder, EmbeddingProvider, OpenAiEmbedding};
pub use error::{
    AgentError, ConfigError, EmbeddingError, EngineError, ExtractError, IndexError, IngestError,
    ModelError, QueryError,
};
pub use knowledge::{
    ingest_directory, ChunkConfig, Chunker, EngineOptions, EngineRegistry, FlatL2Index,
    IndexOrigin, IndexPaths, IndexedChunk, IngestReport, RetrievalEngine, SearchResult,
    WindowChunker,
};
