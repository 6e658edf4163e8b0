//! Agent 모듈 - 도구 호출 제어 루프
//!
//! - Conversation: 역할 태그가 붙은 턴의 추가 전용 목록
//! - Model: 채팅 모델 호출과 출력 분류
//! - Tools: 검색 엔진 도구 어댑터
//! - Control: 재시도 예산이 있는 상태 기계
//! - Session: 사용자 턴 단위 처리

mod control;
mod conversation;
mod model;
mod prompt;
mod session;
mod tools;

// Re-exports
pub use control::{AgentLoop, EMPTY_OUTPUT_NUDGE, TOOL_LIMIT_NUDGE};
pub use conversation::{Conversation, Role, ToolCall, Turn};
pub use model::{ChatModel, ModelOutput, OpenAiChatModel};
pub use prompt::{SystemPrompt, DEFAULT_INSTRUCTION};
pub use session::{ChatSession, APOLOGY};
pub use tools::{RetrievalTool, Tool, ToolDefinition, ToolRegistry, RETRIEVAL_TOOL_NAME};
