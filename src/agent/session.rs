//! 채팅 세션
//!
//! 세션 하나가 대화 상태를 소유하고 사용자 턴을 하나씩 처리합니다.

use uuid::Uuid;

use crate::error::AgentError;

use super::control::AgentLoop;
use super::conversation::{Conversation, Turn};

/// 턴 실패 시 사용자에게 보여줄 메시지
pub const APOLOGY: &str =
    "Sorry, I could not produce an answer this time. Please try again or rephrase the question.";

/// 단일 사용자 채팅 세션
pub struct ChatSession {
    id: String,
    conversation: Conversation,
    agent: AgentLoop,
}

impl ChatSession {
    pub fn new(agent: AgentLoop) -> Self {
        let id = format!("session_{}", &Uuid::new_v4().simple().to_string()[..8]);
        tracing::info!("Started chat session {} with {}", id, agent.model_name());
        Self {
            id,
            conversation: Conversation::new(),
            agent,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    /// 사용자 메시지 하나 처리
    ///
    /// 실패해도 세션은 계속 사용할 수 있습니다.
    pub async fn send(&mut self, message: &str) -> Result<String, AgentError> {
        self.conversation.push(Turn::user(message));
        let result = self.agent.run_turn(&mut self.conversation).await;
        if let Err(e) = &result {
            tracing::error!("[{}] Turn failed: {}", self.id, e);
        }
        result
    }
}
