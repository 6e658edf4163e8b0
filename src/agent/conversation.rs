//! 대화 상태
//!
//! 턴은 역할(enum)과 내용 필드를 가진 단일 레코드 타입입니다.
//! 대화는 추가만 가능하며 기존 턴은 수정되지 않습니다.

use serde::{Deserialize, Serialize};

/// 턴 역할
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// 시스템 프롬프트 (대화 상태에는 저장되지 않음)
    System,
    User,
    Assistant,
    Tool,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        }
    }
}

/// 모델이 요청한 도구 호출
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCall {
    /// 호출 ID (도구 결과 턴과 짝을 이룸)
    pub id: String,
    /// 도구 이름
    pub name: String,
    /// 인자 (JSON 객체가 아닐 수도 있음)
    pub arguments: serde_json::Value,
}

/// 대화 턴
#[derive(Debug, Clone, PartialEq)]
pub struct Turn {
    pub role: Role,
    pub content: String,
    /// 어시스턴트의 도구 호출 요청
    pub tool_calls: Vec<ToolCall>,
    /// 도구 결과 턴이 응답하는 호출 ID
    pub tool_call_id: Option<String>,
}

impl Turn {
    fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_calls: vec![],
            tool_call_id: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// 도구 호출을 요청하는 어시스턴트 턴
    pub fn tool_request(calls: Vec<ToolCall>) -> Self {
        Self {
            tool_calls: calls,
            ..Self::new(Role::Assistant, "")
        }
    }

    /// 도구 결과 턴
    pub fn tool_result(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            tool_call_id: Some(call_id.into()),
            ..Self::new(Role::Tool, content)
        }
    }
}

/// 대화 상태 (추가 전용)
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    turns: Vec<Turn>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, turn: Turn) {
        tracing::trace!("Appending {} turn", turn.role.as_str());
        self.turns.push(turn);
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversation_appends_in_order() {
        let mut conversation = Conversation::new();
        conversation.push(Turn::user("hi"));
        conversation.push(Turn::tool_request(vec![ToolCall {
            id: "call_1".into(),
            name: "search_documents".into(),
            arguments: serde_json::json!({ "query": "hi" }),
        }]));
        conversation.push(Turn::tool_result("call_1", "1. hello\n"));
        conversation.push(Turn::assistant("hello"));

        let roles: Vec<Role> = conversation.turns().iter().map(|t| t.role).collect();
        assert_eq!(
            roles,
            vec![Role::User, Role::Assistant, Role::Tool, Role::Assistant]
        );
        assert_eq!(conversation.turns()[2].tool_call_id.as_deref(), Some("call_1"));
        assert_eq!(conversation.last().map(|t| t.content.as_str()), Some("hello"));
    }
}
