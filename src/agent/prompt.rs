//! 시스템 프롬프트
//!
//! 호출마다 새로 렌더링됩니다. 현재 날짜와 사용자 이름이 포함됩니다.

use chrono::NaiveDateTime;

/// 기본 지시문
pub const DEFAULT_INSTRUCTION: &str = "You are a helpful assistant that answers questions \
using a local document collection. For factual questions, call the search_documents tool \
first and base your answer on the fragments it returns. If the fragments do not contain \
the answer, say so plainly instead of guessing.";

/// 시스템 프롬프트 빌더
#[derive(Debug, Clone)]
pub struct SystemPrompt {
    instruction: String,
    user_name: Option<String>,
}

impl Default for SystemPrompt {
    fn default() -> Self {
        Self {
            instruction: DEFAULT_INSTRUCTION.to_string(),
            user_name: None,
        }
    }
}

impl SystemPrompt {
    pub fn new(instruction: Option<String>, user_name: Option<String>) -> Self {
        Self {
            instruction: instruction.unwrap_or_else(|| DEFAULT_INSTRUCTION.to_string()),
            user_name,
        }
    }

    /// 현재 로컬 시각으로 렌더링
    pub fn render(&self) -> String {
        self.render_at(chrono::Local::now().naive_local())
    }

    pub fn render_at(&self, now: NaiveDateTime) -> String {
        let mut prompt = format!(
            "{}\n\nToday is {}.",
            self.instruction,
            now.format("%A, %d %B %Y, %H:%M")
        );
        if let Some(name) = &self.user_name {
            prompt.push_str(&format!("\nThe user's name is {}.", name));
        }
        prompt
    }
}
