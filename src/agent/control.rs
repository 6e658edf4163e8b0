//! 에이전트 제어 루프
//!
//! 상태: `AssistantTurn`(초기) ↔ `ToolTurn` → `Done`, 재시도 소진 시 실패
//!
//! - 도구 요청 → `ToolTurn`
//! - 비어 있지 않은 텍스트 → `Done`
//! - 빈 응답 / 전송 에러 → 재시도 카운터 증가, 예산 내이면 교정 메시지 추가 후 재호출
//!
//! 실패해도 대화 상태는 되돌리지 않습니다. 교정 메시지는 다음 턴에서도 보입니다.

use std::sync::Arc;

use crate::config::{AgentConfig, DEFAULT_MAX_RETRIES, DEFAULT_MAX_TOOL_ROUNDS};
use crate::error::{AgentError, ModelError};

use super::conversation::{Conversation, ToolCall, Turn};
use super::model::{ChatModel, ModelOutput};
use super::prompt::SystemPrompt;
use super::tools::ToolRegistry;

/// 빈 응답 후 교정 메시지
pub const EMPTY_OUTPUT_NUDGE: &str = "Respond with a real output.";

/// 도구 라운드 상한 도달 후 교정 메시지
pub const TOOL_LIMIT_NUDGE: &str =
    "No more tool calls are available for this question. Respond with a real output \
     using the information already retrieved.";

fn transport_nudge(error: &str) -> String {
    format!(
        "The previous attempt failed with an error: {}. Respond with a real output.",
        error
    )
}

#[derive(Debug)]
enum LoopState {
    AssistantTurn,
    ToolTurn(Vec<ToolCall>),
}

/// 에이전트 제어 루프
pub struct AgentLoop {
    model: Arc<dyn ChatModel>,
    tools: ToolRegistry,
    prompt: SystemPrompt,
    max_retries: u32,
    max_tool_rounds: usize,
}

impl AgentLoop {
    pub fn new(model: Arc<dyn ChatModel>, tools: ToolRegistry) -> Self {
        Self {
            model,
            tools,
            prompt: SystemPrompt::default(),
            max_retries: DEFAULT_MAX_RETRIES,
            max_tool_rounds: DEFAULT_MAX_TOOL_ROUNDS,
        }
    }

    /// 에이전트 설정 적용 (재시도 예산, 도구 라운드, 프롬프트)
    pub fn with_config(mut self, config: &AgentConfig) -> Self {
        self.max_retries = config.max_retries.max(1);
        self.max_tool_rounds = config.max_tool_rounds;
        self.prompt = SystemPrompt::new(config.system_prompt.clone(), config.user_name.clone());
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries.max(1);
        self
    }

    pub fn with_max_tool_rounds(mut self, rounds: usize) -> Self {
        self.max_tool_rounds = rounds;
        self
    }

    pub fn model_name(&self) -> &str {
        self.model.name()
    }

    /// 사용자 턴 하나 처리
    ///
    /// 호출 전에 사용자 메시지가 대화에 추가되어 있어야 합니다.
    pub async fn run_turn(&self, conversation: &mut Conversation) -> Result<String, AgentError> {
        let mut retries: u32 = 0;
        let mut tool_rounds: usize = 0;
        let mut state = LoopState::AssistantTurn;

        loop {
            state = match state {
                LoopState::AssistantTurn => {
                    let tools_open = tool_rounds < self.max_tool_rounds && !self.tools.is_empty();
                    let definitions = if tools_open {
                        self.tools.definitions()
                    } else {
                        vec![]
                    };

                    tracing::debug!(
                        "ASSISTANT_TURN (attempt {}, tool rounds {}/{})",
                        retries + 1,
                        tool_rounds,
                        self.max_tool_rounds
                    );

                    let system = self.prompt.render();
                    let outcome = match self
                        .model
                        .invoke(&system, conversation.turns(), &definitions)
                        .await
                    {
                        Ok(ModelOutput::ToolRequest(calls)) if tools_open => {
                            conversation.push(Turn::tool_request(calls.clone()));
                            Ok(LoopState::ToolTurn(calls))
                        }
                        Ok(ModelOutput::TextAnswer(text)) => {
                            tracing::debug!("DONE after {} retries", retries);
                            conversation.push(Turn::assistant(text.clone()));
                            return Ok(text);
                        }
                        Ok(ModelOutput::ToolRequest(_)) => Err((
                            "tool request after tool rounds were exhausted".to_string(),
                            TOOL_LIMIT_NUDGE.to_string(),
                        )),
                        Ok(ModelOutput::Empty) => Err((
                            "empty model output".to_string(),
                            EMPTY_OUTPUT_NUDGE.to_string(),
                        )),
                        // 해석할 수 없는 응답은 빈 응답과 같은 교정 메시지
                        Err(e @ ModelError::Decode(_)) => {
                            Err((e.to_string(), EMPTY_OUTPUT_NUDGE.to_string()))
                        }
                        Err(e) => {
                            let reason = e.to_string();
                            let nudge = transport_nudge(&reason);
                            Err((reason, nudge))
                        }
                    };

                    match outcome {
                        Ok(next) => next,
                        Err((reason, nudge)) => {
                            retries += 1;
                            if retries >= self.max_retries {
                                tracing::warn!(
                                    "Assistant failed after {} attempts: {}",
                                    retries,
                                    reason
                                );
                                return Err(AgentError::RetriesExhausted {
                                    attempts: retries,
                                    last_reason: reason,
                                });
                            }

                            tracing::warn!(
                                "Unusable assistant output ({}), retrying {}/{}",
                                reason,
                                retries,
                                self.max_retries
                            );
                            conversation.push(Turn::user(nudge));
                            LoopState::AssistantTurn
                        }
                    }
                }

                LoopState::ToolTurn(calls) => {
                    tool_rounds += 1;
                    tracing::debug!("TOOL_TURN {} ({} calls)", tool_rounds, calls.len());
                    for call in &calls {
                        let result = self.tools.execute(call).await;
                        conversation.push(Turn::tool_result(call.id.clone(), result));
                    }
                    LoopState::AssistantTurn
                }
            };
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
