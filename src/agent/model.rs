//! 언어 모델 호출 인터페이스
//!
//! 응답은 역직렬화 경계에서 한 번만 [`ModelOutput`]으로 분류됩니다.
//! 제어 루프는 분류된 값만 봅니다.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::config::{AgentConfig, ApiConfig};
use crate::error::{ConfigError, ModelError};

use super::conversation::{Role, ToolCall, Turn};
use super::tools::ToolDefinition;

// ============================================================================
// Model Output
// ============================================================================

/// 분류된 모델 출력
#[derive(Debug, Clone, PartialEq)]
pub enum ModelOutput {
    /// 도구 호출 요청
    ToolRequest(Vec<ToolCall>),
    /// 비어 있지 않은 텍스트 답변
    TextAnswer(String),
    /// 도구 호출도 쓸 만한 내용도 없음
    Empty,
}

// ============================================================================
// ChatModel Trait
// ============================================================================

/// 채팅 모델 트레이트
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// 시스템 프롬프트 + 전체 대화 + 선언된 도구로 모델 호출
    async fn invoke(
        &self,
        system_prompt: &str,
        conversation: &[Turn],
        tools: &[ToolDefinition],
    ) -> Result<ModelOutput, ModelError>;

    fn name(&self) -> &str;
}

// ============================================================================
// OpenAI-compatible Chat Model
// ============================================================================

/// OpenAI 호환 `/chat/completions` 구현체
#[derive(Debug)]
pub struct OpenAiChatModel {
    client: reqwest::Client,
    url: String,
    api_key: String,
    model: String,
    call_seq: AtomicUsize,
}

impl OpenAiChatModel {
    pub fn new(api: &ApiConfig, agent: &AgentConfig) -> Result<Self, ConfigError> {
        let api_key = api.api_key.clone().ok_or(ConfigError::MissingApiKey)?;
        Ok(Self {
            client: api.http_client()?,
            url: api.endpoint("chat/completions"),
            api_key,
            model: agent.chat_model.clone(),
            call_seq: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl ChatModel for OpenAiChatModel {
    async fn invoke(
        &self,
        system_prompt: &str,
        conversation: &[Turn],
        tools: &[ToolDefinition],
    ) -> Result<ModelOutput, ModelError> {
        let mut messages = Vec::with_capacity(conversation.len() + 1);
        messages.push(json!({ "role": Role::System.as_str(), "content": system_prompt }));
        messages.extend(conversation.iter().map(turn_to_message));

        let request = ChatRequest {
            model: &self.model,
            messages,
            tools: tools.iter().map(tool_to_schema).collect(),
        };

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| ModelError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ModelError::Transport(e.to_string()))?;

        if !status.is_success() {
            return Err(ModelError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let seq = self.call_seq.fetch_add(1, Ordering::Relaxed);
        classify_response(&body, seq)
    }

    fn name(&self) -> &str {
        &self.model
    }
}

// ----------------------------------------------------------------------------
// Request
// ----------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Value>,
}

fn turn_to_message(turn: &Turn) -> Value {
    match turn.role {
        Role::Assistant if !turn.tool_calls.is_empty() => {
            let calls: Vec<Value> = turn
                .tool_calls
                .iter()
                .map(|call| {
                    json!({
                        "id": call.id,
                        "type": "function",
                        "function": {
                            "name": call.name,
                            "arguments": call.arguments.to_string(),
                        }
                    })
                })
                .collect();
            let content = if turn.content.is_empty() {
                Value::Null
            } else {
                Value::String(turn.content.clone())
            };
            json!({ "role": "assistant", "content": content, "tool_calls": calls })
        }
        Role::Tool => json!({
            "role": "tool",
            "tool_call_id": turn.tool_call_id.as_deref().unwrap_or_default(),
            "content": turn.content,
        }),
        role => json!({ "role": role.as_str(), "content": turn.content }),
    }
}

fn tool_to_schema(tool: &ToolDefinition) -> Value {
    json!({
        "type": "function",
        "function": {
            "name": tool.name,
            "description": tool.description,
            "parameters": tool.parameters,
        }
    })
}

// ----------------------------------------------------------------------------
// Response
// ----------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<MessageContent>,
    #[serde(default)]
    tool_calls: Option<Vec<ResponseToolCall>>,
}

/// 문자열 또는 `{text}` 조각 배열
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Deserialize)]
struct ContentPart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseToolCall {
    #[serde(default)]
    id: Option<String>,
    function: ResponseFunction,
}

#[derive(Debug, Deserialize)]
struct ResponseFunction {
    name: String,
    #[serde(default)]
    arguments: String,
}

/// 응답 본문을 [`ModelOutput`]으로 분류
fn classify_response(body: &str, seq: usize) -> Result<ModelOutput, ModelError> {
    let response: ChatResponse =
        serde_json::from_str(body).map_err(|e| ModelError::Decode(e.to_string()))?;

    let Some(choice) = response.choices.into_iter().next() else {
        return Ok(ModelOutput::Empty);
    };
    let message = choice.message;

    if let Some(calls) = message.tool_calls.filter(|c| !c.is_empty()) {
        let calls = calls
            .into_iter()
            .enumerate()
            .map(|(i, call)| ToolCall {
                id: call
                    .id
                    .unwrap_or_else(|| format!("call_{}_{}", seq, i)),
                name: call.function.name,
                arguments: parse_arguments(call.function.arguments),
            })
            .collect();
        return Ok(ModelOutput::ToolRequest(calls));
    }

    Ok(classify_content(message.content))
}

fn classify_content(content: Option<MessageContent>) -> ModelOutput {
    let text = match content {
        None => return ModelOutput::Empty,
        Some(MessageContent::Text(text)) => text,
        Some(MessageContent::Parts(parts)) => {
            // 첫 조각에 텍스트가 없으면 빈 응답
            match parts.first().and_then(|p| p.text.as_deref()) {
                Some(first) if !first.trim().is_empty() => {}
                _ => return ModelOutput::Empty,
            }
            parts.into_iter().filter_map(|p| p.text).collect::<String>()
        }
    };

    if text.trim().is_empty() {
        ModelOutput::Empty
    } else {
        ModelOutput::TextAnswer(text)
    }
}

/// 인자 문자열 파싱. 파싱 불가하면 원문 문자열 그대로 (도구 어댑터에서 거부)
fn parse_arguments(raw: String) -> Value {
    if raw.trim().is_empty() {
        return json!({});
    }
    serde_json::from_str(&raw).unwrap_or(Value::String(raw))
}

// ============================================================================
// Test Support
// ============================================================================

/// 미리 정해진 출력을 순서대로 돌려주는 모델
#[cfg(test)]
pub(crate) mod fake {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use super::*;

    #[derive(Debug, Default)]
    pub(crate) struct ScriptedModel {
        script: Mutex<VecDeque<Result<ModelOutput, ModelError>>>,
        pub calls: AtomicUsize,
        /// 호출마다 선언된 도구 수
        pub tools_seen: Mutex<Vec<usize>>,
        /// 호출마다 전달된 대화 길이
        pub conversation_lens: Mutex<Vec<usize>>,
    }

    impl ScriptedModel {
        pub(crate) fn new(script: Vec<Result<ModelOutput, ModelError>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                ..Default::default()
            }
        }

        pub(crate) fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ChatModel for ScriptedModel {
        async fn invoke(
            &self,
            _system_prompt: &str,
            conversation: &[Turn],
            tools: &[ToolDefinition],
        ) -> Result<ModelOutput, ModelError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.tools_seen.lock().unwrap().push(tools.len());
            self.conversation_lens.lock().unwrap().push(conversation.len());
            // 스크립트가 끝나면 빈 응답
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Ok(ModelOutput::Empty))
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn classify(body: Value) -> ModelOutput {
        classify_response(&body.to_string(), 0).unwrap()
    }

    fn message(message: Value) -> Value {
        json!({ "choices": [{ "index": 0, "message": message }] })
    }

    #[test]
    fn test_classify_text_answer() {
        assert_eq!(
            classify(message(json!({ "role": "assistant", "content": "Fredville." }))),
            ModelOutput::TextAnswer("Fredville.".into())
        );
    }

    #[test]
    fn test_classify_empty_shapes() {
        let empties = [
            json!({ "choices": [] }),
            message(json!({ "role": "assistant", "content": null })),
            message(json!({ "role": "assistant", "content": "" })),
            message(json!({ "role": "assistant", "content": "  \n" })),
            message(json!({ "role": "assistant", "content": [] })),
            message(json!({ "role": "assistant", "content": [{ "type": "image" }, { "text": "late" }] })),
            message(json!({ "role": "assistant", "tool_calls": [] })),
        ];
        for body in empties {
            assert_eq!(classify(body.clone()), ModelOutput::Empty, "{body}");
        }
    }

    #[test]
    fn test_classify_content_parts() {
        let body = message(json!({
            "role": "assistant",
            "content": [{ "type": "text", "text": "Hello " }, { "type": "text", "text": "there" }]
        }));
        assert_eq!(classify(body), ModelOutput::TextAnswer("Hello there".into()));
    }

    #[test]
    fn test_classify_tool_request() {
        let body = message(json!({
            "role": "assistant",
            "content": null,
            "tool_calls": [{
                "id": "call_abc",
                "type": "function",
                "function": { "name": "search_documents", "arguments": "{\"query\":\"capital\",\"k\":2}" }
            }, {
                "type": "function",
                "function": { "name": "search_documents", "arguments": "{not json" }
            }]
        }));

        let ModelOutput::ToolRequest(calls) = classify(body) else {
            panic!("expected a tool request");
        };
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].id, "call_abc");
        assert_eq!(calls[0].arguments, json!({ "query": "capital", "k": 2 }));
        assert_eq!(calls[1].id, "call_0_1");
        assert_eq!(calls[1].arguments, Value::String("{not json".into()));
    }

    #[test]
    fn test_malformed_body_is_decode_error() {
        assert!(matches!(
            classify_response("<html>", 0),
            Err(ModelError::Decode(_))
        ));
    }

    #[test]
    fn test_turn_serialization() {
        let request = Turn::tool_request(vec![ToolCall {
            id: "call_1".into(),
            name: "search_documents".into(),
            arguments: json!({ "query": "q" }),
        }]);
        let value = turn_to_message(&request);
        assert_eq!(value["content"], Value::Null);
        assert_eq!(value["tool_calls"][0]["function"]["arguments"], "{\"query\":\"q\"}");

        let result = turn_to_message(&Turn::tool_result("call_1", "1. text\n"));
        assert_eq!(result["role"], "tool");
        assert_eq!(result["tool_call_id"], "call_1");
    }

    fn model(server: &MockServer) -> OpenAiChatModel {
        let api = ApiConfig {
            base_url: server.uri(),
            api_key: Some("test-key".into()),
            timeout_secs: 5,
            max_retries: 0,
        };
        let agent = AgentConfig {
            chat_model: "test-chat".into(),
            max_retries: 3,
            max_tool_rounds: 5,
            user_name: None,
            system_prompt: None,
        };
        OpenAiChatModel::new(&api, &agent).unwrap()
    }

    #[tokio::test]
    async fn test_invoke_sends_system_prompt_and_tools() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer test-key"))
            .and(body_partial_json(json!({
                "model": "test-chat",
                "messages": [
                    { "role": "system", "content": "be brief" },
                    { "role": "user", "content": "hi" }
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(message(json!({
                "role": "assistant", "content": "hello"
            }))))
            .expect(1)
            .mount(&server)
            .await;

        let tools = vec![ToolDefinition {
            name: "search_documents".into(),
            description: "search".into(),
            parameters: json!({ "type": "object" }),
        }];
        let output = model(&server)
            .invoke("be brief", &[Turn::user("hi")], &tools)
            .await
            .unwrap();
        assert_eq!(output, ModelOutput::TextAnswer("hello".into()));

        let requests = server.received_requests().await.unwrap();
        let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
        assert_eq!(body["tools"][0]["function"]["name"], "search_documents");
    }

    #[tokio::test]
    async fn test_invoke_without_tools_omits_field() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(message(json!({
                "role": "assistant", "content": "ok"
            }))))
            .mount(&server)
            .await;

        model(&server).invoke("s", &[Turn::user("hi")], &[]).await.unwrap();

        let requests = server.received_requests().await.unwrap();
        let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
        assert!(body.get("tools").is_none());
    }

    #[tokio::test]
    async fn test_http_error_is_model_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
            .mount(&server)
            .await;

        let err = model(&server)
            .invoke("s", &[Turn::user("hi")], &[])
            .await
            .unwrap_err();
        assert!(matches!(err, ModelError::Api { status: 502, .. }));
    }
}
