//! 도구 어댑터
//!
//! 도구 실행은 실패하지 않습니다. 모든 문제는 결과 문자열로 모델에게 전달됩니다.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};

use crate::config::{MAX_K, MIN_K};
use crate::knowledge::RetrievalEngine;

use super::conversation::ToolCall;

// ============================================================================
// Tool Trait
// ============================================================================

/// 모델에게 공개되는 도구 정의
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON Schema
    pub parameters: Value,
}

impl ToolDefinition {
    /// 스키마의 `required` 목록
    fn required(&self) -> Vec<&str> {
        self.parameters["required"]
            .as_array()
            .map(|fields| fields.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }
}

/// 도구 트레이트
#[async_trait]
pub trait Tool: Send + Sync {
    fn definition(&self) -> ToolDefinition;

    /// 별칭 등 인자 정규화 (검증 전에 적용)
    fn normalize_args(&self, args: Value) -> Value {
        args
    }

    /// 검증된 인자로 실행
    async fn call(&self, args: &Value) -> String;
}

// ============================================================================
// ToolRegistry
// ============================================================================

/// 도구 목록
#[derive(Default, Clone)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, tool: Arc<dyn Tool>) -> Self {
        self.tools.push(tool);
        self
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|t| t.definition()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    fn find(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.iter().find(|t| t.definition().name == name)
    }

    /// 도구 호출 실행
    pub async fn execute(&self, call: &ToolCall) -> String {
        let Some(tool) = self.find(&call.name) else {
            tracing::warn!("Model requested unknown tool {:?}", call.name);
            return format!("Tool not found: {}", call.name);
        };

        let args = tool.normalize_args(call.arguments.clone());
        if let Err(message) = validate_args(&tool.definition(), &args) {
            tracing::warn!("Rejected {} arguments: {}", call.name, message);
            return format!("Invalid arguments for {}: {}", call.name, message);
        }

        tracing::debug!("Calling tool {} with {}", call.name, args);
        tool.call(&args).await
    }
}

/// 인자가 객체이고 필수 필드를 모두 가졌는지
fn validate_args(definition: &ToolDefinition, args: &Value) -> Result<(), String> {
    let Some(object) = args.as_object() else {
        return Err(format!("expected a JSON object, got {}", args));
    };
    for field in definition.required() {
        match object.get(field) {
            None | Some(Value::Null) => {
                return Err(format!("missing required argument '{}'", field));
            }
            _ => {}
        }
    }
    Ok(())
}

// ============================================================================
// RetrievalTool
// ============================================================================

/// 검색 도구 이름
pub const RETRIEVAL_TOOL_NAME: &str = "search_documents";

/// 검색 엔진을 감싸는 도구 (`{query, k}`)
pub struct RetrievalTool {
    engine: Arc<RetrievalEngine>,
    default_k: usize,
}

impl RetrievalTool {
    pub fn new(engine: Arc<RetrievalEngine>, default_k: usize) -> Self {
        Self { engine, default_k }
    }

    /// k 해석: 없으면 기본값, 음수는 0 (엔진에서 거부됨)
    fn resolve_k(&self, value: Option<&Value>) -> Result<usize, String> {
        match value {
            None | Some(Value::Null) => Ok(self.default_k),
            Some(Value::Number(n)) => {
                if let Some(k) = n.as_u64() {
                    Ok(usize::try_from(k).unwrap_or(usize::MAX))
                } else if n.as_i64().is_some() {
                    Ok(0)
                } else {
                    match n.as_f64() {
                        Some(f) if f.fract() == 0.0 && f >= 0.0 => Ok(f as usize),
                        Some(f) if f.fract() == 0.0 => Ok(0),
                        _ => Err(format!("k must be an integer, got {}", n)),
                    }
                }
            }
            Some(Value::String(s)) => s
                .trim()
                .parse::<i64>()
                .map(|k| usize::try_from(k).unwrap_or(0))
                .map_err(|_| format!("k must be an integer, got {:?}", s)),
            Some(other) => Err(format!("k must be an integer, got {}", other)),
        }
    }
}

#[async_trait]
impl Tool for RetrievalTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: RETRIEVAL_TOOL_NAME.to_string(),
            description: "Search the local document collection (PDF, DOCX, TXT) and return \
                          the most relevant text fragments as a numbered list."
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "Text to search for in the vectorized document index"
                    },
                    "k": {
                        "type": "integer",
                        "minimum": MIN_K,
                        "maximum": MAX_K,
                        "default": self.default_k,
                        "description": "Number of fragments to retrieve"
                    }
                },
                "required": ["query"]
            }),
        }
    }

    fn normalize_args(&self, mut args: Value) -> Value {
        if let Some(object) = args.as_object_mut() {
            if !object.contains_key("query") {
                if let Some(input) = object.remove("input") {
                    object.insert("query".to_string(), input);
                }
            }
        }
        args
    }

    async fn call(&self, args: &Value) -> String {
        let Some(query) = args["query"].as_str() else {
            return format!(
                "Invalid arguments for {}: query must be a string",
                RETRIEVAL_TOOL_NAME
            );
        };
        let k = match self.resolve_k(args.get("k")) {
            Ok(k) => k,
            Err(message) => {
                return format!("Invalid arguments for {}: {}", RETRIEVAL_TOOL_NAME, message)
            }
        };
        self.engine.query(query, k).await
    }
}

// ============================================================================
// Tests
// ============================================================================
