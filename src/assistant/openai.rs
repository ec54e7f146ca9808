//! OpenAI Assistants v2 后端
//!
//! 通过 reqwest 直连 /threads、/runs、/messages 端点（可配置 base_url），
//! 线协议结构就地用 serde 定义，只映射核心用到的字段。

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::assistant::backend::AssistantBackend;
use crate::assistant::types::{MessageRole, Run, ThreadMessage, ToolCallRequest, ToolOutput};
use crate::config::AssistantSection;
use crate::core::AgentError;

/// run 截断策略：只保留最近 N 条消息，控制上下文开销
const TRUNCATION_LAST_MESSAGES: u32 = 8;
const MAX_COMPLETION_TOKENS: u32 = 1024;

/// OpenAI Assistants 客户端：持有 HTTP 客户端、端点与助手 id
pub struct OpenAiAssistantBackend {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    assistant_id: String,
}

impl OpenAiAssistantBackend {
    /// 从配置构建；API Key 为空时回退到 OPENAI_API_KEY 环境变量
    pub fn new(cfg: &AssistantSection) -> anyhow::Result<Self> {
        let api_key = cfg
            .api_key
            .clone()
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .unwrap_or_default();
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.request_timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            api_key,
            assistant_id: cfg.assistant_id.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post_json<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<T, AgentError> {
        let resp = self
            .client
            .post(self.url(path))
            .bearer_auth(&self.api_key)
            .header("OpenAI-Beta", "assistants=v2")
            .json(body)
            .send()
            .await
            .map_err(|e| AgentError::Backend(e.to_string()))?;
        Self::read_json(resp).await
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, AgentError> {
        let resp = self
            .client
            .get(self.url(path))
            .bearer_auth(&self.api_key)
            .header("OpenAI-Beta", "assistants=v2")
            .send()
            .await
            .map_err(|e| AgentError::Backend(e.to_string()))?;
        Self::read_json(resp).await
    }

    async fn read_json<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, AgentError> {
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AgentError::Backend(format!(
                "assistant API error: {} {}",
                status, body
            )));
        }
        resp.json::<T>()
            .await
            .map_err(|e| AgentError::Backend(e.to_string()))
    }
}

// ---- 线协议结构（仅映射用到的字段） ----

#[derive(Debug, Deserialize)]
struct ThreadObject {
    id: String,
}

#[derive(Debug, Deserialize)]
struct RunObject {
    id: String,
    status: crate::assistant::types::RunStatus,
    required_action: Option<RequiredAction>,
}

#[derive(Debug, Deserialize)]
struct RequiredAction {
    submit_tool_outputs: SubmitToolOutputsAction,
}

#[derive(Debug, Deserialize)]
struct SubmitToolOutputsAction {
    tool_calls: Vec<WireToolCall>,
}

#[derive(Debug, Deserialize)]
struct WireToolCall {
    id: String,
    function: WireFunction,
}

#[derive(Debug, Deserialize)]
struct WireFunction {
    name: String,
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct MessageList {
    data: Vec<WireMessage>,
}

#[derive(Debug, Deserialize)]
struct WireMessage {
    role: MessageRole,
    #[serde(default)]
    content: Vec<WireContent>,
}

#[derive(Debug, Deserialize)]
struct WireContent {
    #[serde(rename = "type")]
    kind: String,
    text: Option<WireText>,
}

#[derive(Debug, Deserialize)]
struct WireText {
    value: String,
}

impl From<RunObject> for Run {
    fn from(run: RunObject) -> Self {
        let tool_calls = run
            .required_action
            .map(|action| {
                action
                    .submit_tool_outputs
                    .tool_calls
                    .into_iter()
                    .map(|call| ToolCallRequest {
                        id: call.id,
                        name: call.function.name,
                        arguments: call.function.arguments,
                    })
                    .collect()
            })
            .unwrap_or_default();
        Run {
            id: run.id,
            status: run.status,
            tool_calls,
        }
    }
}

#[async_trait]
impl AssistantBackend for OpenAiAssistantBackend {
    async fn create_thread(&self) -> Result<String, AgentError> {
        let thread: ThreadObject = self.post_json("/threads", &serde_json::json!({})).await?;
        Ok(thread.id)
    }

    async fn retrieve_thread(&self, thread_id: &str) -> Result<(), AgentError> {
        let _: ThreadObject = self.get_json(&format!("/threads/{}", thread_id)).await?;
        Ok(())
    }

    async fn add_user_message(&self, thread_id: &str, content: &str) -> Result<(), AgentError> {
        let _: serde_json::Value = self
            .post_json(
                &format!("/threads/{}/messages", thread_id),
                &serde_json::json!({ "role": "user", "content": content }),
            )
            .await?;
        Ok(())
    }

    async fn create_run(&self, thread_id: &str) -> Result<Run, AgentError> {
        let run: RunObject = self
            .post_json(
                &format!("/threads/{}/runs", thread_id),
                &serde_json::json!({
                    "assistant_id": self.assistant_id,
                    "truncation_strategy": {
                        "type": "last_messages",
                        "last_messages": TRUNCATION_LAST_MESSAGES,
                    },
                    "max_completion_tokens": MAX_COMPLETION_TOKENS,
                }),
            )
            .await?;
        Ok(run.into())
    }

    async fn retrieve_run(&self, thread_id: &str, run_id: &str) -> Result<Run, AgentError> {
        let run: RunObject = self
            .get_json(&format!("/threads/{}/runs/{}", thread_id, run_id))
            .await?;
        Ok(run.into())
    }

    async fn submit_tool_outputs(
        &self,
        thread_id: &str,
        run_id: &str,
        outputs: Vec<ToolOutput>,
    ) -> Result<(), AgentError> {
        let _: serde_json::Value = self
            .post_json(
                &format!(
                    "/threads/{}/runs/{}/submit_tool_outputs",
                    thread_id, run_id
                ),
                &serde_json::json!({ "tool_outputs": outputs }),
            )
            .await?;
        Ok(())
    }

    async fn cancel_run(&self, thread_id: &str, run_id: &str) -> Result<(), AgentError> {
        let _: serde_json::Value = self
            .post_json(
                &format!("/threads/{}/runs/{}/cancel", thread_id, run_id),
                &serde_json::json!({}),
            )
            .await?;
        Ok(())
    }

    async fn list_messages(&self, thread_id: &str) -> Result<Vec<ThreadMessage>, AgentError> {
        let list: MessageList = self
            .get_json(&format!("/threads/{}/messages", thread_id))
            .await?;
        Ok(list
            .data
            .into_iter()
            .map(|msg| {
                let text = msg
                    .content
                    .iter()
                    .find(|c| c.kind == "text")
                    .and_then(|c| c.text.as_ref())
                    .map(|t| t.value.clone())
                    .unwrap_or_default();
                ThreadMessage {
                    role: msg.role,
                    text,
                }
            })
            .collect())
    }
}
