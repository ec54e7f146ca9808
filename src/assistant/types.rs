//! 推理服务侧类型：run 状态、工具调用请求与线程消息

use serde::{Deserialize, Serialize};

/// run 的生命周期状态；线上出现未知值时落入 Unknown，按协议违例处理
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Queued,
    InProgress,
    RequiresAction,
    Completed,
    Cancelling,
    Cancelled,
    Failed,
    Incomplete,
    Expired,
    #[serde(other)]
    Unknown,
}

impl RunStatus {
    /// 终态失败：编排层返回空结果集而非报错，由前端转为重试提示
    pub fn is_terminal_failure(self) -> bool {
        matches!(
            self,
            RunStatus::Cancelling
                | RunStatus::Cancelled
                | RunStatus::Failed
                | RunStatus::Incomplete
                | RunStatus::Expired
        )
    }
}

/// 一次 run 的快照（创建或轮询返回）
#[derive(Debug, Clone)]
pub struct Run {
    pub id: String,
    pub status: RunStatus,
    /// requires_action 时待执行的工具调用批次；其他状态下为空
    pub tool_calls: Vec<ToolCallRequest>,
}

/// 推理服务请求执行的一次工具调用
#[derive(Debug, Clone)]
pub struct ToolCallRequest {
    pub id: String,
    pub name: String,
    /// JSON 编码的扁平参数包
    pub arguments: String,
}

/// 某次工具调用的执行结果，按 tool_call_id 与请求对应
#[derive(Debug, Clone, Serialize)]
pub struct ToolOutput {
    pub tool_call_id: String,
    pub output: String,
}

/// 线程内一条消息（已抽出纯文本）
#[derive(Debug, Clone, PartialEq)]
pub struct ThreadMessage {
    pub role: MessageRole,
    pub text: String,
}

impl ThreadMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            text: text.into(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    User,
    Assistant,
    #[serde(other)]
    Other,
}
