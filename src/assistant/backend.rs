//! 推理服务后端抽象
//!
//! 核心消费的七个能力调用：建线程、验线程、追加消息、建 run、查 run、
//! 提交工具结果、取消 run、列消息。具体请求/响应形状是实现方的事。

use async_trait::async_trait;

use crate::assistant::types::{Run, ThreadMessage, ToolOutput};
use crate::core::AgentError;

/// 推理服务后端 trait：OpenAI Assistants 实现与测试 Mock 都实现它
#[async_trait]
pub trait AssistantBackend: Send + Sync {
    /// 创建新对话线程，返回不透明句柄
    async fn create_thread(&self) -> Result<String, AgentError>;

    /// 校验线程句柄仍然有效；失效时返回 Backend 错误，由会话目录透明重建
    async fn retrieve_thread(&self, thread_id: &str) -> Result<(), AgentError>;

    /// 向线程追加一条用户消息
    async fn add_user_message(&self, thread_id: &str, content: &str) -> Result<(), AgentError>;

    /// 在线程上启动一次 run
    async fn create_run(&self, thread_id: &str) -> Result<Run, AgentError>;

    /// 轮询 run 状态
    async fn retrieve_run(&self, thread_id: &str, run_id: &str) -> Result<Run, AgentError>;

    /// 一次性提交整个批次的工具调用结果
    async fn submit_tool_outputs(
        &self,
        thread_id: &str,
        run_id: &str,
        outputs: Vec<ToolOutput>,
    ) -> Result<(), AgentError>;

    /// 请求取消 run（迭代预算用尽时的活性保障）
    async fn cancel_run(&self, thread_id: &str, run_id: &str) -> Result<(), AgentError>;

    /// 按新到旧返回线程全部消息
    async fn list_messages(&self, thread_id: &str) -> Result<Vec<ThreadMessage>, AgentError>;
}
