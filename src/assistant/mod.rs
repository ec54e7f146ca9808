//! 外部推理服务能力接口
//!
//! 核心只依赖 AssistantBackend trait（线程/run/消息七个能力调用）；
//! openai 模块给出 Assistants v2 的 HTTP 实现，mock 模块给出测试用脚本化实现。

pub mod backend;
pub mod mock;
pub mod openai;
pub mod types;

pub use backend::AssistantBackend;
pub use mock::MockBackend;
pub use openai::OpenAiAssistantBackend;
pub use types::{MessageRole, Run, RunStatus, ThreadMessage, ToolCallRequest, ToolOutput};
