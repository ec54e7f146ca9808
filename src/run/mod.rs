//! run 编排：轮询状态机与回复提取

pub mod orchestrator;

pub use orchestrator::{extract_assistant_tail, PollPolicy, RunOrchestrator};
