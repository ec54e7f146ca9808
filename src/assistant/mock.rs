//! 脚本化 Mock 后端（用于测试，无需外部服务）
//!
//! retrieve_run 依序弹出预置的 run 快照，弹到只剩一个时停在该状态重复返回；
//! 提交与取消调用全部留痕，便于断言「批次整体提交」「恰好取消一次」这类性质。

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::assistant::backend::AssistantBackend;
use crate::assistant::types::{Run, RunStatus, ThreadMessage, ToolOutput};
use crate::core::AgentError;

/// Mock 后端：预置 run 状态脚本 + 调用留痕
#[derive(Default)]
pub struct MockBackend {
    /// retrieve_run 的状态脚本；只剩一个时重复返回它
    states: Mutex<VecDeque<Run>>,
    /// list_messages 返回的线程消息（新到旧）
    messages: Mutex<Vec<ThreadMessage>>,
    /// 每次 submit_tool_outputs 提交的整批输出
    pub submitted: Mutex<Vec<Vec<ToolOutput>>>,
    /// 被请求取消的 run id
    pub cancelled: Mutex<Vec<String>>,
    /// 追加过的 (thread_id, content)
    pub appended: Mutex<Vec<(String, String)>>,
    valid_threads: Mutex<HashSet<String>>,
    thread_counter: AtomicU32,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加一个只有状态、无工具调用的 run 快照
    pub fn push_status(&self, status: RunStatus) {
        self.push_run(Run {
            id: "run_1".to_string(),
            status,
            tool_calls: Vec::new(),
        });
    }

    pub fn push_run(&self, run: Run) {
        self.states.lock().unwrap().push_back(run);
    }

    pub fn set_messages(&self, messages: Vec<ThreadMessage>) {
        *self.messages.lock().unwrap() = messages;
    }

    /// 让某个线程句柄对 retrieve_thread 失效（模拟后端丢线程）
    pub fn invalidate_thread(&self, thread_id: &str) {
        self.valid_threads.lock().unwrap().remove(thread_id);
    }

    pub fn created_threads(&self) -> u32 {
        self.thread_counter.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AssistantBackend for MockBackend {
    async fn create_thread(&self) -> Result<String, AgentError> {
        let n = self.thread_counter.fetch_add(1, Ordering::SeqCst) + 1;
        let id = format!("thread_{}", n);
        self.valid_threads.lock().unwrap().insert(id.clone());
        Ok(id)
    }

    async fn retrieve_thread(&self, thread_id: &str) -> Result<(), AgentError> {
        if self.valid_threads.lock().unwrap().contains(thread_id) {
            Ok(())
        } else {
            Err(AgentError::Backend(format!(
                "thread {} not found",
                thread_id
            )))
        }
    }

    async fn add_user_message(&self, thread_id: &str, content: &str) -> Result<(), AgentError> {
        self.appended
            .lock()
            .unwrap()
            .push((thread_id.to_string(), content.to_string()));
        Ok(())
    }

    async fn create_run(&self, _thread_id: &str) -> Result<Run, AgentError> {
        Ok(Run {
            id: "run_1".to_string(),
            status: RunStatus::Queued,
            tool_calls: Vec::new(),
        })
    }

    async fn retrieve_run(&self, _thread_id: &str, _run_id: &str) -> Result<Run, AgentError> {
        let mut states = self.states.lock().unwrap();
        if states.len() > 1 {
            Ok(states.pop_front().unwrap_or_else(|| unreachable!()))
        } else {
            states
                .front()
                .cloned()
                .ok_or_else(|| AgentError::Backend("mock run script is empty".to_string()))
        }
    }

    async fn submit_tool_outputs(
        &self,
        _thread_id: &str,
        _run_id: &str,
        outputs: Vec<ToolOutput>,
    ) -> Result<(), AgentError> {
        self.submitted.lock().unwrap().push(outputs);
        Ok(())
    }

    async fn cancel_run(&self, _thread_id: &str, run_id: &str) -> Result<(), AgentError> {
        self.cancelled.lock().unwrap().push(run_id.to_string());
        Ok(())
    }

    async fn list_messages(&self, _thread_id: &str) -> Result<Vec<ThreadMessage>, AgentError> {
        Ok(self.messages.lock().unwrap().clone())
    }
}
