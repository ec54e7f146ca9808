//! run 编排状态机
//!
//! 驱动一次用户回合的外部 run：合作式轮询状态；requires_action 时整批执行
//! 工具调用并一次性提交；completed 时取线程尾部连续的助手消息按旧到新返回。
//! 迭代预算用尽或状态异常时主动请求取消——这是对卡死/过慢后端的活性保障。

use std::sync::Arc;
use std::time::Duration;

use crate::assistant::types::{MessageRole, RunStatus, ThreadMessage};
use crate::assistant::AssistantBackend;
use crate::core::AgentError;
use crate::tools::ToolDispatcher;

/// 轮询策略：间隔与迭代预算显式注入，测试可用零间隔 + 脚本后端驱动，无需真实等待
#[derive(Debug, Clone)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_polls: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(3),
            max_polls: 30,
        }
    }
}

/// run 编排器：自身无可变状态，可被多个回合并发使用
pub struct RunOrchestrator {
    backend: Arc<dyn AssistantBackend>,
    dispatcher: ToolDispatcher,
    policy: PollPolicy,
}

impl RunOrchestrator {
    pub fn new(
        backend: Arc<dyn AssistantBackend>,
        dispatcher: ToolDispatcher,
        policy: PollPolicy,
    ) -> Self {
        Self {
            backend,
            dispatcher,
            policy,
        }
    }

    /// 在线程上启动 run 并驱动到终态
    ///
    /// 成功完成：返回旧到新的助手回复文本。
    /// 终态失败：返回空集（调用方转为重试提示）。
    /// 迭代耗尽 / 协议违例：请求取消后返回错误（调用方转为固定错误消息）。
    pub async fn drive(&self, thread_id: &str, user_id: &str) -> Result<Vec<String>, AgentError> {
        let run_id = self.backend.create_run(thread_id).await?.id;

        let mut iteration: u32 = 0;
        loop {
            iteration += 1;
            if iteration > self.policy.max_polls {
                tracing::error!(
                    thread = thread_id,
                    run = %run_id,
                    max_polls = self.policy.max_polls,
                    "run exceeded poll budget, cancelling"
                );
                self.request_cancel(thread_id, &run_id).await;
                return Err(AgentError::RunTimeout);
            }
            tokio::time::sleep(self.policy.interval).await;

            let run = self.backend.retrieve_run(thread_id, &run_id).await?;
            tracing::debug!(iteration, status = ?run.status, "run poll");

            match run.status {
                RunStatus::Queued | RunStatus::InProgress => continue,
                RunStatus::RequiresAction => {
                    if run.tool_calls.is_empty() {
                        return Err(AgentError::Protocol(
                            "requires_action without tool calls".to_string(),
                        ));
                    }
                    // 整批执行、整批提交：部分提交不是合法的状态迁移
                    let outputs = self
                        .dispatcher
                        .dispatch_batch(user_id, &run.tool_calls)
                        .await;
                    self.backend
                        .submit_tool_outputs(thread_id, &run_id, outputs)
                        .await?;
                }
                RunStatus::Completed => {
                    let messages = self.backend.list_messages(thread_id).await?;
                    tracing::info!(iteration, "run completed");
                    return Ok(extract_assistant_tail(&messages));
                }
                RunStatus::Cancelling
                | RunStatus::Cancelled
                | RunStatus::Failed
                | RunStatus::Incomplete
                | RunStatus::Expired => {
                    tracing::error!(status = ?run.status, "run ended in terminal failure");
                    return Ok(Vec::new());
                }
                RunStatus::Unknown => {
                    // 未知状态与迭代耗尽同路径：请求取消并终止回合
                    self.request_cancel(thread_id, &run_id).await;
                    return Err(AgentError::Protocol("unexpected run status".to_string()));
                }
            }
        }
    }

    async fn request_cancel(&self, thread_id: &str, run_id: &str) {
        if let Err(e) = self.backend.cancel_run(thread_id, run_id).await {
            tracing::error!("failed to cancel run {}: {}", run_id, e);
        }
    }
}

/// 从「新到旧」的消息序列中取尾部连续的助手消息，截止到最近一条用户消息之前，
/// 按旧到新返回。助手一个回合连发多条消息时全部保留。
pub fn extract_assistant_tail(messages: &[ThreadMessage]) -> Vec<String> {
    let mut tail = Vec::new();
    for msg in messages {
        match msg.role {
            MessageRole::Assistant => tail.push(msg.text.clone()),
            MessageRole::User => break,
            MessageRole::Other => continue,
        }
    }
    tail.reverse();
    tail
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assistant::types::{Run, ToolCallRequest};
    use crate::assistant::MockBackend;
    use crate::market::{MarketEngine, MarketHandle};
    use crate::store::{JsonStore, OperationsLog};

    fn zero_wait(max_polls: u32) -> PollPolicy {
        PollPolicy {
            interval: Duration::ZERO,
            max_polls,
        }
    }

    async fn market() -> (MarketHandle, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::new(dir.path());
        let ledger = OperationsLog::new(dir.path().join("operations.log"));
        let engine = MarketEngine::load(store, ledger).unwrap();
        let handle = MarketHandle::spawn(engine);
        handle.create_user("u1", "测试用户").await.unwrap();
        (handle, dir)
    }

    fn orchestrator(
        backend: Arc<MockBackend>,
        market: MarketHandle,
        policy: PollPolicy,
    ) -> RunOrchestrator {
        RunOrchestrator::new(backend, ToolDispatcher::new(market), policy)
    }

    #[test]
    fn test_extract_tail_returns_trailing_assistant_run_oldest_first() {
        let messages = vec![
            ThreadMessage::assistant("乙"),
            ThreadMessage::assistant("甲"),
            ThreadMessage::user("提问"),
            ThreadMessage::assistant("上一轮"),
        ];
        assert_eq!(extract_assistant_tail(&messages), vec!["甲", "乙"]);
    }

    #[test]
    fn test_extract_tail_empty_when_user_message_is_latest() {
        let messages = vec![ThreadMessage::user("提问"), ThreadMessage::assistant("旧")];
        assert!(extract_assistant_tail(&messages).is_empty());
    }

    #[tokio::test]
    async fn test_poll_budget_triggers_exactly_one_cancel_and_no_tools() {
        let backend = Arc::new(MockBackend::new());
        backend.push_status(RunStatus::InProgress);
        let (market, _dir) = market().await;
        let orch = orchestrator(backend.clone(), market, zero_wait(30));

        let err = orch.drive("thread_1", "u1").await.unwrap_err();
        assert!(matches!(err, AgentError::RunTimeout));
        assert_eq!(backend.cancelled.lock().unwrap().len(), 1);
        assert!(backend.submitted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_requires_action_batch_submitted_together_then_completes() {
        let backend = Arc::new(MockBackend::new());
        backend.push_status(RunStatus::Queued);
        backend.push_run(Run {
            id: "run_1".to_string(),
            status: RunStatus::RequiresAction,
            tool_calls: vec![
                ToolCallRequest {
                    id: "call_1".to_string(),
                    name: "get_categories_with_counts".to_string(),
                    arguments: "{}".to_string(),
                },
                ToolCallRequest {
                    id: "call_2".to_string(),
                    name: "summon_dragon".to_string(),
                    arguments: "{}".to_string(),
                },
            ],
        });
        backend.push_status(RunStatus::Completed);
        backend.set_messages(vec![
            ThreadMessage::assistant("这是类目列表"),
            ThreadMessage::user("有什么可买的？"),
        ]);
        let (market, _dir) = market().await;
        let orch = orchestrator(backend.clone(), market, zero_wait(30));

        let replies = orch.drive("thread_1", "u1").await.unwrap();
        assert_eq!(replies, vec!["这是类目列表"]);

        // 批次整体一次提交，未知工具降级为文本而不中断
        let submitted = backend.submitted.lock().unwrap();
        assert_eq!(submitted.len(), 1);
        assert_eq!(submitted[0].len(), 2);
        assert_eq!(submitted[0][1].output, "Unknown function call.");
        assert!(backend.cancelled.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_terminal_failure_yields_empty_result_set() {
        let backend = Arc::new(MockBackend::new());
        backend.push_status(RunStatus::Failed);
        let (market, _dir) = market().await;
        let orch = orchestrator(backend.clone(), market, zero_wait(30));

        let replies = orch.drive("thread_1", "u1").await.unwrap();
        assert!(replies.is_empty());
        assert!(backend.cancelled.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_status_treated_like_budget_exhaustion() {
        let backend = Arc::new(MockBackend::new());
        backend.push_status(RunStatus::Unknown);
        let (market, _dir) = market().await;
        let orch = orchestrator(backend.clone(), market, zero_wait(30));

        let err = orch.drive("thread_1", "u1").await.unwrap_err();
        assert!(matches!(err, AgentError::Protocol(_)));
        assert_eq!(backend.cancelled.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_requires_action_with_empty_batch_is_protocol_error() {
        let backend = Arc::new(MockBackend::new());
        backend.push_status(RunStatus::RequiresAction);
        let (market, _dir) = market().await;
        let orch = orchestrator(backend.clone(), market, zero_wait(30));

        let err = orch.drive("thread_1", "u1").await.unwrap_err();
        assert!(matches!(err, AgentError::Protocol(_)));
    }
}
