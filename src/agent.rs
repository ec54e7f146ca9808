//! 无头回合管线
//!
//! 供控制台等前端调用的核心逻辑：create_components 从配置构建集市 actor、
//! 推理后端、会话目录与 run 编排器；process_turn 对单条用户消息跑完
//! 「解析线程 -> 追加消息 -> 驱动 run -> 提取回复」全流程，
//! 并把回合级错误收敛为固定的用户可见提示。

use std::sync::Arc;
use std::time::Duration;

use crate::assistant::{AssistantBackend, OpenAiAssistantBackend};
use crate::config::AppConfig;
use crate::core::AgentError;
use crate::market::{MarketEngine, MarketHandle, DEFAULT_COST_NAME};
use crate::run::{PollPolicy, RunOrchestrator};
use crate::session::SessionDirectory;
use crate::store::{JsonStore, OperationsLog};
use crate::tools::ToolDispatcher;

/// 超时/协议违例时的固定提示
pub const TIMEOUT_MESSAGE: &str = "❌ 错误：等待助手回复超时，请稍后再试。";
/// 助手无回复（终态失败等）时的固定重试提示
pub const EMPTY_REPLY_MESSAGE: &str = "❌ 错误：助手未能处理您的请求，请稍后重试。";

/// 预构建的组件集，可多回合、多用户共享
pub struct AgentComponents {
    pub market: MarketHandle,
    pub backend: Arc<dyn AssistantBackend>,
    pub sessions: SessionDirectory,
    pub orchestrator: RunOrchestrator,
}

/// 从配置构建全套组件（OpenAI 后端）
pub fn create_components(cfg: &AppConfig) -> anyhow::Result<AgentComponents> {
    let backend: Arc<dyn AssistantBackend> = Arc::new(OpenAiAssistantBackend::new(&cfg.assistant)?);
    create_components_with_backend(cfg, backend)
}

/// 用任意后端构建组件；测试注入 MockBackend 时走这里
pub fn create_components_with_backend(
    cfg: &AppConfig,
    backend: Arc<dyn AssistantBackend>,
) -> anyhow::Result<AgentComponents> {
    let store = JsonStore::new(&cfg.store.data_dir);
    let ledger = OperationsLog::new(cfg.store.data_dir.join("operations.log"));
    let engine = MarketEngine::load(store, ledger)?;
    let market = MarketHandle::spawn(engine);

    let policy = PollPolicy {
        interval: Duration::from_secs(cfg.assistant.poll_interval_secs),
        max_polls: cfg.assistant.max_polls,
    };
    let orchestrator = RunOrchestrator::new(
        Arc::clone(&backend),
        ToolDispatcher::new(market.clone()),
        policy,
    );
    let sessions = SessionDirectory::new(market.clone(), Arc::clone(&backend));

    Ok(AgentComponents {
        market,
        backend,
        sessions,
        orchestrator,
    })
}

/// 处理一条用户消息，总是返回要发给用户的文本序列
///
/// 同一用户的并发消息按回合锁排队（新消息等待在途回合，不取消、不拒绝）。
/// 终态失败与其他不可恢复错误 -> 重试提示；超时/协议违例 -> 超时提示。
pub async fn process_turn(components: &AgentComponents, user_id: &str, text: &str) -> Vec<String> {
    let request_id = uuid::Uuid::new_v4().to_string();
    let lock = components.sessions.turn_lock(user_id).await;
    let _turn = lock.lock().await;

    match run_turn(components, user_id, text, &request_id).await {
        Ok(replies) if replies.is_empty() => {
            tracing::warn!(request = %request_id, user = user_id, "assistant returned no reply");
            vec![EMPTY_REPLY_MESSAGE.to_string()]
        }
        Ok(replies) => replies,
        Err(e @ (AgentError::RunTimeout | AgentError::Protocol(_))) => {
            tracing::error!(request = %request_id, user = user_id, "turn failed: {}", e);
            vec![TIMEOUT_MESSAGE.to_string()]
        }
        Err(e) => {
            tracing::error!(request = %request_id, user = user_id, "turn failed: {}", e);
            vec![EMPTY_REPLY_MESSAGE.to_string()]
        }
    }
}

async fn run_turn(
    components: &AgentComponents,
    user_id: &str,
    text: &str,
    request_id: &str,
) -> Result<Vec<String>, AgentError> {
    let user = components
        .market
        .get_user(user_id)
        .await
        .map_err(|e| AgentError::Store(e.to_string()))?
        .ok_or_else(|| AgentError::Validation("用户尚未注册".to_string()))?;

    let thread_id = components.sessions.resolve_thread(user_id).await?;

    // 随消息附带用户名与当前余额，助手在对话里可直接引用
    let content = format!(
        "{}（{}，余额：{} {}）",
        text, user.name, user.balance, DEFAULT_COST_NAME
    );
    components
        .backend
        .add_user_message(&thread_id, &content)
        .await?;

    tracing::info!(request = %request_id, user = user_id, thread = %thread_id, "starting run");
    components.orchestrator.drive(&thread_id, user_id).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assistant::types::{RunStatus, ThreadMessage};
    use crate::assistant::MockBackend;
    use crate::config::AppConfig;

    fn test_config(dir: &tempfile::TempDir) -> AppConfig {
        let mut cfg = AppConfig::default();
        cfg.store.data_dir = dir.path().to_path_buf();
        cfg.assistant.poll_interval_secs = 0;
        cfg
    }

    async fn components(backend: Arc<MockBackend>) -> (AgentComponents, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let cfg = test_config(&dir);
        let components = create_components_with_backend(&cfg, backend).unwrap();
        components
            .sessions
            .ensure_user("u1", "测试用户")
            .await
            .unwrap();
        (components, dir)
    }

    #[tokio::test]
    async fn test_turn_returns_assistant_replies_oldest_first() {
        let backend = Arc::new(MockBackend::new());
        backend.push_status(RunStatus::Completed);
        backend.set_messages(vec![
            ThreadMessage::assistant("第二句"),
            ThreadMessage::assistant("第一句"),
            ThreadMessage::user("你好"),
        ]);
        let (components, _dir) = components(backend.clone()).await;

        let replies = process_turn(&components, "u1", "你好").await;
        assert_eq!(replies, vec!["第一句", "第二句"]);

        // 出站消息带用户信息后缀
        let appended = backend.appended.lock().unwrap();
        assert_eq!(appended.len(), 1);
        assert!(appended[0].1.contains("测试用户"));
        assert!(appended[0].1.contains("余额：0"));
    }

    #[tokio::test]
    async fn test_timeout_maps_to_fixed_message() {
        let backend = Arc::new(MockBackend::new());
        backend.push_status(RunStatus::InProgress);
        let (components, _dir) = components(backend.clone()).await;

        let replies = process_turn(&components, "u1", "你好").await;
        assert_eq!(replies, vec![TIMEOUT_MESSAGE.to_string()]);
        assert_eq!(backend.cancelled.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_terminal_failure_maps_to_retry_prompt() {
        let backend = Arc::new(MockBackend::new());
        backend.push_status(RunStatus::Expired);
        let (components, _dir) = components(backend).await;

        let replies = process_turn(&components, "u1", "你好").await;
        assert_eq!(replies, vec![EMPTY_REPLY_MESSAGE.to_string()]);
    }
}
