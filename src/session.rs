//! 用户会话目录
//!
//! 维护用户到外部对话线程句柄的绑定：懒创建、存量句柄校验失败时透明换新
//! （只打一条提示日志，不上升为用户可见错误）。同时为每个用户提供回合锁：
//! 同一用户在上一回合仍在途时发来的新消息排在其后，不取消也不拒绝。

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};

use crate::assistant::AssistantBackend;
use crate::core::{AgentError, MarketError};
use crate::market::{MarketHandle, User};

/// 用户名最少字符数；这条校验属于会话边界，不在领域层
const MIN_NAME_CHARS: usize = 2;

/// 会话目录：用户注册边界 + 线程句柄目录 + 回合锁表
pub struct SessionDirectory {
    market: MarketHandle,
    backend: Arc<dyn AssistantBackend>,
    turn_locks: RwLock<HashMap<String, Arc<Mutex<()>>>>,
}

impl SessionDirectory {
    pub fn new(market: MarketHandle, backend: Arc<dyn AssistantBackend>) -> Self {
        Self {
            market,
            backend,
            turn_locks: RwLock::new(HashMap::new()),
        }
    }

    /// 注册用户：名字短于 MIN_NAME_CHARS 在此处拒绝；已存在的用户原样返回
    pub async fn ensure_user(&self, user_id: &str, name: &str) -> Result<User, AgentError> {
        if let Some(user) = self.market.get_user(user_id).await.map_err(store_err)? {
            return Ok(user);
        }
        let name = name.trim();
        if name.chars().count() < MIN_NAME_CHARS {
            return Err(AgentError::Validation(format!(
                "用户名至少需要 {} 个字符",
                MIN_NAME_CHARS
            )));
        }
        self.market
            .create_user(user_id, name)
            .await
            .map_err(store_err)
    }

    /// 解析或创建用户的对话线程句柄
    ///
    /// 无句柄则创建并持久化；有句柄则先向后端校验，失效时透明替换为新句柄。
    pub async fn resolve_thread(&self, user_id: &str) -> Result<String, AgentError> {
        let user = self
            .market
            .get_user(user_id)
            .await
            .map_err(store_err)?
            .ok_or_else(|| AgentError::Validation("用户尚未注册".to_string()))?;

        if let Some(thread_id) = user.thread_id {
            match self.backend.retrieve_thread(&thread_id).await {
                Ok(()) => return Ok(thread_id),
                Err(e) => {
                    tracing::info!(
                        user = user_id,
                        thread = %thread_id,
                        "stored thread is stale, creating a new one: {}",
                        e
                    );
                }
            }
        }

        let thread_id = self.backend.create_thread().await?;
        self.market
            .bind_thread(user_id, &thread_id)
            .await
            .map_err(store_err)?;
        tracing::info!(user = user_id, thread = %thread_id, "bound new thread");
        Ok(thread_id)
    }

    /// 取该用户的回合锁；持锁期间同一用户的后续回合排队等待
    pub async fn turn_lock(&self, user_id: &str) -> Arc<Mutex<()>> {
        {
            let locks = self.turn_locks.read().await;
            if let Some(lock) = locks.get(user_id) {
                return Arc::clone(lock);
            }
        }
        let mut locks = self.turn_locks.write().await;
        Arc::clone(
            locks
                .entry(user_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(()))),
        )
    }
}

fn store_err(e: MarketError) -> AgentError {
    AgentError::Store(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assistant::MockBackend;
    use crate::market::MarketEngine;
    use crate::store::{JsonStore, OperationsLog};

    async fn directory() -> (SessionDirectory, Arc<MockBackend>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::new(dir.path());
        let ledger = OperationsLog::new(dir.path().join("operations.log"));
        let engine = MarketEngine::load(store, ledger).unwrap();
        let market = MarketHandle::spawn(engine);
        let backend = Arc::new(MockBackend::new());
        (
            SessionDirectory::new(market, backend.clone()),
            backend,
            dir,
        )
    }

    #[tokio::test]
    async fn test_short_name_rejected_at_session_boundary() {
        let (directory, _backend, _dir) = directory().await;
        let err = directory.ensure_user("u1", "甲").await.unwrap_err();
        assert!(matches!(err, AgentError::Validation(_)));
        // 校验失败时不落用户
        let err = directory.resolve_thread("u1").await.unwrap_err();
        assert!(matches!(err, AgentError::Validation(_)));
    }

    #[tokio::test]
    async fn test_thread_created_lazily_and_persisted() {
        let (directory, backend, _dir) = directory().await;
        directory.ensure_user("u1", "买家甲").await.unwrap();

        let thread_id = directory.resolve_thread("u1").await.unwrap();
        assert_eq!(backend.created_threads(), 1);

        // 第二次解析复用已绑定的句柄
        let again = directory.resolve_thread("u1").await.unwrap();
        assert_eq!(thread_id, again);
        assert_eq!(backend.created_threads(), 1);
    }

    #[tokio::test]
    async fn test_stale_thread_transparently_replaced() {
        let (directory, backend, _dir) = directory().await;
        directory.ensure_user("u1", "买家甲").await.unwrap();

        let first = directory.resolve_thread("u1").await.unwrap();
        backend.invalidate_thread(&first);

        let second = directory.resolve_thread("u1").await.unwrap();
        assert_ne!(first, second);
        assert_eq!(backend.created_threads(), 2);
    }

    #[tokio::test]
    async fn test_existing_user_keeps_original_name() {
        let (directory, _backend, _dir) = directory().await;
        directory.ensure_user("u1", "买家甲").await.unwrap();
        let user = directory.ensure_user("u1", "改名乙").await.unwrap();
        assert_eq!(user.name, "买家甲");
    }
}
