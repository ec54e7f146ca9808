//! 错误类型
//!
//! MarketError：领域错误，在工具分发层就地恢复为文本结果回给推理服务，对话继续；
//! AgentError：回合级错误，终止当前回合并向用户展示固定提示。

use thiserror::Error;

/// 集市领域操作可能出现的错误（校验、规则、查找、余额、持久化）
#[derive(Error, Debug)]
pub enum MarketError {
    /// 输入形状/长度不合法（如 details 太短）
    #[error("Validation failed: {0}")]
    Validation(String),

    /// 向受限类目出售（特约供货商只卖不买）
    #[error("Category {0} is sell-restricted")]
    RestrictedCategory(u32),

    #[error("Category {0} not found")]
    CategoryNotFound(u32),

    #[error("Listing {listing_id} not found in category {category_id}")]
    ItemNotFound { category_id: u32, listing_id: u32 },

    #[error("User {0} not found")]
    UserNotFound(String),

    #[error("Insufficient balance: have {balance}, need {cost}")]
    InsufficientBalance { balance: i64, cost: i64 },

    /// 记录存储读写失败
    #[error("Store error: {0}")]
    Store(String),
}

/// 回合编排过程中可能出现的错误（后端不可用、超时、协议违例等）
#[derive(Error, Debug)]
pub enum AgentError {
    /// 推理服务调用失败或线程句柄失效
    #[error("Backend unavailable: {0}")]
    Backend(String),

    /// run 轮询超出迭代预算，已请求取消
    #[error("Run exceeded poll budget, cancellation requested")]
    RunTimeout,

    /// 意外的 run 状态或畸形的工具调用批次
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// 集市 actor 不可达或持久化失败
    #[error("Store error: {0}")]
    Store(String),

    /// 会话边界校验失败（如用户名太短）
    #[error("Validation failed: {0}")]
    Validation(String),
}
