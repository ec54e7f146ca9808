//! Bazaar - Rust 信息集市智能体系统
//!
//! 外部推理服务（Assistants 线程/运行 API）驱动的信息买卖机器人核心。
//!
//! 模块划分：
//! - **agent**: 无头回合管线（供控制台 / 其他前端调用）
//! - **assistant**: 外部推理服务能力接口（trait + OpenAI 实现 + Mock）
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误类型
//! - **market**: 集市领域模型、领域引擎与单写者 actor
//! - **run**: run 状态机编排（轮询、工具批次、回复提取）
//! - **session**: 用户会话目录（线程句柄绑定与修复、回合串行化）
//! - **store**: JSON 记录存储与操作流水账
//! - **tools**: 类型化工具命令、分发器与 schema 声明

pub mod agent;
pub mod assistant;
pub mod config;
pub mod core;
pub mod market;
pub mod run;
pub mod session;
pub mod store;
pub mod tools;
