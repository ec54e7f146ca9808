//! 记录存储层：JSON 全量读写 + 追加式操作流水账

pub mod json;
pub mod ledger;

pub use json::JsonStore;
pub use ledger::OperationsLog;
