//! 工具层：类型化命令、批次分发器与助手侧 schema 声明

pub mod command;
pub mod dispatch;
pub mod schema;

pub use command::{BuyItemArgs, SellItemArgs, ToolCommand, ToolParseError, TOOL_NAMES};
pub use dispatch::ToolDispatcher;
pub use schema::assistant_function_schemas;
