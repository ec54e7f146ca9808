//! 类型化工具命令
//!
//! 把推理服务送来的字符串工具名 + JSON 参数包解析为封闭的命令枚举，
//! 分发处对枚举穷举 match，新增工具漏接在编译期暴露；
//! 未知名字与坏参数都只降级为文本结果，绝不中断 run。

use serde::{Deserialize, Deserializer};

/// 推理服务可调用的全部工具名（与 schema 模块注册的定义一一对应）
pub const TOOL_NAMES: [&str; 8] = [
    "sell_item",
    "buy_item",
    "get_items_for_category",
    "get_purchased_items",
    "get_categories_with_counts",
    "get_info_from_category",
    "get_random_info_about_world",
    "get_user_purchase_history",
];

/// 一条解析后的工具命令
#[derive(Debug, Clone, PartialEq)]
pub enum ToolCommand {
    SellItem(SellItemArgs),
    BuyItem(BuyItemArgs),
    GetItemsForCategory { category_id: u32 },
    GetPurchasedItems,
    GetCategoriesWithCounts,
    GetInfoFromCategory { category_id: u32 },
    GetRandomInfoAboutWorld,
    GetUserPurchaseHistory,
}

/// 解析失败：名字未知（降级为固定「不支持」结果）或参数不合法（降级为校验错误文本）
#[derive(Debug)]
pub enum ToolParseError {
    UnknownTool(String),
    BadArguments(String),
}

/// sell_item 参数；cost 与 category_id 容忍字符串编码的数字
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SellItemArgs {
    pub description: String,
    pub details: String,
    #[serde(deserialize_with = "lenient_i64")]
    pub cost: i64,
    #[serde(deserialize_with = "lenient_u32")]
    pub category_id: u32,
    #[serde(default)]
    pub cost_name: Option<String>,
}

/// buy_item 参数
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BuyItemArgs {
    #[serde(deserialize_with = "lenient_u32")]
    pub category_id: u32,
    #[serde(deserialize_with = "lenient_u32")]
    pub item_id: u32,
}

#[derive(Debug, Clone, Deserialize)]
struct CategoryArgs {
    #[serde(deserialize_with = "lenient_u32")]
    category_id: u32,
}

impl ToolCommand {
    /// 按工具名解析参数包；无参工具忽略参数内容
    pub fn parse(name: &str, arguments: &str) -> Result<Self, ToolParseError> {
        let bad = |e: serde_json::Error| ToolParseError::BadArguments(e.to_string());
        match name {
            "sell_item" => Ok(Self::SellItem(
                serde_json::from_str(arguments).map_err(bad)?,
            )),
            "buy_item" => Ok(Self::BuyItem(serde_json::from_str(arguments).map_err(bad)?)),
            "get_items_for_category" => {
                let args: CategoryArgs = serde_json::from_str(arguments).map_err(bad)?;
                Ok(Self::GetItemsForCategory {
                    category_id: args.category_id,
                })
            }
            "get_info_from_category" => {
                let args: CategoryArgs = serde_json::from_str(arguments).map_err(bad)?;
                Ok(Self::GetInfoFromCategory {
                    category_id: args.category_id,
                })
            }
            "get_purchased_items" => Ok(Self::GetPurchasedItems),
            "get_categories_with_counts" => Ok(Self::GetCategoriesWithCounts),
            "get_random_info_about_world" => Ok(Self::GetRandomInfoAboutWorld),
            "get_user_purchase_history" => Ok(Self::GetUserPurchaseHistory),
            other => Err(ToolParseError::UnknownTool(other.to_string())),
        }
    }

    /// 命令对应的工具名（审计日志用）
    pub fn name(&self) -> &'static str {
        match self {
            Self::SellItem(_) => "sell_item",
            Self::BuyItem(_) => "buy_item",
            Self::GetItemsForCategory { .. } => "get_items_for_category",
            Self::GetPurchasedItems => "get_purchased_items",
            Self::GetCategoriesWithCounts => "get_categories_with_counts",
            Self::GetInfoFromCategory { .. } => "get_info_from_category",
            Self::GetRandomInfoAboutWorld => "get_random_info_about_world",
            Self::GetUserPurchaseHistory => "get_user_purchase_history",
        }
    }
}

/// 接受 JSON 数字或数字字符串（推理服务两种都会发）
fn lenient_u32<'de, D: Deserializer<'de>>(de: D) -> Result<u32, D::Error> {
    let value = serde_json::Value::deserialize(de)?;
    match value {
        serde_json::Value::Number(n) => n
            .as_u64()
            .and_then(|v| u32::try_from(v).ok())
            .ok_or_else(|| serde::de::Error::custom("expected a non-negative integer")),
        serde_json::Value::String(s) => s
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("not an integer: {}", s))),
        other => Err(serde::de::Error::custom(format!(
            "expected integer, got {}",
            other
        ))),
    }
}

fn lenient_i64<'de, D: Deserializer<'de>>(de: D) -> Result<i64, D::Error> {
    let value = serde_json::Value::deserialize(de)?;
    match value {
        serde_json::Value::Number(n) => n
            .as_i64()
            .ok_or_else(|| serde::de::Error::custom("expected an integer")),
        serde_json::Value::String(s) => s
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("not an integer: {}", s))),
        other => Err(serde::de::Error::custom(format!(
            "expected integer, got {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_buy_item_with_numeric_args() {
        let cmd = ToolCommand::parse("buy_item", r#"{"category_id": 2, "item_id": 1}"#).unwrap();
        assert_eq!(
            cmd,
            ToolCommand::BuyItem(BuyItemArgs {
                category_id: 2,
                item_id: 1
            })
        );
    }

    #[test]
    fn test_parse_tolerates_string_encoded_numbers() {
        let cmd =
            ToolCommand::parse("buy_item", r#"{"category_id": "2", "item_id": "1"}"#).unwrap();
        assert_eq!(
            cmd,
            ToolCommand::BuyItem(BuyItemArgs {
                category_id: 2,
                item_id: 1
            })
        );

        let cmd = ToolCommand::parse(
            "sell_item",
            r#"{"description": "d", "details": "x", "cost": "5", "category_id": "3"}"#,
        )
        .unwrap();
        match cmd {
            ToolCommand::SellItem(args) => {
                assert_eq!(args.cost, 5);
                assert_eq!(args.category_id, 3);
                assert!(args.cost_name.is_none());
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_unknown_tool() {
        let err = ToolCommand::parse("summon_dragon", "{}").unwrap_err();
        assert!(matches!(err, ToolParseError::UnknownTool(_)));
    }

    #[test]
    fn test_parse_bad_arguments() {
        let err = ToolCommand::parse("buy_item", r#"{"category_id": "two"}"#).unwrap_err();
        assert!(matches!(err, ToolParseError::BadArguments(_)));
    }

    #[test]
    fn test_every_tool_name_parses() {
        // 封闭命令集守卫：TOOL_NAMES 里每个名字都必须被 parse 接受
        let sample_args = |name: &str| match name {
            "sell_item" => r#"{"description":"d","details":"x","cost":2,"category_id":2}"#,
            "buy_item" => r#"{"category_id":2,"item_id":1}"#,
            "get_items_for_category" | "get_info_from_category" => r#"{"category_id":2}"#,
            _ => "{}",
        };
        for name in TOOL_NAMES {
            ToolCommand::parse(name, sample_args(name))
                .unwrap_or_else(|e| panic!("{} failed to parse: {:?}", name, e));
        }
    }
}
