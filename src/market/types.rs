//! 集市领域类型
//!
//! 持久化结构（User / Listing / PurchaseRecord）通过 flatten 的 extra 保留
//! 未识别的键，整结构 round-trip 不丢字段。

use serde::{Deserialize, Serialize};

/// 默认计价单位
pub const DEFAULT_COST_NAME: &str = "信用点";

/// 受限类目：特约供货商只卖不买，向其出售是领域错误
pub const RESTRICTED_CATEGORY: u32 = 1;

/// 固定类目表（1..=6）的显示名；未知 id 返回 None
pub fn category_name(id: u32) -> Option<&'static str> {
    match id {
        1 => Some("魔法学科（特约供货商）"),
        2 => Some("魔法学科"),
        3 => Some("具体巫师或巫师团体"),
        4 => Some("魔法生物"),
        5 => Some("魔法地点与神器"),
        6 => Some("其他知识"),
        _ => None,
    }
}

/// 用户记录：余额从 0 开始，只通过余额调整操作变动；从不删除
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub name: String,
    pub balance: i64,
    /// 外部对话线程句柄；懒创建，失效时由会话目录透明重建
    pub thread_id: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl User {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            balance: 0,
            thread_id: None,
            extra: serde_json::Map::new(),
        }
    }
}

/// 在售信息：创建后不可变；details 在购买前绝不外露
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Listing {
    /// 类目内 1 起的密集 id（max(现有)+1）
    pub id: u32,
    pub description: String,
    pub details: String,
    pub cost: i64,
    pub cost_name: String,
    pub seller_id: String,
    pub seller_name: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// 购买记录：按买家追加，写一次不再变动
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseRecord {
    pub category_id: u32,
    pub listing_id: u32,
    pub description: String,
    pub details: String,
    pub cost: i64,
    pub cost_name: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// 类目概览：id、显示名、在售数量
#[derive(Debug, Clone, Serialize)]
pub struct CategorySummary {
    pub id: u32,
    pub name: String,
    pub count: usize,
}

/// 买家可见的在售信息视图（不含 details）
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListingView {
    pub id: u32,
    pub description: String,
    pub cost: i64,
    pub cost_name: String,
}

/// 卖家视角的已售出信息
#[derive(Debug, Clone, Serialize)]
pub struct SoldListing {
    pub description: String,
    pub details: String,
}

/// 卖出结果：最终价格与触发的价格调整说明
#[derive(Debug, Clone)]
pub struct SellOutcome {
    pub listing_id: u32,
    pub final_cost: i64,
    pub cost_name: String,
    pub new_balance: i64,
    /// 价格被钳制时的说明；未触发则为空
    pub adjustments: Vec<String>,
}

/// 买入结果：揭示 details 并返回实际扣费
#[derive(Debug, Clone)]
pub struct BuyOutcome {
    pub details: String,
    pub cost: i64,
    pub cost_name: String,
    pub new_balance: i64,
}
