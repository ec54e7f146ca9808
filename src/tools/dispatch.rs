//! 工具分发器
//!
//! 执行一个 requires_action 批次：逐条解析、执行、序列化，每条输出带上
//! 原始 tool_call_id，整批一次性交回编排层。领域错误就地转为文本结果
//! 回给推理服务，对话继续——单次坏调用绝不中断整个 run。

use crate::assistant::types::{ToolCallRequest, ToolOutput};
use crate::core::MarketError;
use crate::market::{category_name, MarketHandle};
use crate::tools::command::{ToolCommand, ToolParseError};

/// 未知工具名的固定降级结果
const UNKNOWN_FUNCTION_RESULT: &str = "Unknown function call.";
/// 审计日志里参数预览的最大字符数
const ARGS_PREVIEW_CHARS: usize = 200;

/// 工具分发器：持有集市句柄，代表某个用户执行工具调用
pub struct ToolDispatcher {
    market: MarketHandle,
}

impl ToolDispatcher {
    pub fn new(market: MarketHandle) -> Self {
        Self { market }
    }

    /// 解析并执行批次内全部工具调用，返回与请求一一对应的输出集。
    /// 调用方必须把返回值作为一个整体提交——部分提交不是合法的状态迁移。
    pub async fn dispatch_batch(
        &self,
        user_id: &str,
        calls: &[ToolCallRequest],
    ) -> Vec<ToolOutput> {
        let mut outputs = Vec::with_capacity(calls.len());
        for call in calls {
            let output = self.dispatch_one(user_id, call).await;
            outputs.push(ToolOutput {
                tool_call_id: call.id.clone(),
                output,
            });
        }
        outputs
    }

    async fn dispatch_one(&self, user_id: &str, call: &ToolCallRequest) -> String {
        let start = std::time::Instant::now();
        let (outcome, output) = match ToolCommand::parse(&call.name, &call.arguments) {
            Ok(command) => match self.execute(user_id, command).await {
                Ok(text) => ("ok", text),
                Err(e) => ("domain_error", describe_market_error(&e)),
            },
            Err(ToolParseError::UnknownTool(_)) => {
                ("unknown_tool", UNKNOWN_FUNCTION_RESULT.to_string())
            }
            Err(ToolParseError::BadArguments(e)) => {
                ("bad_arguments", format!("错误：参数不合法（{}）", e))
            }
        };

        let audit = serde_json::json!({
            "event": "tool_audit",
            "tool": call.name,
            "user": user_id,
            "outcome": outcome,
            "duration_ms": start.elapsed().as_millis() as u64,
            "args_preview": args_preview(&call.arguments),
        });
        tracing::info!(audit = %audit.to_string(), "tool");

        output
    }

    /// 对命令枚举穷举执行；列表型结果序列化为 JSON，成交类结果给人话文本
    async fn execute(&self, user_id: &str, command: ToolCommand) -> Result<String, MarketError> {
        match command {
            ToolCommand::SellItem(args) => {
                let outcome = self
                    .market
                    .sell_item(
                        user_id,
                        &args.description,
                        &args.details,
                        args.cost,
                        args.category_id,
                        args.cost_name,
                    )
                    .await?;
                let notes = if outcome.adjustments.is_empty() {
                    String::new()
                } else {
                    format!("（{}）", outcome.adjustments.join("；"))
                };
                Ok(format!(
                    "信息已售出，售价 {} {}。{}您的新余额：{} {}。",
                    outcome.final_cost,
                    outcome.cost_name,
                    notes,
                    outcome.new_balance,
                    outcome.cost_name
                ))
            }
            ToolCommand::BuyItem(args) => {
                let outcome = self
                    .market
                    .buy_item(user_id, args.category_id, args.item_id)
                    .await?;
                Ok(format!(
                    "信息购买成功，花费 {} {}，内容如下：{}",
                    outcome.cost, outcome.cost_name, outcome.details
                ))
            }
            ToolCommand::GetItemsForCategory { category_id } => {
                let items = self.market.list_items(category_id).await?;
                to_json(&items)
            }
            // 工具名沿用外部契约；语义是「该用户挂出的全部信息」（卖家视角）
            ToolCommand::GetPurchasedItems => {
                let sold = self.market.listings_sold_by(user_id).await?;
                to_json(&sold)
            }
            ToolCommand::GetCategoriesWithCounts => {
                let categories = self.market.categories_with_counts().await?;
                to_json(&categories)
            }
            ToolCommand::GetInfoFromCategory { category_id } => {
                let items = self.market.list_items(category_id).await?;
                let name = category_name(category_id).unwrap_or("未知类目");
                if items.is_empty() {
                    return Ok(format!("类目「{}」下暂时没有信息。", name));
                }
                let listed: Vec<serde_json::Value> = items
                    .iter()
                    .enumerate()
                    .map(|(idx, item)| {
                        serde_json::json!({
                            "id": idx + 1,
                            "description": item.description,
                            "cost": item.cost,
                            "cost_name": item.cost_name,
                        })
                    })
                    .collect();
                to_json(&listed)
            }
            ToolCommand::GetRandomInfoAboutWorld => Ok(self
                .market
                .random_world_fact()
                .await?
                .unwrap_or_else(|| "暂时没有关于这个世界的知识。".to_string())),
            ToolCommand::GetUserPurchaseHistory => {
                let history = self.market.purchase_history(user_id).await?;
                to_json(&history)
            }
        }
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, MarketError> {
    serde_json::to_string(value).map_err(|e| MarketError::Store(e.to_string()))
}

/// 领域错误 -> 回给推理服务的文本；对话继续，不抛给调用方
pub fn describe_market_error(err: &MarketError) -> String {
    match err {
        MarketError::Validation(msg) => format!("错误：{}。", msg),
        MarketError::RestrictedCategory(id) => {
            format!("不能向类目 {} 出售信息！特约供货商只卖不买。", id)
        }
        MarketError::CategoryNotFound(id) => format!("未找到 id 为 {} 的类目。", id),
        MarketError::ItemNotFound { .. } => "该类目下没有指定 id 的信息。".to_string(),
        MarketError::UserNotFound(_) => "用户不存在，请先完成注册。".to_string(),
        MarketError::InsufficientBalance { .. } => "余额不足，无法购买。".to_string(),
        MarketError::Store(e) => format!("内部错误：{}。", e),
    }
}

fn args_preview(args: &str) -> String {
    if args.chars().count() > ARGS_PREVIEW_CHARS {
        format!(
            "{}...",
            args.chars().take(ARGS_PREVIEW_CHARS).collect::<String>()
        )
    } else {
        args.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::MarketEngine;
    use crate::store::{JsonStore, OperationsLog};

    async fn dispatcher() -> (ToolDispatcher, MarketHandle, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::new(dir.path());
        let ledger = OperationsLog::new(dir.path().join("operations.log"));
        let engine = MarketEngine::load(store, ledger).unwrap();
        let market = MarketHandle::spawn(engine);
        market.create_user("u1", "买家甲").await.unwrap();
        market.create_user("u2", "卖家乙").await.unwrap();
        (ToolDispatcher::new(market.clone()), market, dir)
    }

    fn call(id: &str, name: &str, arguments: &str) -> ToolCallRequest {
        ToolCallRequest {
            id: id.to_string(),
            name: name.to_string(),
            arguments: arguments.to_string(),
        }
    }

    #[tokio::test]
    async fn test_unknown_tool_degrades_without_aborting_batch() {
        let (dispatcher, _market, _dir) = dispatcher().await;
        let calls = vec![
            call("call_1", "summon_dragon", "{}"),
            call("call_2", "get_categories_with_counts", "{}"),
        ];
        let outputs = dispatcher.dispatch_batch("u1", &calls).await;
        assert_eq!(outputs.len(), 2);
        assert_eq!(outputs[0].tool_call_id, "call_1");
        assert_eq!(outputs[0].output, "Unknown function call.");
        assert!(outputs[1].output.contains("魔法学科"));
    }

    #[tokio::test]
    async fn test_domain_error_becomes_text_result() {
        let (dispatcher, _market, _dir) = dispatcher().await;
        let outputs = dispatcher
            .dispatch_batch("u1", &[call("call_1", "buy_item", r#"{"category_id":2,"item_id":1}"#)])
            .await;
        assert!(outputs[0].output.contains("没有指定 id 的信息"));
    }

    #[tokio::test]
    async fn test_sell_then_listing_visible_without_details() {
        let (dispatcher, _market, _dir) = dispatcher().await;
        let details = "详".repeat(200);
        let sell_args = serde_json::json!({
            "description": "龙语入门",
            "details": details,
            "cost": 5,
            "category_id": 2,
        })
        .to_string();
        let outputs = dispatcher
            .dispatch_batch("u2", &[call("call_1", "sell_item", &sell_args)])
            .await;
        assert!(outputs[0].output.contains("售价 3"));
        assert!(outputs[0].output.contains("价格已调整"));

        let outputs = dispatcher
            .dispatch_batch(
                "u1",
                &[call("call_2", "get_items_for_category", r#"{"category_id":2}"#)],
            )
            .await;
        assert!(outputs[0].output.contains("龙语入门"));
        assert!(!outputs[0].output.contains(&details));
    }

    #[tokio::test]
    async fn test_info_from_category_empty_message_uses_display_name() {
        let (dispatcher, _market, _dir) = dispatcher().await;
        let outputs = dispatcher
            .dispatch_batch(
                "u1",
                &[call("call_1", "get_info_from_category", r#"{"category_id":4}"#)],
            )
            .await;
        assert!(outputs[0].output.contains("魔法生物"));
        assert!(outputs[0].output.contains("暂时没有信息"));
    }
}
