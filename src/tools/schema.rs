//! 助手侧工具 schema 声明
//!
//! 生成注册给推理服务的 function 定义数组，与 ToolCommand 的封闭命令集一一对应；
//! 测试保证两边名字集合一致，防止 schema 与分发脱节。

use serde_json::{json, Value};

/// 全部工具的 function 定义（OpenAI function-calling 形状）
pub fn assistant_function_schemas() -> Vec<Value> {
    let category_param = json!({
        "type": "object",
        "properties": {
            "category_id": { "type": "integer", "description": "类目 id（1-6）" }
        },
        "required": ["category_id"]
    });
    let no_params = json!({ "type": "object", "properties": {}, "required": [] });

    vec![
        function(
            "sell_item",
            "出售一条信息：给出描述、完整详情（至少 200 字符）、出价（1-3）与类目",
            json!({
                "type": "object",
                "properties": {
                    "description": { "type": "string", "description": "信息的公开简介" },
                    "details": { "type": "string", "description": "付费后才可见的完整内容，至少 200 字符" },
                    "cost": { "type": "integer", "description": "出价，允许范围 1-3，超出会被调整" },
                    "category_id": { "type": "integer", "description": "目标类目 id（类目 1 不接受出售）" },
                    "cost_name": { "type": "string", "description": "计价单位，默认信用点" }
                },
                "required": ["description", "details", "cost", "category_id"]
            }),
        ),
        function(
            "buy_item",
            "购买某类目下指定 id 的信息；余额不足会被拒绝",
            json!({
                "type": "object",
                "properties": {
                    "category_id": { "type": "integer", "description": "类目 id" },
                    "item_id": { "type": "integer", "description": "类目内的信息 id" }
                },
                "required": ["category_id", "item_id"]
            }),
        ),
        function(
            "get_items_for_category",
            "列出某类目的在售信息（id、简介、价格；不含完整内容）",
            category_param.clone(),
        ),
        function(
            "get_purchased_items",
            "列出当前用户自己挂出的全部信息（含完整内容）",
            no_params.clone(),
        ),
        function(
            "get_categories_with_counts",
            "列出全部类目及各自的在售数量",
            no_params.clone(),
        ),
        function(
            "get_info_from_category",
            "浏览某类目的在售信息概览（带显示序号）",
            category_param,
        ),
        function(
            "get_random_info_about_world",
            "随机讲一条关于这个世界的知识",
            no_params.clone(),
        ),
        function(
            "get_user_purchase_history",
            "列出当前用户的购买记录（按购买顺序）",
            no_params,
        ),
    ]
}

fn function(name: &str, description: &str, parameters: Value) -> Value {
    json!({
        "type": "function",
        "function": {
            "name": name,
            "description": description,
            "parameters": parameters,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::command::TOOL_NAMES;
    use std::collections::HashSet;

    #[test]
    fn test_schema_names_match_command_set() {
        let schema_names: HashSet<String> = assistant_function_schemas()
            .iter()
            .map(|f| f["function"]["name"].as_str().unwrap().to_string())
            .collect();
        let command_names: HashSet<String> = TOOL_NAMES.iter().map(|n| n.to_string()).collect();
        assert_eq!(schema_names, command_names);
    }
}
