//! Bazaar - 信息集市智能体
//!
//! 入口：初始化日志、加载配置、构建组件，并运行本地控制台前端。
//! 生产部署时控制台由聊天网关替代——核心只消费 process_turn。

use anyhow::Context;
use bazaar::agent::{create_components, process_turn};
use bazaar::config::load_config;
use bazaar::core::AgentError;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// 控制台前端使用的固定用户 id
const CONSOLE_USER_ID: &str = "console";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 日志：默认 info，可通过 RUST_LOG 覆盖
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .with(fmt::layer())
        .init();

    let cfg = load_config(None).context("Failed to load config")?;
    std::fs::create_dir_all(&cfg.store.data_dir).context("Failed to create data dir")?;
    let components = create_components(&cfg).context("Failed to create components")?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    // 首次接入：要求输入名字（至少 2 字符），对应聊天端的 /start 问名流程
    match components.market.get_user(CONSOLE_USER_ID).await? {
        Some(user) => {
            println!("欢迎回来，{}！您的余额：{} 信用点。", user.name, user.balance);
        }
        None => loop {
            println!("你好！我是信息集市的掌柜。请先告诉我您的名字：");
            let Some(line) = lines.next_line().await? else {
                return Ok(());
            };
            match components
                .sessions
                .ensure_user(CONSOLE_USER_ID, line.trim())
                .await
            {
                Ok(user) => {
                    println!("很高兴认识您，{}！您的余额：{} 信用点。", user.name, user.balance);
                    println!("我这里有各种信息可以买，也收您手里的信息。直接开聊吧。");
                    break;
                }
                Err(AgentError::Validation(msg)) => println!("{}，请再试一次。", msg),
                Err(e) => return Err(e.into()),
            }
        },
    }

    while let Some(line) = lines.next_line().await? {
        let text = line.trim();
        if text.is_empty() {
            continue;
        }
        if text == "/quit" {
            break;
        }
        for reply in process_turn(&components, CONSOLE_USER_ID, text).await {
            println!("{}", reply);
        }
    }

    Ok(())
}
