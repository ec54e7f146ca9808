//! 集市 actor：单写者串行化点
//!
//! 全部领域操作经由 mpsc 命令队列进入唯一持有 MarketEngine 的任务，oneshot 回传结果。
//! 读-改-写循环不可能交错：并发卖出不会算出相同的「下一 id」，
//! 并发扣费/入账不会互相覆盖。

use tokio::sync::{mpsc, oneshot};

use crate::core::MarketError;
use crate::market::engine::MarketEngine;
use crate::market::types::{
    BuyOutcome, CategorySummary, ListingView, PurchaseRecord, SellOutcome, SoldListing, User,
};

/// 命令队列容量；写者只有 actor 一个，队列只起缓冲作用
const COMMAND_BUFFER: usize = 64;

/// 发往集市 actor 的命令，每条携带 oneshot 回执
pub enum MarketCommand {
    GetUser {
        user_id: String,
        reply: oneshot::Sender<Option<User>>,
    },
    CreateUser {
        user_id: String,
        name: String,
        reply: oneshot::Sender<Result<User, MarketError>>,
    },
    BindThread {
        user_id: String,
        thread_id: String,
        reply: oneshot::Sender<Result<(), MarketError>>,
    },
    AdjustBalance {
        user_id: String,
        delta: i64,
        reply: oneshot::Sender<Result<i64, MarketError>>,
    },
    Categories {
        reply: oneshot::Sender<Vec<CategorySummary>>,
    },
    ListItems {
        category_id: u32,
        reply: oneshot::Sender<Result<Vec<ListingView>, MarketError>>,
    },
    Sell {
        seller_id: String,
        description: String,
        details: String,
        cost: i64,
        category_id: u32,
        cost_name: Option<String>,
        reply: oneshot::Sender<Result<SellOutcome, MarketError>>,
    },
    Buy {
        buyer_id: String,
        category_id: u32,
        listing_id: u32,
        reply: oneshot::Sender<Result<BuyOutcome, MarketError>>,
    },
    History {
        user_id: String,
        reply: oneshot::Sender<Vec<PurchaseRecord>>,
    },
    SoldBy {
        user_id: String,
        reply: oneshot::Sender<Vec<SoldListing>>,
    },
    WorldFact {
        reply: oneshot::Sender<Option<String>>,
    },
}

/// 集市句柄：可克隆，跨任务共享；所有方法都是异步的队列往返
#[derive(Clone)]
pub struct MarketHandle {
    tx: mpsc::Sender<MarketCommand>,
}

impl MarketHandle {
    /// 启动 actor 任务并返回句柄；engine 的所有权移入任务
    pub fn spawn(mut engine: MarketEngine) -> Self {
        let (tx, mut rx) = mpsc::channel::<MarketCommand>(COMMAND_BUFFER);
        tokio::spawn(async move {
            while let Some(cmd) = rx.recv().await {
                handle_command(&mut engine, cmd);
            }
            tracing::debug!("market actor stopped");
        });
        Self { tx }
    }

    async fn call<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> MarketCommand,
    ) -> Result<T, MarketError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(make(reply_tx))
            .await
            .map_err(|_| MarketError::Store("market actor unavailable".to_string()))?;
        reply_rx
            .await
            .map_err(|_| MarketError::Store("market actor dropped the reply".to_string()))
    }

    pub async fn get_user(&self, user_id: &str) -> Result<Option<User>, MarketError> {
        self.call(|reply| MarketCommand::GetUser {
            user_id: user_id.to_string(),
            reply,
        })
        .await
    }

    pub async fn create_user(&self, user_id: &str, name: &str) -> Result<User, MarketError> {
        self.call(|reply| MarketCommand::CreateUser {
            user_id: user_id.to_string(),
            name: name.to_string(),
            reply,
        })
        .await?
    }

    pub async fn bind_thread(&self, user_id: &str, thread_id: &str) -> Result<(), MarketError> {
        self.call(|reply| MarketCommand::BindThread {
            user_id: user_id.to_string(),
            thread_id: thread_id.to_string(),
            reply,
        })
        .await?
    }

    pub async fn adjust_balance(&self, user_id: &str, delta: i64) -> Result<i64, MarketError> {
        self.call(|reply| MarketCommand::AdjustBalance {
            user_id: user_id.to_string(),
            delta,
            reply,
        })
        .await?
    }

    pub async fn categories_with_counts(&self) -> Result<Vec<CategorySummary>, MarketError> {
        self.call(|reply| MarketCommand::Categories { reply }).await
    }

    pub async fn list_items(&self, category_id: u32) -> Result<Vec<ListingView>, MarketError> {
        self.call(|reply| MarketCommand::ListItems { category_id, reply })
            .await?
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn sell_item(
        &self,
        seller_id: &str,
        description: &str,
        details: &str,
        cost: i64,
        category_id: u32,
        cost_name: Option<String>,
    ) -> Result<SellOutcome, MarketError> {
        self.call(|reply| MarketCommand::Sell {
            seller_id: seller_id.to_string(),
            description: description.to_string(),
            details: details.to_string(),
            cost,
            category_id,
            cost_name,
            reply,
        })
        .await?
    }

    pub async fn buy_item(
        &self,
        buyer_id: &str,
        category_id: u32,
        listing_id: u32,
    ) -> Result<BuyOutcome, MarketError> {
        self.call(|reply| MarketCommand::Buy {
            buyer_id: buyer_id.to_string(),
            category_id,
            listing_id,
            reply,
        })
        .await?
    }

    pub async fn purchase_history(&self, user_id: &str) -> Result<Vec<PurchaseRecord>, MarketError> {
        self.call(|reply| MarketCommand::History {
            user_id: user_id.to_string(),
            reply,
        })
        .await
    }

    pub async fn listings_sold_by(&self, user_id: &str) -> Result<Vec<SoldListing>, MarketError> {
        self.call(|reply| MarketCommand::SoldBy {
            user_id: user_id.to_string(),
            reply,
        })
        .await
    }

    pub async fn random_world_fact(&self) -> Result<Option<String>, MarketError> {
        self.call(|reply| MarketCommand::WorldFact { reply }).await
    }
}

/// 在 actor 任务内逐条执行命令；回执端已放弃时丢弃结果即可
fn handle_command(engine: &mut MarketEngine, cmd: MarketCommand) {
    match cmd {
        MarketCommand::GetUser { user_id, reply } => {
            let _ = reply.send(engine.get_user(&user_id).cloned());
        }
        MarketCommand::CreateUser {
            user_id,
            name,
            reply,
        } => {
            let _ = reply.send(engine.create_user(&user_id, &name));
        }
        MarketCommand::BindThread {
            user_id,
            thread_id,
            reply,
        } => {
            let _ = reply.send(engine.bind_thread(&user_id, &thread_id));
        }
        MarketCommand::AdjustBalance {
            user_id,
            delta,
            reply,
        } => {
            let _ = reply.send(engine.adjust_balance(&user_id, delta));
        }
        MarketCommand::Categories { reply } => {
            let _ = reply.send(engine.categories_with_counts());
        }
        MarketCommand::ListItems { category_id, reply } => {
            let _ = reply.send(engine.list_items(category_id));
        }
        MarketCommand::Sell {
            seller_id,
            description,
            details,
            cost,
            category_id,
            cost_name,
            reply,
        } => {
            let _ = reply.send(engine.sell_item(
                &seller_id,
                &description,
                &details,
                cost,
                category_id,
                cost_name,
            ));
        }
        MarketCommand::Buy {
            buyer_id,
            category_id,
            listing_id,
            reply,
        } => {
            let _ = reply.send(engine.buy_item(&buyer_id, category_id, listing_id));
        }
        MarketCommand::History { user_id, reply } => {
            let _ = reply.send(engine.purchase_history(&user_id));
        }
        MarketCommand::SoldBy { user_id, reply } => {
            let _ = reply.send(engine.listings_sold_by(&user_id));
        }
        MarketCommand::WorldFact { reply } => {
            let _ = reply.send(engine.random_world_fact());
        }
    }
}
