//! 集市领域引擎
//!
//! 在内存表上执行全部领域操作，每次变更整结构落盘；成交同时写操作流水账。
//! 引擎自身不做并发控制——调用方（market actor）保证同一时刻只有一个写者。

use std::collections::{BTreeMap, HashMap};

use rand::seq::SliceRandom;

use crate::core::MarketError;
use crate::market::types::{
    category_name, BuyOutcome, CategorySummary, Listing, ListingView, PurchaseRecord, SellOutcome,
    SoldListing, User, DEFAULT_COST_NAME, RESTRICTED_CATEGORY,
};
use crate::store::{JsonStore, OperationsLog};

/// 价格下限与上限：出价超界时钳制并向卖家说明
const MIN_COST: i64 = 1;
const MAX_COST: i64 = 3;
/// details 最少字符数，不足则整个卖出被拒绝
const MIN_DETAILS_CHARS: usize = 200;

const USERS_FILE: &str = "users.json";
const LISTINGS_FILE: &str = "listings.json";
const PURCHASE_HISTORY_FILE: &str = "purchase_history.json";
const WORLD_FACTS_FILE: &str = "world_facts.json";

/// 集市引擎：users / listings / purchase_history / world_facts 四张表 + 存储与流水账
pub struct MarketEngine {
    store: JsonStore,
    ledger: OperationsLog,
    users: HashMap<String, User>,
    /// 类目 id（字符串 "1".."6"）-> 在售信息有序序列
    listings: BTreeMap<String, Vec<Listing>>,
    history: HashMap<String, Vec<PurchaseRecord>>,
    world_facts: Vec<String>,
}

fn empty_listings() -> BTreeMap<String, Vec<Listing>> {
    (1..=6u32).map(|id| (id.to_string(), Vec::new())).collect()
}

impl MarketEngine {
    /// 启动时全量加载；缺失的文件用空形状初始化
    pub fn load(store: JsonStore, ledger: OperationsLog) -> anyhow::Result<Self> {
        let users = store.load_or_init(USERS_FILE, HashMap::new)?;
        let listings = store.load_or_init(LISTINGS_FILE, empty_listings)?;
        let history = store.load_or_init(PURCHASE_HISTORY_FILE, HashMap::new)?;
        let world_facts = store.load_or_init(WORLD_FACTS_FILE, Vec::new)?;
        Ok(Self {
            store,
            ledger,
            users,
            listings,
            history,
            world_facts,
        })
    }

    pub fn get_user(&self, user_id: &str) -> Option<&User> {
        self.users.get(user_id)
    }

    /// 创建用户（余额 0、无线程句柄）；已存在时原样返回。
    /// 用户名长度校验在会话边界完成，不在此处。
    pub fn create_user(&mut self, user_id: &str, name: &str) -> Result<User, MarketError> {
        if let Some(user) = self.users.get(user_id) {
            return Ok(user.clone());
        }
        let user = User::new(name);
        self.users.insert(user_id.to_string(), user.clone());
        self.save_users()?;
        Ok(user)
    }

    /// 绑定外部对话线程句柄并持久化
    pub fn bind_thread(&mut self, user_id: &str, thread_id: &str) -> Result<(), MarketError> {
        let user = self
            .users
            .get_mut(user_id)
            .ok_or_else(|| MarketError::UserNotFound(user_id.to_string()))?;
        user.thread_id = Some(thread_id.to_string());
        self.save_users()
    }

    /// 调整余额（delta 可为负）并返回新余额。
    /// 不做余额充足性检查——该检查只存在于 buy_item，保持单一事实来源。
    pub fn adjust_balance(&mut self, user_id: &str, delta: i64) -> Result<i64, MarketError> {
        let user = self
            .users
            .get_mut(user_id)
            .ok_or_else(|| MarketError::UserNotFound(user_id.to_string()))?;
        user.balance += delta;
        let balance = user.balance;
        self.save_users()?;
        Ok(balance)
    }

    /// 按 id 序返回各类目的显示名与在售数量
    pub fn categories_with_counts(&self) -> Vec<CategorySummary> {
        self.listings
            .iter()
            .map(|(key, items)| {
                let id: u32 = key.parse().unwrap_or(0);
                CategorySummary {
                    id,
                    name: category_name(id).unwrap_or("未知类目").to_string(),
                    count: items.len(),
                }
            })
            .collect()
    }

    /// 某类目的在售列表；绝不包含 details
    pub fn list_items(&self, category_id: u32) -> Result<Vec<ListingView>, MarketError> {
        let items = self
            .listings
            .get(&category_id.to_string())
            .ok_or(MarketError::CategoryNotFound(category_id))?;
        Ok(items
            .iter()
            .map(|item| ListingView {
                id: item.id,
                description: item.description.clone(),
                cost: item.cost,
                cost_name: item.cost_name.clone(),
            })
            .collect())
    }

    /// 卖出信息
    ///
    /// 校验顺序：类目存在 -> 非受限类目 -> 卖家存在 -> details 长度；
    /// 全部通过后才钳制价格、分配类目内下一 id、追加在售、给卖家入账并写流水账。
    /// 长度校验失败时不产生任何已持久化的副作用。
    pub fn sell_item(
        &mut self,
        seller_id: &str,
        description: &str,
        details: &str,
        cost: i64,
        category_id: u32,
        cost_name: Option<String>,
    ) -> Result<SellOutcome, MarketError> {
        let key = category_id.to_string();
        if !self.listings.contains_key(&key) {
            return Err(MarketError::CategoryNotFound(category_id));
        }
        if category_id == RESTRICTED_CATEGORY {
            return Err(MarketError::RestrictedCategory(category_id));
        }
        let seller_name = self
            .users
            .get(seller_id)
            .map(|u| u.name.clone())
            .ok_or_else(|| MarketError::UserNotFound(seller_id.to_string()))?;
        if details.chars().count() < MIN_DETAILS_CHARS {
            return Err(MarketError::Validation(format!(
                "信息详情太短（少于 {} 字符），请描述得更详细一些",
                MIN_DETAILS_CHARS
            )));
        }

        let mut final_cost = cost;
        let mut adjustments = Vec::new();
        if final_cost > MAX_COST {
            final_cost = MAX_COST;
            adjustments.push(format!(
                "不能以高于 {} 的价格出售，价格已调整为 {}",
                MAX_COST, MAX_COST
            ));
        }
        if final_cost < MIN_COST {
            final_cost = MIN_COST;
            adjustments.push(format!(
                "不能以低于 {} 的价格出售，价格已调整为 {}",
                MIN_COST, MIN_COST
            ));
        }
        let cost_name = cost_name.unwrap_or_else(|| DEFAULT_COST_NAME.to_string());

        let items = self
            .listings
            .get_mut(&key)
            .ok_or(MarketError::CategoryNotFound(category_id))?;
        let listing_id = items.iter().map(|i| i.id).max().map_or(1, |m| m + 1);
        items.push(Listing {
            id: listing_id,
            description: description.to_string(),
            details: details.to_string(),
            cost: final_cost,
            cost_name: cost_name.clone(),
            seller_id: seller_id.to_string(),
            seller_name: seller_name.clone(),
            extra: serde_json::Map::new(),
        });
        self.save_listings()?;

        let new_balance = self.adjust_balance(seller_id, final_cost)?;
        self.ledger
            .append(&format!(
                "{} ({}) 卖出信息: {}，售价 {} {}（类目 {}，id {}）",
                seller_name, seller_id, description, final_cost, cost_name, category_id, listing_id
            ))
            .map_err(|e| MarketError::Store(e.to_string()))?;

        Ok(SellOutcome {
            listing_id,
            final_cost,
            cost_name,
            new_balance,
            adjustments,
        })
    }

    /// 买入信息
    ///
    /// 余额不足时原子拒绝（无部分扣费）；成功则扣费、写流水账、
    /// 追加恰好一条购买记录，并揭示此前隐藏的 details。
    pub fn buy_item(
        &mut self,
        buyer_id: &str,
        category_id: u32,
        listing_id: u32,
    ) -> Result<BuyOutcome, MarketError> {
        let items = self
            .listings
            .get(&category_id.to_string())
            .ok_or(MarketError::CategoryNotFound(category_id))?;
        let item = items
            .iter()
            .find(|i| i.id == listing_id)
            .cloned()
            .ok_or(MarketError::ItemNotFound {
                category_id,
                listing_id,
            })?;
        let buyer = self
            .users
            .get(buyer_id)
            .ok_or_else(|| MarketError::UserNotFound(buyer_id.to_string()))?;
        if buyer.balance < item.cost {
            return Err(MarketError::InsufficientBalance {
                balance: buyer.balance,
                cost: item.cost,
            });
        }
        let buyer_name = buyer.name.clone();

        let new_balance = self.adjust_balance(buyer_id, -item.cost)?;
        self.ledger
            .append(&format!(
                "{} ({}) 买入信息: {}（{}），花费 {} {}",
                buyer_name, buyer_id, item.description, item.details, item.cost, item.cost_name
            ))
            .map_err(|e| MarketError::Store(e.to_string()))?;

        self.history
            .entry(buyer_id.to_string())
            .or_default()
            .push(PurchaseRecord {
                category_id,
                listing_id,
                description: item.description.clone(),
                details: item.details.clone(),
                cost: item.cost,
                cost_name: item.cost_name.clone(),
                extra: serde_json::Map::new(),
            });
        self.save_history()?;

        Ok(BuyOutcome {
            details: item.details,
            cost: item.cost,
            cost_name: item.cost_name,
            new_balance,
        })
    }

    /// 某买家的购买记录（插入序 = 购买序）
    pub fn purchase_history(&self, buyer_id: &str) -> Vec<PurchaseRecord> {
        self.history.get(buyer_id).cloned().unwrap_or_default()
    }

    /// 某卖家在全部类目中已挂出的信息（卖家视角，含 details）
    pub fn listings_sold_by(&self, seller_id: &str) -> Vec<SoldListing> {
        self.listings
            .values()
            .flatten()
            .filter(|item| item.seller_id == seller_id)
            .map(|item| SoldListing {
                description: item.description.clone(),
                details: item.details.clone(),
            })
            .collect()
    }

    /// 随机返回一条世界知识；知识库为空时返回 None
    pub fn random_world_fact(&self) -> Option<String> {
        self.world_facts.choose(&mut rand::thread_rng()).cloned()
    }

    fn save_users(&self) -> Result<(), MarketError> {
        self.store
            .save(USERS_FILE, &self.users)
            .map_err(|e| MarketError::Store(e.to_string()))
    }

    fn save_listings(&self) -> Result<(), MarketError> {
        self.store
            .save(LISTINGS_FILE, &self.listings)
            .map_err(|e| MarketError::Store(e.to_string()))
    }

    fn save_history(&self) -> Result<(), MarketError> {
        self.store
            .save(PURCHASE_HISTORY_FILE, &self.history)
            .map_err(|e| MarketError::Store(e.to_string()))
    }
}
