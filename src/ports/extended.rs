use crate::core::schema::extended::*;
use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde_json::Value;

#[async_trait]
pub trait ExtendedApi: Send + Sync {
    async fn markets(&self, names: &[String]) -> Result<Vec<Market>>;
    async fn balance(&self) -> Result<Balance>;
    async fn positions(&self, market: Option<&str>) -> Result<Vec<Position>>;
    async fn open_orders(&self, market: Option<&str>) -> Result<Vec<OpenOrder>>;
    async fn account_trades(&self, market: &str, limit: u64) -> Result<Vec<AccountTrade>>;
    async fn orderbook(&self, market: &str) -> Result<Orderbook>;
    async fn market_trades(&self, market: &str) -> Result<Vec<PublicTrade>>;
    async fn fees(&self, market: &str) -> Result<Vec<FeeSchedule>>;
    async fn place_order(&self, order: &NewOrder) -> Result<PlacedOrder>;
    async fn cancel_order(&self, order_id: i64) -> Result<Value>;
    async fn cancel_order_by_external_id(&self, external_id: &str) -> Result<Value>;
    async fn withdraw(&self, request: &WithdrawalRequest) -> Result<Value>;
    async fn bridge_config(&self) -> Result<Value>;
    async fn bridge_quote(&self, chain_in: &str, chain_out: &str, amount: Decimal) -> Result<Value>;
    async fn commit_bridge_quote(&self, quote_id: &str) -> Result<()>;
}
