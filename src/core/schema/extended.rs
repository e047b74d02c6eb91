//! Extended (x10) REST shapes.
//!
//! The API speaks camelCase; responses are re-emitted in snake_case with every
//! money field as a decimal string.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all(deserialize = "camelCase"))]
pub struct Market {
    pub name: String,
    #[serde(default)]
    pub asset_name: String,
    #[serde(default)]
    pub asset_precision: u32,
    #[serde(default)]
    pub collateral_asset_name: String,
    #[serde(default)]
    pub collateral_asset_precision: u32,
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub market_stats: MarketStats,
    #[serde(default)]
    pub trading_config: TradingConfig,
    #[serde(default)]
    pub l2_config: L2Config,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all(deserialize = "camelCase"))]
pub struct MarketStats {
    #[serde(default)]
    pub daily_volume: Decimal,
    #[serde(default)]
    pub daily_volume_base: Decimal,
    #[serde(default)]
    pub daily_price_change: Decimal,
    #[serde(default)]
    pub daily_low: Decimal,
    #[serde(default)]
    pub daily_high: Decimal,
    #[serde(default)]
    pub last_price: Decimal,
    #[serde(default)]
    pub ask_price: Decimal,
    #[serde(default)]
    pub bid_price: Decimal,
    #[serde(default)]
    pub mark_price: Decimal,
    #[serde(default)]
    pub index_price: Decimal,
    #[serde(default)]
    pub funding_rate: Decimal,
    #[serde(default)]
    pub next_funding_rate: i64,
    #[serde(default)]
    pub open_interest: Decimal,
    #[serde(default)]
    pub open_interest_base: Decimal,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all(deserialize = "camelCase"))]
pub struct TradingConfig {
    #[serde(default)]
    pub min_order_size: Decimal,
    #[serde(default)]
    pub min_order_size_change: Decimal,
    #[serde(default)]
    pub min_price_change: Decimal,
    #[serde(default)]
    pub max_market_order_value: Decimal,
    #[serde(default)]
    pub max_limit_order_value: Decimal,
    #[serde(default)]
    pub max_position_value: Decimal,
    #[serde(default)]
    pub max_leverage: Decimal,
    #[serde(default)]
    pub limit_price_cap: Decimal,
    #[serde(default)]
    pub limit_price_floor: Decimal,
}

/// Starknet settlement parameters of a market.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all(deserialize = "camelCase"))]
pub struct L2Config {
    #[serde(default, rename(deserialize = "type"))]
    pub kind: String,
    #[serde(default)]
    pub collateral_id: String,
    #[serde(default)]
    pub collateral_resolution: u64,
    #[serde(default)]
    pub synthetic_id: String,
    #[serde(default)]
    pub synthetic_resolution: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all(deserialize = "camelCase"))]
pub struct Balance {
    #[serde(default)]
    pub collateral_name: String,
    #[serde(default)]
    pub balance: Decimal,
    #[serde(default)]
    pub equity: Decimal,
    #[serde(default)]
    pub available_for_trade: Decimal,
    #[serde(default)]
    pub available_for_withdrawal: Decimal,
    #[serde(default)]
    pub unrealised_pnl: Decimal,
    #[serde(default)]
    pub initial_margin: Decimal,
    #[serde(default)]
    pub margin_ratio: Decimal,
    #[serde(default)]
    pub exposure: Decimal,
    #[serde(default)]
    pub leverage: Decimal,
    #[serde(default)]
    pub updated_time: i64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all(deserialize = "camelCase"))]
pub struct Position {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub account_id: i64,
    pub market: String,
    pub side: PositionSide,
    #[serde(default)]
    pub leverage: Decimal,
    #[serde(default)]
    pub size: Decimal,
    #[serde(default)]
    pub value: Decimal,
    #[serde(default)]
    pub open_price: Decimal,
    #[serde(default)]
    pub mark_price: Decimal,
    pub liquidation_price: Option<Decimal>,
    #[serde(default)]
    pub unrealised_pnl: Decimal,
    #[serde(default)]
    pub realised_pnl: Decimal,
    pub tp_trigger_price: Option<Decimal>,
    pub sl_trigger_price: Option<Decimal>,
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub updated_at: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PositionSide {
    Long,
    Short,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    /// `BUY`/`LONG` buy; anything else sells.
    pub fn from_param(raw: &str) -> Self {
        match raw.to_ascii_uppercase().as_str() {
            "BUY" | "LONG" => OrderSide::Buy,
            _ => OrderSide::Sell,
        }
    }

    pub fn closing(side: PositionSide) -> Self {
        match side {
            PositionSide::Long => OrderSide::Sell,
            PositionSide::Short => OrderSide::Buy,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderType {
    Limit,
    Market,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TimeInForce {
    Gtt,
    Ioc,
    Fok,
}

impl TimeInForce {
    /// `GTC` has no direct equivalent; good-till-time takes its place.
    pub fn from_param(raw: &str) -> Self {
        match raw.to_ascii_uppercase().as_str() {
            "IOC" => TimeInForce::Ioc,
            "FOK" => TimeInForce::Fok,
            _ => TimeInForce::Gtt,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all(deserialize = "camelCase"))]
pub struct OpenOrder {
    pub id: i64,
    #[serde(default)]
    pub account_id: i64,
    #[serde(default)]
    pub external_id: String,
    pub market: String,
    #[serde(rename = "type")]
    pub order_type: OrderType,
    pub side: OrderSide,
    #[serde(default)]
    pub status: String,
    pub status_reason: Option<String>,
    #[serde(default)]
    pub price: Decimal,
    pub average_price: Option<Decimal>,
    #[serde(default)]
    pub qty: Decimal,
    pub filled_qty: Option<Decimal>,
    #[serde(default)]
    pub reduce_only: bool,
    #[serde(default)]
    pub post_only: bool,
    #[serde(default)]
    pub created_time: i64,
    #[serde(default)]
    pub updated_time: i64,
    pub expiry_time: Option<i64>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all(deserialize = "camelCase"))]
pub struct AccountTrade {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub account_id: i64,
    #[serde(default)]
    pub market: String,
    #[serde(default)]
    pub order_id: i64,
    pub side: OrderSide,
    #[serde(default)]
    pub price: Decimal,
    #[serde(default)]
    pub qty: Decimal,
    #[serde(default)]
    pub value: Decimal,
    #[serde(default)]
    pub fee: Decimal,
    #[serde(default)]
    pub is_taker: bool,
    #[serde(default)]
    pub trade_type: String,
    #[serde(default)]
    pub created_time: i64,
}

/// Public trade print. The API abbreviates these fields.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PublicTrade {
    #[serde(default, rename(deserialize = "i"))]
    pub id: i64,
    #[serde(default, rename(deserialize = "m"))]
    pub market: String,
    #[serde(rename(deserialize = "S"))]
    pub side: OrderSide,
    #[serde(default, rename(deserialize = "tT"))]
    pub trade_type: String,
    #[serde(default, rename(deserialize = "T"))]
    pub timestamp: i64,
    #[serde(default, rename(deserialize = "p"))]
    pub price: Decimal,
    #[serde(default, rename(deserialize = "q"))]
    pub qty: Decimal,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OrderbookLevel {
    #[serde(default)]
    pub price: Decimal,
    #[serde(default)]
    pub qty: Decimal,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all(deserialize = "camelCase"))]
pub struct Orderbook {
    #[serde(default)]
    pub market: String,
    #[serde(default)]
    pub bid: Vec<OrderbookLevel>,
    #[serde(default)]
    pub ask: Vec<OrderbookLevel>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all(deserialize = "camelCase"))]
pub struct PlacedOrder {
    pub id: i64,
    #[serde(default)]
    pub external_id: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all(deserialize = "camelCase"))]
pub struct FeeSchedule {
    #[serde(default)]
    pub market: String,
    #[serde(default)]
    pub maker_fee_rate: Decimal,
    #[serde(default)]
    pub taker_fee_rate: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub message: String,
}

// ── Requests ──

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StarkSignature {
    pub r: String,
    pub s: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OrderSettlement {
    pub signature: StarkSignature,
    pub stark_key: String,
    pub collateral_position: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOrder {
    pub id: String,
    pub market: String,
    #[serde(rename = "type")]
    pub order_type: OrderType,
    pub side: OrderSide,
    pub qty: Decimal,
    pub price: Decimal,
    pub time_in_force: TimeInForce,
    pub expiry_epoch_millis: i64,
    pub fee: Decimal,
    pub nonce: String,
    pub settlement: OrderSettlement,
    pub reduce_only: bool,
    pub post_only: bool,
    pub self_trade_protection_level: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawalSettlement {
    pub recipient: String,
    pub position_id: u64,
    pub collateral_id: String,
    pub amount: u64,
    pub expiration: i64,
    pub salt: u64,
    pub signature: StarkSignature,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawalRequest {
    pub amount: Decimal,
    pub chain_id: String,
    pub asset: String,
    pub settlement: WithdrawalSettlement,
}
