use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ── Responses ──

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubAccountSummary {
    #[serde(default)]
    pub sub_account_id: String,
    #[serde(default, alias = "total_balance")]
    pub total_equity: Decimal,
    #[serde(default)]
    pub available_balance: Decimal,
    #[serde(default, alias = "total_unrealised_pnl")]
    pub unrealized_pnl: Decimal,
    #[serde(default, alias = "total_realised_pnl")]
    pub realized_pnl: Decimal,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Instrument {
    pub instrument: String,
    #[serde(default)]
    pub instrument_hash: String,
    #[serde(default)]
    pub base: String,
    #[serde(default)]
    pub quote: String,
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub base_decimals: u32,
    #[serde(default)]
    pub quote_decimals: u32,
    #[serde(alias = "price_step")]
    pub tick_size: Option<Decimal>,
    pub min_size: Option<Decimal>,
    pub size_step: Option<Decimal>,
    pub max_position_size: Option<Decimal>,
    pub ask_price: Option<Decimal>,
    pub bid_price: Option<Decimal>,
    pub funding_rate: Option<Decimal>,
    pub open_interest: Option<Decimal>,
    pub max_market_order: Option<Decimal>,
    pub max_limit_order: Option<Decimal>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Position {
    #[serde(default)]
    pub instrument: String,
    #[serde(default)]
    pub size: Decimal,
    #[serde(default)]
    pub entry_price: Decimal,
    #[serde(default)]
    pub mark_price: Decimal,
    #[serde(default, alias = "liquidation_price")]
    pub est_liquidation_price: Decimal,
    #[serde(default, alias = "unrealised_pnl")]
    pub unrealized_pnl: Decimal,
    #[serde(default, alias = "realised_pnl")]
    pub realized_pnl: Decimal,
    #[serde(default)]
    pub last_order_id: String,
    #[serde(default)]
    pub last_order_status: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreatedOrder {
    pub order_id: Option<String>,
    pub state: Option<OrderState>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrderState {
    pub status: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Ack {
    #[serde(default = "yes")]
    pub ack: bool,
}

impl Default for Ack {
    fn default() -> Self {
        Self { ack: true }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransferAck {
    #[serde(default = "yes")]
    pub ack: bool,
    #[serde(default)]
    pub tx_id: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WithdrawalAck {
    #[serde(default)]
    pub withdrawal_id: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TransferRecord {
    #[serde(default)]
    pub tx_id: String,
    #[serde(default)]
    pub from_account_id: String,
    #[serde(default)]
    pub from_sub_account_id: String,
    #[serde(default)]
    pub to_account_id: String,
    #[serde(default)]
    pub to_sub_account_id: String,
    #[serde(default)]
    pub currency: String,
    #[serde(default)]
    pub num_tokens: String,
    #[serde(default)]
    pub event_time: String,
    #[serde(default)]
    pub transfer_type: String,
}

/// A list endpoint's result plus its pagination cursor.
#[derive(Debug, Clone, Deserialize)]
pub struct Page<T> {
    #[serde(default = "Vec::new")]
    pub result: Vec<T>,
    #[serde(default)]
    pub next: String,
}

#[derive(Debug, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub message: String,
}

fn yes() -> bool {
    true
}

// ── Requests ──

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TimeInForce {
    GoodTillTime,
    AllOrNone,
    ImmediateOrCancel,
    FillOrKill,
}

impl TimeInForce {
    /// Numeric code used in the signed payload.
    pub fn code(self) -> u8 {
        match self {
            TimeInForce::GoodTillTime => 1,
            TimeInForce::AllOrNone => 2,
            TimeInForce::ImmediateOrCancel => 3,
            TimeInForce::FillOrKill => 4,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct Signature {
    pub signer: String,
    pub r: String,
    pub s: String,
    pub v: u8,
    pub expiration: String,
    pub nonce: u32,
}

impl Signature {
    pub fn unsigned(expiration: i64, nonce: u32) -> Self {
        Self {
            expiration: expiration.to_string(),
            nonce,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderLeg {
    pub instrument: String,
    pub size: String,
    pub limit_price: String,
    pub is_buying_asset: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderMetadata {
    pub client_order_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Order {
    pub sub_account_id: String,
    pub is_market: bool,
    pub time_in_force: TimeInForce,
    pub post_only: bool,
    pub reduce_only: bool,
    pub legs: Vec<OrderLeg>,
    pub signature: Signature,
    pub metadata: OrderMetadata,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CancelOrderRequest {
    pub sub_account_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_order_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CancelAllOrdersRequest {
    pub sub_account_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instrument: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TransferRequest {
    pub from_account_id: String,
    pub from_sub_account_id: String,
    pub to_account_id: String,
    pub to_sub_account_id: String,
    pub currency: String,
    pub num_tokens: String,
    pub signature: Signature,
    pub transfer_type: String,
    pub transfer_metadata: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TransferHistoryRequest {
    pub sub_account_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct WithdrawalRequest {
    pub from_account_id: String,
    pub from_sub_account_id: String,
    pub currency: String,
    pub num_tokens: String,
    pub chain_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stark_address: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderHistoryRequest {
    pub sub_account_id: String,
    pub limit: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instrument: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct VaultRequest {
    pub main_account_id: String,
    pub vault_id: String,
    pub currency: String,
    pub num_tokens: String,
    pub signature: Signature,
}

/// Relayed as-is.
pub type RawOrder = Value;
