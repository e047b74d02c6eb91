use crate::adapters::extended::client::ExtendedClient;
use crate::adapters::extended::env::ExtendedEnv;
use crate::adapters::extended::stark::{self, OrderMessage, StarkSigner, WithdrawalMessage};
use crate::core::dispatch::{CommandSet, Handler, HandlerFactory};
use crate::core::error::BridgeError;
use crate::core::normalize::to_plain;
use crate::core::params::Params;
use crate::core::schema::extended::*;
use crate::core::types::Config;
use crate::ports::extended::ExtendedApi;
use anyhow::{Context, Result};
use async_trait::async_trait;
use rust_decimal::{Decimal, RoundingStrategy};
use serde_json::{json, Value};

const DEFAULT_TAKER_FEE: Decimal = Decimal::from_parts(5, 0, 0, false, 4);
const CLOSE_SLIPPAGE: Decimal = Decimal::from_parts(75, 0, 0, false, 4);
const ORDER_TTL_MS: i64 = 60 * 60 * 1000;
const SETTLEMENT_GRACE_SECS: u64 = 14 * 24 * 60 * 60;
const TRADE_SCAN_LIMIT: u64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtendedCommand {
    GetMarkets,
    GetAccountInfo,
    GetPositions,
    GetOrders,
    GetOrderById,
    PlaceOrder,
    CancelOrder,
    CancelOrderByExternalId,
    CancelAllOrders,
    ClosePosition,
    GetOrderbook,
    GetTrades,
    Withdraw,
    GetBridgeConfig,
    GetBridgeQuote,
    CommitBridgeQuote,
    TestParams,
    GetPublicKey,
}

impl CommandSet for ExtendedCommand {
    const ALL: &'static [Self] = &[
        ExtendedCommand::GetMarkets,
        ExtendedCommand::GetAccountInfo,
        ExtendedCommand::GetPositions,
        ExtendedCommand::GetOrders,
        ExtendedCommand::GetOrderById,
        ExtendedCommand::PlaceOrder,
        ExtendedCommand::CancelOrder,
        ExtendedCommand::CancelOrderByExternalId,
        ExtendedCommand::CancelAllOrders,
        ExtendedCommand::ClosePosition,
        ExtendedCommand::GetOrderbook,
        ExtendedCommand::GetTrades,
        ExtendedCommand::Withdraw,
        ExtendedCommand::GetBridgeConfig,
        ExtendedCommand::GetBridgeQuote,
        ExtendedCommand::CommitBridgeQuote,
        ExtendedCommand::TestParams,
        ExtendedCommand::GetPublicKey,
    ];

    fn name(self) -> &'static str {
        match self {
            ExtendedCommand::GetMarkets => "get_markets",
            ExtendedCommand::GetAccountInfo => "get_account_info",
            ExtendedCommand::GetPositions => "get_positions",
            ExtendedCommand::GetOrders => "get_orders",
            ExtendedCommand::GetOrderById => "get_order_by_id",
            ExtendedCommand::PlaceOrder => "place_order",
            ExtendedCommand::CancelOrder => "cancel_order",
            ExtendedCommand::CancelOrderByExternalId => "cancel_order_by_external_id",
            ExtendedCommand::CancelAllOrders => "cancel_all_orders",
            ExtendedCommand::ClosePosition => "close_position",
            ExtendedCommand::GetOrderbook => "get_orderbook",
            ExtendedCommand::GetTrades => "get_trades",
            ExtendedCommand::Withdraw => "withdraw",
            ExtendedCommand::GetBridgeConfig => "get_bridge_config",
            ExtendedCommand::GetBridgeQuote => "get_bridge_quote",
            ExtendedCommand::CommitBridgeQuote => "commit_bridge_quote",
            ExtendedCommand::TestParams => "test_params",
            ExtendedCommand::GetPublicKey => "get_public_key",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExtendedSettings {
    pub api_key: String,
    pub private_key: String,
    pub public_key: String,
    pub vault: u32,
    pub env: ExtendedEnv,
}

impl ExtendedSettings {
    pub fn from_params(params: &Params, default_env: Option<&str>) -> Result<Self, BridgeError> {
        let missing: Vec<&str> = ["api_key", "private_key", "public_key", "vault"]
            .into_iter()
            .filter(|k| !params.contains(k))
            .collect();
        if !missing.is_empty() {
            return Err(BridgeError::MissingCredentials(missing.join(", ")));
        }

        let vault = params.require_u64("vault")?;
        let vault = u32::try_from(vault).map_err(|_| BridgeError::invalid("vault", "does not fit a position id"))?;
        let env_name = params.text("environment").or_else(|| default_env.map(str::to_string));

        Ok(Self {
            api_key: params.require_text("api_key")?,
            private_key: params.require_text("private_key")?,
            public_key: params.require_text("public_key")?,
            vault,
            env: ExtendedEnv::from_param(env_name.as_deref()),
        })
    }
}

/// One order as the caller described it, before pricing and signing.
#[derive(Debug, Clone)]
struct OrderIntent {
    market: String,
    side: OrderSide,
    qty: Decimal,
    price: Decimal,
    order_type: OrderType,
    time_in_force: TimeInForce,
    post_only: bool,
    reduce_only: bool,
    expiry_epoch_millis: Option<i64>,
}

pub struct ExtendedService {
    api: Box<dyn ExtendedApi>,
    signer: StarkSigner,
    settings: ExtendedSettings,
}

impl ExtendedService {
    pub fn new(settings: ExtendedSettings, api: Box<dyn ExtendedApi>) -> Result<Self> {
        let signer = StarkSigner::from_hex(&settings.private_key, settings.env.chain_id())?;
        let derived = signer.public_key();
        match stark::parse_felt("public_key", &settings.public_key) {
            Ok(given) if given == derived => {}
            _ => tracing::warn!(
                "public_key {} does not match the key derived from private_key ({})",
                settings.public_key,
                signer.public_key_hex()
            ),
        }
        tracing::info!("Extended {} ready for vault {}", settings.env.name(), settings.vault);
        Ok(Self { api, signer, settings })
    }

    async fn market(&self, name: &str) -> Result<Market> {
        self.api
            .markets(&[name.to_string()])
            .await?
            .into_iter()
            .find(|m| m.name == name)
            .with_context(|| format!("Market {} not found", name))
    }

    async fn taker_fee(&self, market: &str) -> Result<Decimal> {
        let fees = self.api.fees(market).await?;
        Ok(fees
            .iter()
            .find(|f| f.market == market)
            .or_else(|| fees.first())
            .map(|f| f.taker_fee_rate)
            .unwrap_or(DEFAULT_TAKER_FEE))
    }

    async fn submit(&self, intent: OrderIntent) -> Result<Value> {
        let market = self.market(&intent.market).await?;
        let fee_rate = self.taker_fee(&intent.market).await?;

        let expiry_ms = match intent.expiry_epoch_millis {
            Some(ms) => ms,
            None => chrono::Utc::now().timestamp_millis() + ORDER_TTL_MS,
        };
        let salt = salt();
        let message = OrderMessage::for_trade(
            &market.l2_config,
            intent.side,
            intent.qty,
            intent.price,
            fee_rate,
            self.settings.vault,
            settlement_expiration(expiry_ms),
            salt,
        )?;
        let signature = self.signer.sign_order(&message)?;

        let order = NewOrder {
            id: uuid::Uuid::new_v4().to_string(),
            market: intent.market,
            order_type: intent.order_type,
            side: intent.side,
            qty: intent.qty,
            price: intent.price,
            time_in_force: intent.time_in_force,
            expiry_epoch_millis: expiry_ms,
            fee: fee_rate,
            nonce: salt.to_string(),
            settlement: OrderSettlement {
                signature,
                stark_key: self.signer.public_key_hex(),
                collateral_position: self.settings.vault.to_string(),
            },
            reduce_only: intent.reduce_only,
            post_only: intent.post_only,
            self_trade_protection_level: "ACCOUNT".into(),
        };
        let placed = self.api.place_order(&order).await?;
        tracing::info!("Extended order {} placed ({})", placed.id, placed.external_id);
        to_plain(&placed)
    }

    async fn place_order(&self, params: &Params) -> Result<Value> {
        let order_type = match params.text_or("order_type", "LIMIT").to_ascii_uppercase().as_str() {
            "MARKET" => OrderType::Market,
            _ => OrderType::Limit,
        };
        // market orders cannot rest on the book
        let default_tif = match order_type {
            OrderType::Market => "IOC",
            _ => "GTC",
        };
        let expiry_epoch_millis = match params.u64_opt("expiry_epoch_millis")? {
            Some(ms) => Some(
                i64::try_from(ms).map_err(|_| BridgeError::invalid("expiry_epoch_millis", "out of range"))?,
            ),
            None => None,
        };

        let intent = OrderIntent {
            market: params.require_text("market_name")?,
            side: OrderSide::from_param(&params.require_text("side")?),
            qty: positive(params, "amount")?,
            price: positive(params, "price")?,
            order_type,
            time_in_force: TimeInForce::from_param(&params.text_or("time_in_force", default_tif)),
            post_only: params.flag("post_only")?,
            reduce_only: params.flag("reduce_only")?,
            expiry_epoch_millis,
        };
        self.submit(intent).await
    }

    async fn order_by_id(&self, params: &Params) -> Result<Value> {
        let order_id = params.require_text("order_id")?;
        let open = self
            .api
            .open_orders(None)
            .await
            .context("Failed to get order by ID")?;
        if let Some(order) = open
            .iter()
            .find(|o| o.id.to_string() == order_id || o.external_id == order_id)
        {
            return to_plain(order);
        }

        match self.api.markets(&[]).await {
            Ok(markets) => {
                for market in markets {
                    let trades = match self.api.account_trades(&market.name, TRADE_SCAN_LIMIT).await {
                        Ok(trades) => trades,
                        Err(e) => {
                            tracing::debug!("Skipping trades of {}: {:#}", market.name, e);
                            continue;
                        }
                    };
                    if let Some(trade) = trades.iter().find(|t| t.order_id.to_string() == order_id) {
                        return Ok(json!({
                            "id": order_id,
                            "market_name": market.name,
                            "status": "FILLED",
                            "type": "UNKNOWN",
                            "side": trade.side,
                            "amount": trade.qty,
                            "filled_amount": trade.qty,
                            "price": trade.price,
                            "average_price": trade.price,
                            "created_at": trade.created_time,
                        }));
                    }
                }
            }
            Err(e) => tracing::debug!("Trade history lookup unavailable: {:#}", e),
        }

        anyhow::bail!(
            "Order with ID {} not found in open orders or available trade history",
            order_id
        )
    }

    async fn cancel_by_external_id(&self, params: &Params) -> Result<Value> {
        let external_id = params.require_text("external_id")?;
        let result = self.api.cancel_order_by_external_id(&external_id).await?;
        Ok(json!({
            "success": true,
            "message": "Order cancelled successfully",
            "result": result,
        }))
    }

    async fn cancel_all_orders(&self, params: &Params) -> Result<Value> {
        let market = params.text("market_name");
        let open = self.api.open_orders(market.as_deref()).await?;
        if open.is_empty() {
            return Ok(json!({ "message": "No orders to cancel", "cancelled_count": 0 }));
        }

        let mut cancelled = Vec::new();
        for order in &open {
            match self.api.cancel_order(order.id).await {
                Ok(_) => cancelled.push(order.id),
                Err(e) => tracing::warn!("Cancel of order {} failed: {:#}", order.id, e),
            }
        }
        Ok(json!({ "cancelled_orders": cancelled, "cancelled_count": cancelled.len() }))
    }

    async fn close_position(&self, params: &Params) -> Result<Value> {
        let market_name = params.require_text("market_name")?;
        let percentage = params
            .decimal_opt("percentage")?
            .unwrap_or(Decimal::ONE_HUNDRED);

        let positions = self.api.positions(None).await?;
        let position = positions
            .into_iter()
            .find(|p| p.market == market_name)
            .with_context(|| format!("No position found for market {}", market_name))?;

        let market = self.market(&market_name).await?;
        let side = OrderSide::closing(position.side);
        let step = market.trading_config.min_order_size_change;
        let share = stark::product(position.size.abs(), percentage)?
            .checked_div(Decimal::ONE_HUNDRED)
            .context("close size overflows")?;
        let qty = round_to_step(share, step, RoundingStrategy::ToZero)?;
        if qty <= Decimal::ZERO {
            anyhow::bail!("Close size for {} rounds to zero", market_name);
        }

        let book = self.api.orderbook(&market_name).await?;
        let reference = match side {
            OrderSide::Buy => book.ask.first().map(|l| l.price),
            OrderSide::Sell => book.bid.first().map(|l| l.price),
        }
        .unwrap_or(position.mark_price);
        let price = close_price(reference, side, market.trading_config.min_price_change)?;

        self.submit(OrderIntent {
            market: market_name,
            side,
            qty,
            price,
            order_type: OrderType::Market,
            time_in_force: TimeInForce::Ioc,
            post_only: false,
            reduce_only: true,
            expiry_epoch_millis: None,
        })
        .await
    }

    async fn trades(&self, params: &Params) -> Result<Value> {
        let market = params.require_text("market_name")?;
        let limit = params.u64_or("limit", 50)? as usize;
        let mut trades = self.api.market_trades(&market).await?;
        trades.truncate(limit);
        to_plain(&trades)
    }

    async fn withdraw(&self, params: &Params) -> Result<Value> {
        let amount = positive(params, "amount")?;
        let stark_address = params.text("stark_address");

        let markets = self.api.markets(&[]).await?;
        let collateral = markets
            .first()
            .context("No markets available to resolve the collateral asset")?;
        let l2 = &collateral.l2_config;

        let units = stark::to_units(
            stark::product(amount, Decimal::from(l2.collateral_resolution))?,
            RoundingStrategy::ToZero,
        )?;
        let units = u64::try_from(units).map_err(|_| anyhow::anyhow!("amount must not be negative"))?;
        let recipient = match &stark_address {
            Some(address) => stark::parse_felt("stark_address", address)?,
            None => self.signer.public_key(),
        };
        let salt = salt();
        let expiration = settlement_expiration(chrono::Utc::now().timestamp_millis());

        let message = WithdrawalMessage {
            recipient,
            position_id: self.settings.vault,
            collateral_id: stark::parse_felt("collateral_id", &l2.collateral_id)?,
            amount: units,
            expiration,
            salt,
        };
        let signature = self.signer.sign_withdrawal(&message)?;

        let request = WithdrawalRequest {
            amount,
            chain_id: "STRK".into(),
            asset: collateral.collateral_asset_name.clone(),
            settlement: WithdrawalSettlement {
                recipient: format!("{:#x}", recipient),
                position_id: self.settings.vault as u64,
                collateral_id: l2.collateral_id.clone(),
                amount: units,
                expiration: expiration as i64,
                salt,
                signature,
            },
        };
        let withdrawal_id = self.api.withdraw(&request).await?;
        tracing::info!("Extended withdrawal {} submitted", withdrawal_id);

        Ok(json!({
            "withdrawal_id": withdrawal_id,
            "amount": amount.to_string(),
            "stark_address": stark_address,
            "status": "submitted",
        }))
    }

    async fn bridge_quote(&self, params: &Params) -> Result<Value> {
        let chain_in = params.require_text("chain_in")?;
        let chain_out = params.require_text("chain_out")?;
        let amount = params.require_decimal("amount")?;
        self.api.bridge_quote(&chain_in, &chain_out, amount).await
    }

    async fn commit_bridge_quote(&self, params: &Params) -> Result<Value> {
        let quote_id = params.require_text("quote_id")?;
        self.api.commit_bridge_quote(&quote_id).await?;
        Ok(json!({
            "success": true,
            "message": "Bridge quote committed successfully",
            "quote_id": quote_id,
        }))
    }

    fn test_params(&self, params: &Params) -> Value {
        json!({
            "success": true,
            "message": "Parameters received correctly",
            "received_params": {
                "api_key": params.masked("api_key"),
                "private_key": params.masked("private_key"),
                "public_key": params.raw("public_key"),
                "vault": params.raw("vault"),
                "environment": params.raw("environment"),
                "test_param": params.raw("test_param"),
                "timestamp": params.raw("timestamp"),
                "all_args_keys": params.keys(),
            },
            "service_config": {
                "environment": self.settings.env.name(),
                "trading_client_initialized": true,
                "signer_public_key": self.signer.public_key_hex(),
            },
        })
    }
}

#[async_trait]
impl Handler for ExtendedService {
    type Command = ExtendedCommand;

    async fn handle(&self, command: ExtendedCommand, params: &Params) -> Result<Value> {
        match command {
            ExtendedCommand::GetMarkets => to_plain(&self.api.markets(&[]).await.context("Failed to get markets")?),
            ExtendedCommand::GetAccountInfo => {
                to_plain(&self.api.balance().await.context("Failed to get account info")?)
            }
            ExtendedCommand::GetPositions => {
                to_plain(&self.api.positions(None).await.context("Failed to get positions")?)
            }
            ExtendedCommand::GetOrders => {
                let market = params.text("market_name");
                to_plain(&self.api.open_orders(market.as_deref()).await.context("Failed to get orders")?)
            }
            ExtendedCommand::GetOrderById => self.order_by_id(params).await,
            ExtendedCommand::PlaceOrder => self.place_order(params).await.context("Failed to place order"),
            ExtendedCommand::CancelOrder => self.cancel_by_external_id(params).await.context("Cancel order failed"),
            ExtendedCommand::CancelOrderByExternalId => self
                .cancel_by_external_id(params)
                .await
                .context("Cancel order by external ID failed"),
            ExtendedCommand::CancelAllOrders => self
                .cancel_all_orders(params)
                .await
                .context("Failed to cancel all orders"),
            ExtendedCommand::ClosePosition => self.close_position(params).await.context("Failed to close position"),
            ExtendedCommand::GetOrderbook => {
                let market = params.require_text("market_name")?;
                to_plain(&self.api.orderbook(&market).await.context("Failed to get orderbook")?)
            }
            ExtendedCommand::GetTrades => self.trades(params).await.context("Failed to get trades"),
            ExtendedCommand::Withdraw => self.withdraw(params).await.context("Failed to submit withdrawal"),
            ExtendedCommand::GetBridgeConfig => self.api.bridge_config().await.context("Failed to get bridge config"),
            ExtendedCommand::GetBridgeQuote => self.bridge_quote(params).await.context("Failed to get bridge quote"),
            ExtendedCommand::CommitBridgeQuote => self
                .commit_bridge_quote(params)
                .await
                .context("Failed to commit bridge quote"),
            ExtendedCommand::TestParams => Ok(self.test_params(params)),
            ExtendedCommand::GetPublicKey => public_key(params),
        }
    }
}

pub struct ExtendedFactory {
    config: Config,
}

impl ExtendedFactory {
    pub fn new(config: Config) -> Self {
        Self { config }
    }
}

#[async_trait]
impl HandlerFactory for ExtendedFactory {
    type Handler = ExtendedService;

    async fn build(&self, params: &Params) -> Result<ExtendedService> {
        let settings = ExtendedSettings::from_params(params, self.config.default_environment.as_deref())?;
        let client = ExtendedClient::new(
            &self.config,
            settings.env.base_url(&self.config),
            settings.api_key.clone(),
        )?;
        ExtendedService::new(settings, Box::new(client))
    }

    async fn detached(&self, command: ExtendedCommand, params: &Params) -> Option<Result<Value>> {
        match command {
            ExtendedCommand::GetPublicKey => Some(public_key(params)),
            _ => None,
        }
    }
}

fn public_key(params: &Params) -> Result<Value> {
    let private_key = params
        .text("private_key")
        .ok_or_else(|| BridgeError::MissingCredentials("private_key".into()))?;
    Ok(json!({ "starkKey": stark::public_key_hex(&private_key)? }))
}

fn salt() -> u64 {
    rand::random::<u32>() as u64 & 0x7fff_ffff
}

/// Settlement expiry in seconds, rounded up, plus the venue's grace period.
fn settlement_expiration(expiry_ms: i64) -> u64 {
    let secs = (expiry_ms.max(0) as u64).div_ceil(1000);
    secs + SETTLEMENT_GRACE_SECS
}

fn positive(params: &Params, key: &str) -> Result<Decimal, BridgeError> {
    let value = params.require_decimal(key)?;
    if value <= Decimal::ZERO {
        return Err(BridgeError::invalid(key, "must be positive"));
    }
    Ok(value)
}

fn round_to_step(value: Decimal, step: Decimal, rounding: RoundingStrategy) -> Result<Decimal> {
    if step <= Decimal::ZERO {
        return Ok(value);
    }
    let steps = value
        .checked_div(step)
        .with_context(|| format!("{} / {} overflows", value, step))?;
    stark::product(steps.round_dp_with_strategy(0, rounding), step)
}

/// Aggressive limit for a market close: through the book by the slippage band.
fn close_price(reference: Decimal, side: OrderSide, tick: Decimal) -> Result<Decimal> {
    match side {
        OrderSide::Buy => round_to_step(
            stark::product(reference, Decimal::ONE + CLOSE_SLIPPAGE)?,
            tick,
            RoundingStrategy::AwayFromZero,
        ),
        OrderSide::Sell => round_to_step(
            stark::product(reference, Decimal::ONE - CLOSE_SLIPPAGE)?,
            tick,
            RoundingStrategy::ToZero,
        ),
    }
}
