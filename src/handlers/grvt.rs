use crate::adapters::grvt::client::HttpConnector;
use crate::adapters::grvt::env::{Endpoints, GrvtEnv};
use crate::adapters::grvt::signing::{Eip712Signer, TransferFields, VaultAction, VaultFields};
use crate::core::dispatch::{CommandSet, Handler, HandlerFactory};
use crate::core::error::BridgeError;
use crate::core::params::Params;
use crate::core::schema::grvt::*;
use crate::core::types::Config;
use crate::ports::grvt::{ApiCredentials, GrvtApi, GrvtConnector};
use anyhow::{Context, Result};
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use std::collections::HashMap;

/// Signed payloads stay valid for 20 days.
const SIGNATURE_TTL_NS: i64 = 20 * 24 * 60 * 60 * 1_000_000_000;
const FUNDING_SUB_ACCOUNT: &str = "0";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrvtCommand {
    GetAccountInfo,
    GetMarkets,
    GetPositions,
    PlaceOrder,
    CancelOrderByExternalId,
    CancelAllOrders,
    Transfer,
    TransferHistory,
    Withdraw,
    GetOrderHistory,
    VaultInvest,
    VaultRedeem,
    TestParams,
}

impl CommandSet for GrvtCommand {
    const ALL: &'static [Self] = &[
        GrvtCommand::GetAccountInfo,
        GrvtCommand::GetMarkets,
        GrvtCommand::GetPositions,
        GrvtCommand::PlaceOrder,
        GrvtCommand::CancelOrderByExternalId,
        GrvtCommand::CancelAllOrders,
        GrvtCommand::Transfer,
        GrvtCommand::TransferHistory,
        GrvtCommand::Withdraw,
        GrvtCommand::GetOrderHistory,
        GrvtCommand::VaultInvest,
        GrvtCommand::VaultRedeem,
        GrvtCommand::TestParams,
    ];

    fn name(self) -> &'static str {
        match self {
            GrvtCommand::GetAccountInfo => "get_account_info",
            GrvtCommand::GetMarkets => "get_markets",
            GrvtCommand::GetPositions => "get_positions",
            GrvtCommand::PlaceOrder => "place_order",
            GrvtCommand::CancelOrderByExternalId => "cancel_order_by_external_id",
            GrvtCommand::CancelAllOrders => "cancel_all_orders",
            GrvtCommand::Transfer => "transfer",
            GrvtCommand::TransferHistory => "transfer_history",
            GrvtCommand::Withdraw => "withdraw",
            GrvtCommand::GetOrderHistory => "get_order_history",
            GrvtCommand::VaultInvest => "vault_invest",
            GrvtCommand::VaultRedeem => "vault_redeem",
            GrvtCommand::TestParams => "test_params",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FundingCredentials {
    pub address: Option<String>,
    pub private_key: Option<String>,
    pub api_key: Option<String>,
}

impl FundingCredentials {
    fn from_params(params: &Params) -> Self {
        Self {
            address: params.text("funding_address"),
            private_key: params.text("funding_private_key"),
            api_key: params.text("funding_api_key"),
        }
    }

    /// Per-request values win over the ones given at startup.
    fn overlay(&self, params: &Params) -> Self {
        let fresh = Self::from_params(params);
        Self {
            address: fresh.address.or_else(|| self.address.clone()),
            private_key: fresh.private_key.or_else(|| self.private_key.clone()),
            api_key: fresh.api_key.or_else(|| self.api_key.clone()),
        }
    }

    fn require(self) -> Result<(String, String, String)> {
        let address = self.address.context("Funding address is required")?;
        let private_key = self.private_key.context("Funding private key is required")?;
        let api_key = self.api_key.context("Funding API key is required")?;
        Ok((address, private_key, api_key))
    }
}

/// Account settings taken from the first request.
#[derive(Debug, Clone, PartialEq)]
pub struct GrvtSettings {
    pub account_id: String,
    pub private_key: String,
    pub api_key: String,
    pub funding: FundingCredentials,
    pub env: GrvtEnv,
}

impl GrvtSettings {
    pub fn from_params(params: &Params, default_env: Option<&str>) -> Result<Self, BridgeError> {
        let account_id = params.text_any(&["trading_account_id", "account_id"]);
        let private_key = params.text_any(&["trading_private_key", "private_key"]);
        let api_key = params.text_any(&["trading_api_key", "api_key"]);

        let (Some(account_id), Some(private_key), Some(api_key)) = (account_id, private_key, api_key) else {
            return Err(BridgeError::MissingCredentials(
                "account_id, private_key, api_key".into(),
            ));
        };

        let env_name = params.text("environment").or_else(|| default_env.map(str::to_string));
        Ok(Self {
            account_id,
            private_key,
            api_key,
            funding: FundingCredentials::from_params(params),
            env: GrvtEnv::from_param(env_name.as_deref()),
        })
    }
}

pub struct GrvtService {
    api: Box<dyn GrvtApi>,
    connector: Box<dyn GrvtConnector>,
    signer: Eip712Signer,
    settings: GrvtSettings,
}

impl GrvtService {
    pub fn new(settings: GrvtSettings, connector: Box<dyn GrvtConnector>) -> Result<Self> {
        let signer = Eip712Signer::from_hex(&settings.private_key, settings.env.chain_id())?;
        let api = connector.connect(&ApiCredentials {
            account_id: settings.account_id.clone(),
            api_key: settings.api_key.clone(),
        })?;
        tracing::info!(
            "GRVT {} ready for sub-account {} (signer {})",
            settings.env.name(),
            settings.account_id,
            signer.address()
        );
        Ok(Self {
            api,
            connector,
            signer,
            settings,
        })
    }

    async fn account_info(&self) -> Result<Value> {
        let summary = self.api.account_summary(&self.settings.account_id).await?;
        Ok(json!({
            "available_for_trade": summary.available_balance.to_string(),
            "available_for_withdrawal": summary.available_balance.to_string(),
            "unrealised_pnl": summary.unrealized_pnl.to_string(),
            "realised_pnl": summary.realized_pnl.to_string(),
            "total_balance": summary.total_equity.to_string(),
        }))
    }

    async fn markets(&self) -> Result<Value> {
        let instruments = self.api.all_instruments().await?;
        let markets: Vec<Value> = instruments
            .iter()
            .map(|inst| {
                json!({
                    "name": inst.instrument,
                    "instrument": inst.instrument,
                    "active": true,
                    "market_stats": {
                        "ask_price": or_default(inst.ask_price, "0"),
                        "bid_price": or_default(inst.bid_price, "0"),
                        "funding_rate": or_default(inst.funding_rate, "0"),
                        "open_interest": or_default(inst.open_interest, "0"),
                    },
                    "trading_config": {
                        "min_order_size": or_default(inst.min_size, "0.001"),
                        "min_order_size_change": or_default(inst.size_step, "0.001"),
                        "min_price_change": or_default(inst.tick_size, "0.01"),
                        "max_market_order_value": or_default(inst.max_market_order, "1000000"),
                        "max_limit_order_value": or_default(inst.max_limit_order, "1000000"),
                    },
                })
            })
            .collect();
        Ok(Value::Array(markets))
    }

    async fn positions(&self) -> Result<Value> {
        let positions = self.api.positions(&self.settings.account_id).await?;
        let rows = positions
            .iter()
            .map(|pos| {
                let side = if pos.size > Decimal::ZERO { "long" } else { "short" };
                let value = pos
                    .size
                    .checked_mul(pos.mark_price)
                    .with_context(|| format!("position value of {} overflows", pos.instrument))?;
                Ok(json!({
                    "market": pos.instrument,
                    "instrument": pos.instrument,
                    "side": side,
                    "size": pos.size.to_string(),
                    "open_price": pos.entry_price.to_string(),
                    "entry_price": pos.entry_price.to_string(),
                    "mark_price": pos.mark_price.to_string(),
                    "liquidation_price": pos.est_liquidation_price.to_string(),
                    "unrealised_pnl": pos.unrealized_pnl.to_string(),
                    "realised_pnl": pos.realized_pnl.to_string(),
                    "value": value.abs().to_string(),
                    "last_order_id": pos.last_order_id,
                    "last_order_status": pos.last_order_status,
                }))
            })
            .collect::<Result<Vec<Value>>>()?;
        Ok(Value::Array(rows))
    }

    async fn place_order(&self, params: &Params) -> Result<Value> {
        let market = params.require_text("market_name")?;
        let side = params.require_text("side")?;
        let amount = params.require_text("amount")?;
        let price = params.text_or("price", "0");
        let is_market = params.text_or("order_type", "LIMIT") == "MARKET";

        let nonce: u32 = rand::random();
        let client_order_id = rand::random::<u32>().to_string();
        let order = Order {
            sub_account_id: self.settings.account_id.clone(),
            is_market,
            time_in_force: if is_market {
                TimeInForce::ImmediateOrCancel
            } else {
                TimeInForce::GoodTillTime
            },
            post_only: params.flag("post_only")?,
            reduce_only: params.flag("reduce_only")?,
            legs: vec![OrderLeg {
                instrument: market,
                size: amount,
                limit_price: price,
                is_buying_asset: side == "BUY",
            }],
            signature: Signature::unsigned(expiration()?, nonce),
            metadata: OrderMetadata {
                client_order_id: client_order_id.clone(),
            },
        };

        let instruments: HashMap<String, Instrument> = self
            .api
            .all_instruments()
            .await
            .context("Failed to get instruments")?
            .into_iter()
            .map(|inst| (inst.instrument.clone(), inst))
            .collect();
        let signature = self.signer.sign_order(&order, &instruments)?;
        let order = Order { signature, ..order };

        let created = self.api.create_order(&order).await?;
        let venue_id = created.order_id.clone();
        let order_id = match venue_id.as_deref() {
            None | Some("") | Some("0x00") => client_order_id.clone(),
            Some(id) => id.to_string(),
        };
        let status = created
            .state
            .and_then(|s| s.status)
            .unwrap_or_else(|| "NEW".to_string());

        tracing::info!("GRVT order {} placed ({})", order_id, status);
        Ok(json!({
            "external_id": order_id,
            "order_id": order_id,
            "client_order_id": client_order_id,
            "grvt_order_id": venue_id,
            "status": status,
        }))
    }

    async fn cancel_order(&self, params: &Params) -> Result<Value> {
        let external_id = params.require_text("external_id")?;
        let mut request = CancelOrderRequest {
            sub_account_id: self.settings.account_id.clone(),
            ..CancelOrderRequest::default()
        };
        // Numeric ids are the client order ids this bridge generates.
        if external_id.trim().parse::<i128>().is_ok() {
            request.client_order_id = Some(external_id);
        } else {
            request.order_id = Some(external_id);
        }
        self.api.cancel_order(&request).await?;
        Ok(json!({ "success": true }))
    }

    async fn cancel_all_orders(&self, params: &Params) -> Result<Value> {
        let request = CancelAllOrdersRequest {
            sub_account_id: self.settings.account_id.clone(),
            instrument: params.text("instrument"),
        };
        let cancelled = self.api.cancel_all_orders(&request).await?;
        Ok(json!({ "success": true, "cancelled_count": cancelled }))
    }

    fn funding_session(&self, trading_account_id: &str, api_key: &str) -> Result<Box<dyn GrvtApi>> {
        self.connector.connect(&ApiCredentials {
            account_id: trading_account_id.to_string(),
            api_key: api_key.to_string(),
        })
    }

    async fn transfer(&self, params: &Params) -> Result<Value> {
        let (funding_address, funding_key, funding_api_key) = self.settings.funding.overlay(params).require()?;
        let trading_account_id = params
            .text("trading_account_id")
            .unwrap_or_else(|| self.settings.account_id.clone());
        let amount = params.require_text("amount")?;
        let num_tokens = params.require_decimal("amount")?;
        let direction = params.text_or("direction", "to_trading");
        let currency = params.text_or("currency", "USDC");

        let (from_sub, to_sub) = if direction == "to_trading" {
            (FUNDING_SUB_ACCOUNT.to_string(), trading_account_id.clone())
        } else {
            (trading_account_id.clone(), FUNDING_SUB_ACCOUNT.to_string())
        };

        let signer = Eip712Signer::from_hex(&funding_key, self.settings.env.chain_id())
            .context("Invalid funding private key")?;
        let fields = TransferFields {
            from_account: &funding_address,
            from_sub_account: &from_sub,
            to_account: &funding_address,
            to_sub_account: &to_sub,
            currency: &currency,
            num_tokens,
        };
        let signature = signer.sign_transfer(&fields, expiration()?, rand::random())?;

        let request = TransferRequest {
            from_account_id: funding_address.clone(),
            from_sub_account_id: from_sub.clone(),
            to_account_id: funding_address.clone(),
            to_sub_account_id: to_sub.clone(),
            currency: currency.clone(),
            num_tokens: amount.clone(),
            signature,
            transfer_type: "STANDARD".into(),
            transfer_metadata: String::new(),
        };
        let ack = self
            .funding_session(&trading_account_id, &funding_api_key)?
            .transfer(&request)
            .await?;

        tracing::info!("GRVT transfer {} {} {} ({})", direction, amount, currency, ack.tx_id);
        Ok(json!({
            "success": true,
            "tx_id": ack.tx_id,
            "ack": ack.ack,
            "direction": direction,
            "amount": amount,
            "currency": currency,
            "from_account": funding_address,
            "from_sub_account": from_sub,
            "to_sub_account": to_sub,
        }))
    }

    async fn transfer_history(&self, params: &Params) -> Result<Value> {
        let request = TransferHistoryRequest {
            sub_account_id: self.settings.account_id.clone(),
            limit: params.u64_opt("limit")?,
            cursor: params.text("cursor"),
        };
        let page = self.api.transfer_history(&request).await?;
        let transfers: Vec<Value> = page
            .result
            .iter()
            .map(|t| {
                json!({
                    "tx_id": t.tx_id,
                    "from_account": t.from_account_id,
                    "from_sub_account": t.from_sub_account_id,
                    "to_account": t.to_account_id,
                    "to_sub_account": t.to_sub_account_id,
                    "currency": t.currency,
                    "amount": t.num_tokens,
                    "timestamp": t.event_time,
                    "type": t.transfer_type,
                })
            })
            .collect();
        Ok(json!({ "transfers": transfers, "next": page.next }))
    }

    async fn withdraw(&self, params: &Params) -> Result<Value> {
        let request = WithdrawalRequest {
            from_account_id: self.settings.account_id.clone(),
            from_sub_account_id: FUNDING_SUB_ACCOUNT.to_string(),
            currency: params.text_or("currency", "USDC"),
            num_tokens: params.require_text("amount")?,
            chain_id: withdrawal_chain(&params.text_or("chain_id", "STRK")),
            stark_address: params.text("stark_address"),
        };
        let ack = self.api.withdrawal(&request).await?;
        Ok(json!({ "withdrawal_id": ack.withdrawal_id }))
    }

    async fn order_history(&self, params: &Params) -> Result<Value> {
        let request = OrderHistoryRequest {
            sub_account_id: self.settings.account_id.clone(),
            limit: params.u64_or("limit", 50)?,
            instrument: params.text("instrument"),
        };
        Ok(Value::Array(self.api.order_history(&request).await?))
    }

    async fn vault(&self, action: VaultAction, params: &Params) -> Result<Value> {
        let (funding_address, funding_key, funding_api_key) = self.settings.funding.overlay(params).require()?;
        let trading_account_id = params
            .text("trading_account_id")
            .unwrap_or_else(|| self.settings.account_id.clone());
        let vault_id = params.require_text("vault_id")?;
        let vault_number = params.require_u64("vault_id")?;
        let amount = params.require_text("amount")?;
        let num_tokens = params.require_decimal("amount")?;
        let currency = params.text_or("currency", "USDC");

        let signer = Eip712Signer::from_hex(&funding_key, self.settings.env.chain_id())
            .context("Invalid funding private key")?;
        let fields = VaultFields {
            main_account: &funding_address,
            vault_id: vault_number,
            currency: &currency,
            num_tokens,
        };
        let signature = signer.sign_vault(action, &fields, expiration()?, rand::random())?;

        let request = VaultRequest {
            main_account_id: funding_address,
            vault_id: vault_id.clone(),
            currency: currency.clone(),
            num_tokens: amount.clone(),
            signature,
        };
        let session = self.funding_session(&trading_account_id, &funding_api_key)?;
        let ack = match action {
            VaultAction::Invest => session.vault_invest(&request).await?,
            VaultAction::Redeem => session.vault_redeem(&request).await?,
        };

        Ok(json!({
            "success": true,
            "ack": ack.ack,
            "vault_id": vault_id,
            "amount": amount,
            "currency": currency,
        }))
    }

    fn test_params(&self, params: &Params) -> Value {
        json!({
            "success": true,
            "message": "Parameters received correctly",
            "received_params": {
                "account_id": params.text_any(&["trading_account_id", "account_id"]),
                "api_key": mask_any(params, &["trading_api_key", "api_key"]),
                "private_key": mask_any(params, &["trading_private_key", "private_key"]),
                "funding_address": params.text("funding_address"),
                "funding_api_key": params.masked("funding_api_key"),
                "funding_private_key": params.masked("funding_private_key"),
                "environment": params.text("environment"),
                "all_args_keys": params.keys(),
            },
            "service_config": {
                "environment": self.settings.env.name(),
                "chain_id": self.settings.env.chain_id(),
                "signer": self.signer.address(),
            },
        })
    }
}

#[async_trait]
impl Handler for GrvtService {
    type Command = GrvtCommand;

    async fn handle(&self, command: GrvtCommand, params: &Params) -> Result<Value> {
        match command {
            GrvtCommand::GetAccountInfo => self.account_info().await,
            GrvtCommand::GetMarkets => self.markets().await,
            GrvtCommand::GetPositions => self.positions().await,
            GrvtCommand::PlaceOrder => self.place_order(params).await,
            GrvtCommand::CancelOrderByExternalId => self.cancel_order(params).await,
            GrvtCommand::CancelAllOrders => self.cancel_all_orders(params).await,
            GrvtCommand::Transfer => self.transfer(params).await,
            GrvtCommand::TransferHistory => self.transfer_history(params).await,
            GrvtCommand::Withdraw => self.withdraw(params).await,
            GrvtCommand::GetOrderHistory => self.order_history(params).await,
            GrvtCommand::VaultInvest => self.vault(VaultAction::Invest, params).await,
            GrvtCommand::VaultRedeem => self.vault(VaultAction::Redeem, params).await,
            GrvtCommand::TestParams => Ok(self.test_params(params)),
        }
    }
}

pub struct GrvtFactory {
    config: Config,
}

impl GrvtFactory {
    pub fn new(config: Config) -> Self {
        Self { config }
    }
}

#[async_trait]
impl HandlerFactory for GrvtFactory {
    type Handler = GrvtService;

    async fn build(&self, params: &Params) -> Result<GrvtService> {
        let init = || -> Result<GrvtService> {
            let settings = GrvtSettings::from_params(params, self.config.default_environment.as_deref())?;
            let endpoints = Endpoints::resolve(settings.env, &self.config);
            let connector = HttpConnector::new(self.config.clone(), endpoints);
            GrvtService::new(settings, Box::new(connector))
        };
        init().map_err(|e| anyhow::anyhow!("Failed to initialize GRVT API: {:#}", e))
    }
}

fn expiration() -> Result<i64> {
    let now = chrono::Utc::now()
        .timestamp_nanos_opt()
        .context("system clock out of range")?;
    Ok(now + SIGNATURE_TTL_NS)
}

fn or_default(value: Option<Decimal>, default: &str) -> String {
    value
        .map(|v| v.to_string())
        .unwrap_or_else(|| default.to_string())
}

fn mask_any(params: &Params, keys: &[&str]) -> Value {
    keys.iter()
        .map(|k| params.masked(k))
        .find(|v| !v.is_null())
        .unwrap_or(Value::Null)
}

fn withdrawal_chain(raw: &str) -> String {
    match raw {
        "ETH" => "ETHEREUM".to_string(),
        "STRK" => "STARKNET".to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::dispatch::dispatch;
    use crate::core::params::MASKED;
    use std::sync::{Arc, Mutex};

    const TRADING_KEY: &str = "0x4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";
    const FUNDING_KEY: &str = "0x8da4ef21b864d2cc526dbdb2a120bd2874c36c9d0a1fb7f8c63d7f7a8b41de8f";
    const FUNDING_ADDRESS: &str = "0x63fac9201494f0bd17b9892b9fae4d52fe3bd377";

    #[derive(Default)]
    struct Calls {
        connected: Vec<ApiCredentials>,
        orders: Vec<Order>,
        cancels: Vec<CancelOrderRequest>,
        cancel_alls: Vec<CancelAllOrdersRequest>,
        transfers: Vec<TransferRequest>,
        vaults: Vec<VaultRequest>,
        withdrawals: Vec<WithdrawalRequest>,
    }

    #[derive(Clone, Default)]
    struct MockApi {
        calls: Arc<Mutex<Calls>>,
        venue_order_id: Option<String>,
    }

    #[async_trait]
    impl GrvtApi for MockApi {
        async fn account_summary(&self, _: &str) -> Result<SubAccountSummary> {
            Ok(serde_json::from_value(json!({
                "sub_account_id": "123",
                "total_equity": "1500.25",
                "available_balance": "1200.5",
                "unrealized_pnl": "-3.1"
            }))?)
        }

        async fn all_instruments(&self) -> Result<Vec<Instrument>> {
            Ok(serde_json::from_value(json!([{
                "instrument": "BTC_USDT_Perp",
                "instrument_hash": "0x030501",
                "base_decimals": 9,
                "quote_decimals": 6,
                "tick_size": "0.1",
                "min_size": "0.001"
            }]))?)
        }

        async fn positions(&self, _: &str) -> Result<Vec<Position>> {
            Ok(serde_json::from_value(json!([{
                "instrument": "BTC_USDT_Perp",
                "size": "-0.5",
                "entry_price": "60000",
                "mark_price": "61000",
                "est_liquidation_price": "70000"
            }]))?)
        }

        async fn create_order(&self, order: &Order) -> Result<CreatedOrder> {
            self.calls.lock().unwrap().orders.push(order.clone());
            Ok(CreatedOrder {
                order_id: self.venue_order_id.clone(),
                state: None,
            })
        }

        async fn cancel_order(&self, request: &CancelOrderRequest) -> Result<()> {
            self.calls.lock().unwrap().cancels.push(request.clone());
            Ok(())
        }

        async fn cancel_all_orders(&self, request: &CancelAllOrdersRequest) -> Result<usize> {
            self.calls.lock().unwrap().cancel_alls.push(request.clone());
            Ok(3)
        }

        async fn transfer(&self, request: &TransferRequest) -> Result<TransferAck> {
            self.calls.lock().unwrap().transfers.push(request.clone());
            Ok(TransferAck {
                ack: true,
                tx_id: "tx-1".into(),
            })
        }

        async fn transfer_history(&self, _: &TransferHistoryRequest) -> Result<Page<TransferRecord>> {
            Ok(Page {
                result: vec![TransferRecord {
                    tx_id: "tx-9".into(),
                    num_tokens: "10".into(),
                    transfer_type: "STANDARD".into(),
                    ..TransferRecord::default()
                }],
                next: "cursor-2".into(),
            })
        }

        async fn withdrawal(&self, request: &WithdrawalRequest) -> Result<WithdrawalAck> {
            self.calls.lock().unwrap().withdrawals.push(request.clone());
            Ok(WithdrawalAck {
                withdrawal_id: "w-1".into(),
            })
        }

        async fn order_history(&self, _: &OrderHistoryRequest) -> Result<Vec<RawOrder>> {
            Ok(vec![json!({"order_id": "0xabc", "price": 1.25})])
        }

        async fn vault_invest(&self, request: &VaultRequest) -> Result<Ack> {
            self.calls.lock().unwrap().vaults.push(request.clone());
            Ok(Ack { ack: true })
        }

        async fn vault_redeem(&self, request: &VaultRequest) -> Result<Ack> {
            self.calls.lock().unwrap().vaults.push(request.clone());
            Ok(Ack { ack: false })
        }
    }

    struct MockConnector {
        api: MockApi,
    }

    impl GrvtConnector for MockConnector {
        fn connect(&self, credentials: &ApiCredentials) -> Result<Box<dyn GrvtApi>> {
            self.api.calls.lock().unwrap().connected.push(credentials.clone());
            Ok(Box::new(self.api.clone()))
        }
    }

    fn params(value: Value) -> Params {
        match value {
            Value::Object(map) => Params::from(map),
            _ => unreachable!(),
        }
    }

    fn startup() -> Params {
        params(json!({
            "trading_account_id": "123",
            "trading_private_key": TRADING_KEY,
            "trading_api_key": "trading-api-key",
            "environment": "testnet"
        }))
    }

    fn service(api: MockApi) -> GrvtService {
        let settings = GrvtSettings::from_params(&startup(), None).unwrap();
        GrvtService::new(settings, Box::new(MockConnector { api })).unwrap()
    }

    #[test]
    fn credentials_accept_both_spellings() {
        let p = params(json!({"account_id": "1", "private_key": "0x1", "api_key": "k", "environment": "mainnet"}));
        let settings = GrvtSettings::from_params(&p, None).unwrap();
        assert_eq!(settings.account_id, "1");
        assert_eq!(settings.env, GrvtEnv::Prod);

        let err = GrvtSettings::from_params(&params(json!({"account_id": "1"})), None).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Missing required credentials: account_id, private_key, api_key"
        );
    }

    #[test]
    fn environment_falls_back_to_configured_default() {
        let p = params(json!({"account_id": "1", "private_key": "0x1", "api_key": "k"}));
        let settings = GrvtSettings::from_params(&p, Some("staging")).unwrap();
        assert_eq!(settings.env, GrvtEnv::Staging);
    }

    #[tokio::test]
    async fn account_info_is_reshaped() {
        let svc = service(MockApi::default());
        let out = svc.handle(GrvtCommand::GetAccountInfo, &Params::default()).await.unwrap();
        assert_eq!(out["available_for_trade"], "1200.5");
        assert_eq!(out["available_for_withdrawal"], "1200.5");
        assert_eq!(out["unrealised_pnl"], "-3.1");
        assert_eq!(out["realised_pnl"], "0");
        assert_eq!(out["total_balance"], "1500.25");
    }

    #[tokio::test]
    async fn markets_fill_missing_trading_config() {
        let svc = service(MockApi::default());
        let out = svc.handle(GrvtCommand::GetMarkets, &Params::default()).await.unwrap();
        let market = &out[0];
        assert_eq!(market["name"], "BTC_USDT_Perp");
        assert_eq!(market["market_stats"]["ask_price"], "0");
        assert_eq!(market["trading_config"]["min_price_change"], "0.1");
        assert_eq!(market["trading_config"]["min_order_size_change"], "0.001");
        assert_eq!(market["trading_config"]["max_limit_order_value"], "1000000");
    }

    #[tokio::test]
    async fn short_positions_report_absolute_value() {
        let svc = service(MockApi::default());
        let out = svc.handle(GrvtCommand::GetPositions, &Params::default()).await.unwrap();
        assert_eq!(out[0]["side"], "short");
        assert_eq!(out[0]["value"], "30500.0");
        assert_eq!(out[0]["liquidation_price"], "70000");
    }

    #[tokio::test]
    async fn market_orders_are_ioc_and_fall_back_to_client_id() {
        let api = MockApi {
            venue_order_id: Some("0x00".into()),
            ..MockApi::default()
        };
        let svc = service(api.clone());
        let p = params(json!({
            "market_name": "BTC_USDT_Perp",
            "side": "BUY",
            "amount": "0.01",
            "order_type": "MARKET"
        }));
        let out = svc.handle(GrvtCommand::PlaceOrder, &p).await.unwrap();

        assert_eq!(out["order_id"], out["client_order_id"]);
        assert_eq!(out["external_id"], out["client_order_id"]);
        assert_eq!(out["grvt_order_id"], "0x00");
        assert_eq!(out["status"], "NEW");

        let calls = api.calls.lock().unwrap();
        let order = &calls.orders[0];
        assert!(order.is_market);
        assert_eq!(order.time_in_force, TimeInForce::ImmediateOrCancel);
        assert_eq!(order.legs[0].limit_price, "0");
        assert!(order.legs[0].is_buying_asset);
        assert_eq!(order.signature.signer, "0x2c7536e3605d9c16a7a3d7b1898e529396a65c23");
    }

    #[tokio::test]
    async fn venue_order_id_is_kept_when_present() {
        let api = MockApi {
            venue_order_id: Some("0xfeed".into()),
            ..MockApi::default()
        };
        let svc = service(api);
        let p = params(json!({"market_name": "BTC_USDT_Perp", "side": "SELL", "amount": "1", "price": "65000"}));
        let out = svc.handle(GrvtCommand::PlaceOrder, &p).await.unwrap();
        assert_eq!(out["order_id"], "0xfeed");
        assert_ne!(out["client_order_id"], "0xfeed");
    }

    #[tokio::test]
    async fn unknown_instrument_surfaces_as_error() {
        let svc = service(MockApi::default());
        let p = params(json!({"market_name": "DOGE_USDT_Perp", "side": "BUY", "amount": "1", "price": "0.1"}));
        let response = dispatch(&svc, GrvtCommand::PlaceOrder, &p).await;
        assert_eq!(response, crate::core::types::CommandResponse::error("Unknown instrument: DOGE_USDT_Perp"));
    }

    #[tokio::test]
    async fn numeric_external_ids_cancel_by_client_id() {
        let api = MockApi::default();
        let svc = service(api.clone());
        svc.handle(GrvtCommand::CancelOrderByExternalId, &params(json!({"external_id": "42"})))
            .await
            .unwrap();
        svc.handle(GrvtCommand::CancelOrderByExternalId, &params(json!({"external_id": "0xabc"})))
            .await
            .unwrap();

        let calls = api.calls.lock().unwrap();
        assert_eq!(calls.cancels[0].client_order_id.as_deref(), Some("42"));
        assert_eq!(calls.cancels[0].order_id, None);
        assert_eq!(calls.cancels[1].order_id.as_deref(), Some("0xabc"));
    }

    #[tokio::test]
    async fn transfer_requires_funding_credentials() {
        let svc = service(MockApi::default());
        let err = svc
            .handle(GrvtCommand::Transfer, &params(json!({"amount": "10"})))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Funding address is required");

        let err = svc
            .handle(
                GrvtCommand::Transfer,
                &params(json!({"amount": "10", "funding_address": FUNDING_ADDRESS, "funding_private_key": FUNDING_KEY})),
            )
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Funding API key is required");
    }

    #[tokio::test]
    async fn transfer_to_trading_moves_from_sub_account_zero() {
        let api = MockApi::default();
        let svc = service(api.clone());
        let p = params(json!({
            "amount": 25,
            "funding_address": FUNDING_ADDRESS,
            "funding_private_key": FUNDING_KEY,
            "funding_api_key": "funding-api-key"
        }));
        let out = svc.handle(GrvtCommand::Transfer, &p).await.unwrap();

        assert_eq!(out["success"], true);
        assert_eq!(out["tx_id"], "tx-1");
        assert_eq!(out["direction"], "to_trading");
        assert_eq!(out["amount"], "25");
        assert_eq!(out["from_sub_account"], "0");
        assert_eq!(out["to_sub_account"], "123");

        let calls = api.calls.lock().unwrap();
        let funding_login = calls.connected.last().unwrap();
        assert_eq!(funding_login.api_key, "funding-api-key");
        assert_eq!(funding_login.account_id, "123");

        let transfer = &calls.transfers[0];
        assert_eq!(transfer.from_account_id, FUNDING_ADDRESS);
        assert_eq!(transfer.to_account_id, FUNDING_ADDRESS);
        assert_eq!(transfer.transfer_type, "STANDARD");
        assert_ne!(transfer.signature.signer, "0x2c7536e3605d9c16a7a3d7b1898e529396a65c23");
    }

    #[tokio::test]
    async fn transfer_to_funding_reverses_sub_accounts() {
        let svc = service(MockApi::default());
        let p = params(json!({
            "amount": "5",
            "direction": "to_funding",
            "currency": "USDT",
            "funding_address": FUNDING_ADDRESS,
            "funding_private_key": FUNDING_KEY,
            "funding_api_key": "funding-api-key"
        }));
        let out = svc.handle(GrvtCommand::Transfer, &p).await.unwrap();
        assert_eq!(out["from_sub_account"], "123");
        assert_eq!(out["to_sub_account"], "0");
        assert_eq!(out["currency"], "USDT");
    }

    #[tokio::test]
    async fn transfer_history_keeps_cursor() {
        let svc = service(MockApi::default());
        let out = svc.handle(GrvtCommand::TransferHistory, &Params::default()).await.unwrap();
        assert_eq!(out["next"], "cursor-2");
        assert_eq!(out["transfers"][0]["tx_id"], "tx-9");
        assert_eq!(out["transfers"][0]["amount"], "10");
        assert_eq!(out["transfers"][0]["type"], "STANDARD");
    }

    #[tokio::test]
    async fn withdraw_maps_chain_names() {
        let api = MockApi::default();
        let svc = service(api.clone());
        let out = svc
            .handle(GrvtCommand::Withdraw, &params(json!({"amount": "3", "chain_id": "ETH"})))
            .await
            .unwrap();
        assert_eq!(out, json!({"withdrawal_id": "w-1"}));

        let calls = api.calls.lock().unwrap();
        assert_eq!(calls.withdrawals[0].chain_id, "ETHEREUM");
        assert_eq!(calls.withdrawals[0].from_sub_account_id, "0");
        assert_eq!(calls.withdrawals[0].currency, "USDC");
    }

    #[tokio::test]
    async fn order_history_is_relayed_and_normalized() {
        let svc = service(MockApi::default());
        let response = dispatch(&svc, GrvtCommand::GetOrderHistory, &Params::default()).await;
        assert_eq!(
            response,
            crate::core::types::CommandResponse::data(json!([{"order_id": "0xabc", "price": "1.25"}]))
        );
    }

    #[tokio::test]
    async fn vault_redeem_uses_funding_session() {
        let api = MockApi::default();
        let svc = service(api.clone());
        let p = params(json!({
            "vault_id": "77",
            "amount": "12.5",
            "funding_address": FUNDING_ADDRESS,
            "funding_private_key": FUNDING_KEY,
            "funding_api_key": "funding-api-key"
        }));
        let out = svc.handle(GrvtCommand::VaultRedeem, &p).await.unwrap();
        assert_eq!(out["success"], true);
        assert_eq!(out["ack"], false);
        assert_eq!(out["vault_id"], "77");
        assert_eq!(out["amount"], "12.5");

        let calls = api.calls.lock().unwrap();
        assert_eq!(calls.vaults[0].main_account_id, FUNDING_ADDRESS);
        assert_eq!(calls.connected.last().unwrap().api_key, "funding-api-key");
    }

    #[tokio::test]
    async fn vault_invest_is_signed_by_the_funding_key() {
        let api = MockApi::default();
        let svc = service(api.clone());
        let p = params(json!({
            "vault_id": 91,
            "amount": "250",
            "currency": "USDT",
            "funding_address": FUNDING_ADDRESS,
            "funding_private_key": FUNDING_KEY,
            "funding_api_key": "funding-api-key"
        }));
        let out = svc.handle(GrvtCommand::VaultInvest, &p).await.unwrap();
        assert_eq!(
            out,
            json!({"success": true, "ack": true, "vault_id": "91", "amount": "250", "currency": "USDT"})
        );

        let funding_signer = Eip712Signer::from_hex(FUNDING_KEY, GrvtEnv::Testnet.chain_id()).unwrap();
        let calls = api.calls.lock().unwrap();
        let request = &calls.vaults[0];
        assert_eq!(request.vault_id, "91");
        assert_eq!(request.num_tokens, "250");
        assert_eq!(request.signature.signer, funding_signer.address());
        assert!(request.signature.v == 27 || request.signature.v == 28);
        assert_eq!(calls.connected.last().unwrap().api_key, "funding-api-key");
    }

    #[tokio::test]
    async fn vault_invest_needs_funding_credentials() {
        let svc = service(MockApi::default());
        let p = params(json!({"vault_id": 91, "amount": "250"}));
        let err = svc.handle(GrvtCommand::VaultInvest, &p).await.unwrap_err();
        assert_eq!(err.to_string(), "Funding address is required");
    }

    #[tokio::test]
    async fn cancel_all_reports_count_and_scopes_instrument() {
        let api = MockApi::default();
        let svc = service(api.clone());
        let out = svc
            .handle(GrvtCommand::CancelAllOrders, &params(json!({"instrument": "ETH_USDT_Perp"})))
            .await
            .unwrap();
        assert_eq!(out, json!({"success": true, "cancelled_count": 3}));

        svc.handle(GrvtCommand::CancelAllOrders, &Params::default()).await.unwrap();
        let calls = api.calls.lock().unwrap();
        assert_eq!(calls.cancel_alls[0].sub_account_id, "123");
        assert_eq!(calls.cancel_alls[0].instrument.as_deref(), Some("ETH_USDT_Perp"));
        assert_eq!(calls.cancel_alls[1].instrument, None);
    }

    #[tokio::test]
    async fn test_params_masks_secrets() {
        let svc = service(MockApi::default());
        let out = svc.handle(GrvtCommand::TestParams, &startup()).await.unwrap();
        let received = &out["received_params"];
        assert_eq!(received["api_key"], MASKED);
        assert_eq!(received["private_key"], MASKED);
        assert_eq!(received["account_id"], "123");
        assert_eq!(received["funding_private_key"], Value::Null);
        assert_eq!(out["service_config"]["chain_id"], 326);
    }

    #[tokio::test]
    async fn factory_reports_missing_credentials() {
        let factory = GrvtFactory::new(Config::default());
        let err = factory.build(&Params::default()).await.err().unwrap();
        assert_eq!(
            format!("{:#}", err),
            "Failed to initialize GRVT API: Missing required credentials: account_id, private_key, api_key"
        );
    }
}
