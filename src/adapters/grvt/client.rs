use super::env::Endpoints;
use crate::core::normalize::unwrap_envelope;
use crate::core::schema::grvt::*;
use crate::core::types::Config;
use crate::ports::grvt::{ApiCredentials, GrvtApi, GrvtConnector};
use anyhow::Result;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, COOKIE, SET_COOKIE};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::Mutex;

const SESSION_COOKIE: &str = "gravity";
const ACCOUNT_HEADER: &str = "X-Grvt-Account-Id";

#[derive(Debug, Clone, PartialEq)]
struct Session {
    cookie: String,
    account_id: String,
}

#[derive(Debug, Clone, Copy)]
enum Host {
    Trades,
    MarketData,
}

/// GRVT REST client for one API key.
///
/// The session cookie lives in a single slot: a login replaces it, a 401
/// clears it. Only one `gravity` cookie is ever sent.
pub struct GrvtClient {
    client: reqwest::Client,
    endpoints: Endpoints,
    credentials: ApiCredentials,
    session: Mutex<Option<Session>>,
}

impl GrvtClient {
    pub fn new(config: &Config, endpoints: Endpoints, credentials: ApiCredentials) -> Result<Self> {
        Ok(Self {
            client: config.http_client()?,
            endpoints,
            credentials,
            session: Mutex::new(None),
        })
    }

    async fn login(&self) -> Result<Session> {
        let url = format!("{}/auth/api_key/login", self.endpoints.edge);
        let resp = self
            .client
            .post(&url)
            .header(COOKIE, "rm=true;")
            .json(&serde_json::json!({ "api_key": self.credentials.api_key }))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let err_body = resp.text().await.unwrap_or_default();
            anyhow::bail!("GRVT login -> {} : {}", status, describe_error(&err_body));
        }

        let cookie = session_cookie(resp.headers())
            .ok_or_else(|| anyhow::anyhow!("GRVT login returned no {} session cookie", SESSION_COOKIE))?;
        let account_id = resp
            .headers()
            .get(ACCOUNT_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .unwrap_or_else(|| self.credentials.account_id.clone());

        Ok(Session { cookie, account_id })
    }

    async fn session(&self) -> Result<Session> {
        let mut slot = self.session.lock().await;
        if let Some(session) = slot.as_ref() {
            return Ok(session.clone());
        }
        let fresh = self.login().await?;
        tracing::debug!("GRVT session opened for account {}", fresh.account_id);
        *slot = Some(fresh.clone());
        Ok(fresh)
    }

    async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        host: Host,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let (value, text) = self.send(host, path, body).await?;
        unwrap_envelope(value).map_err(|e| {
            tracing::error!(
                "Deserialize error on {}: {} (body: {}...)",
                path,
                e,
                text.chars().take(300).collect::<String>()
            );
            e.into()
        })
    }

    /// Raw JSON body of a successful call, plus its text for diagnostics.
    async fn send<B: Serialize + ?Sized>(&self, host: Host, path: &str, body: &B) -> Result<(Value, String)> {
        let base = match host {
            Host::Trades => &self.endpoints.trades,
            Host::MarketData => &self.endpoints.market_data,
        };
        let url = format!("{}{}", base, path);

        let mut req = self.client.post(&url).json(body);
        if let Host::Trades = host {
            let session = self.session().await?;
            req = req
                .header(COOKIE, format!("{}={}", SESSION_COOKIE, session.cookie))
                .header(ACCOUNT_HEADER, session.account_id);
        }

        let resp = req.send().await?;
        let status = resp.status();
        let text = resp.text().await?;

        if status == StatusCode::UNAUTHORIZED {
            tracing::warn!("GRVT {} -> 401, dropping session", path);
            *self.session.lock().await = None;
        }
        if !status.is_success() {
            anyhow::bail!("GRVT POST {} -> {} : {}", path, status, describe_error(&text));
        }

        let value: Value = serde_json::from_str(&text)?;
        if let Some(err) = body_error(&value) {
            anyhow::bail!("GRVT POST {} -> {}", path, err);
        }
        Ok((value, text))
    }
}

/// Value of the last `gravity` cookie the server set.
fn session_cookie(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter_map(|raw| raw.split(';').next())
        .filter_map(|pair| pair.trim().strip_prefix(&format!("{}=", SESSION_COOKIE)).map(str::to_string))
        .filter(|v| !v.is_empty())
        .last()
}

fn body_error(value: &Value) -> Option<String> {
    let code = value.get("code")?.as_i64()?;
    let message = value.get("message").and_then(Value::as_str).unwrap_or_default();
    Some(format!("GRVT error {}: {}", code, message))
}

fn describe_error(body: &str) -> String {
    match serde_json::from_str::<ApiErrorBody>(body) {
        Ok(err) if !err.message.is_empty() => format!("GRVT error {}: {}", err.code, err.message),
        _ => body.to_string(),
    }
}

#[async_trait]
impl GrvtApi for GrvtClient {
    async fn account_summary(&self, sub_account_id: &str) -> Result<SubAccountSummary> {
        let body = serde_json::json!({ "sub_account_id": sub_account_id });
        self.post(Host::Trades, "/full/v1/account_summary", &body).await
    }

    async fn all_instruments(&self) -> Result<Vec<Instrument>> {
        let body = serde_json::json!({ "is_active": true });
        self.post(Host::MarketData, "/full/v1/all_instruments", &body).await
    }

    async fn positions(&self, sub_account_id: &str) -> Result<Vec<Position>> {
        let body = serde_json::json!({ "sub_account_id": sub_account_id });
        self.post(Host::Trades, "/full/v1/positions", &body).await
    }

    async fn create_order(&self, order: &Order) -> Result<CreatedOrder> {
        let body = serde_json::json!({ "order": order });
        self.post(Host::Trades, "/full/v1/create_order", &body).await
    }

    async fn cancel_order(&self, request: &CancelOrderRequest) -> Result<()> {
        let _: Value = self.post(Host::Trades, "/full/v1/cancel_order", request).await?;
        Ok(())
    }

    async fn cancel_all_orders(&self, request: &CancelAllOrdersRequest) -> Result<usize> {
        let result: Value = self.post(Host::Trades, "/full/v1/cancel_all_orders", request).await?;
        Ok(result.as_array().map(Vec::len).unwrap_or(0))
    }

    async fn transfer(&self, request: &TransferRequest) -> Result<TransferAck> {
        self.post(Host::Trades, "/full/v1/transfer", request).await
    }

    async fn transfer_history(&self, request: &TransferHistoryRequest) -> Result<Page<TransferRecord>> {
        // The cursor sits next to `result`, so the envelope is kept.
        let (value, _) = self.send(Host::Trades, "/full/v1/transfer_history", request).await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn withdrawal(&self, request: &WithdrawalRequest) -> Result<WithdrawalAck> {
        self.post(Host::Trades, "/full/v1/withdrawal", request).await
    }

    async fn order_history(&self, request: &OrderHistoryRequest) -> Result<Vec<RawOrder>> {
        let result: Value = self.post(Host::Trades, "/full/v1/order_history", request).await?;
        Ok(match result {
            Value::Array(orders) => orders,
            _ => Vec::new(),
        })
    }

    async fn vault_invest(&self, request: &VaultRequest) -> Result<Ack> {
        self.post(Host::Trades, "/full/v1/vault_invest", request).await
    }

    async fn vault_redeem(&self, request: &VaultRequest) -> Result<Ack> {
        self.post(Host::Trades, "/full/v1/vault_redeem", request).await
    }
}

/// Opens [`GrvtClient`]s against one environment's hosts.
pub struct HttpConnector {
    config: Config,
    endpoints: Endpoints,
}

impl HttpConnector {
    pub fn new(config: Config, endpoints: Endpoints) -> Self {
        Self { config, endpoints }
    }
}

impl GrvtConnector for HttpConnector {
    fn connect(&self, credentials: &ApiCredentials) -> Result<Box<dyn GrvtApi>> {
        Ok(Box::new(GrvtClient::new(
            &self.config,
            self.endpoints.clone(),
            credentials.clone(),
        )?))
    }
}
