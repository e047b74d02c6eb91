use crate::core::schema::extended::*;
use crate::core::types::Config;
use crate::ports::extended::ExtendedApi;
use anyhow::Result;
use async_trait::async_trait;
use reqwest::Method;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

const API_KEY_HEADER: &str = "X-Api-Key";

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    status: String,
    #[serde(default)]
    data: Value,
    error: Option<ApiErrorBody>,
}

pub struct ExtendedClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl ExtendedClient {
    pub fn new(config: &Config, base_url: String, api_key: String) -> Result<Self> {
        Ok(Self {
            client: config.http_client()?,
            base_url,
            api_key,
        })
    }

    /// The `data` member of a successful response, `null` when absent.
    async fn request<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&B>,
    ) -> Result<Value> {
        let url = format!("{}{}", self.base_url, path);
        let mut req = self
            .client
            .request(method.clone(), &url)
            .header(API_KEY_HEADER, &self.api_key);
        if !query.is_empty() {
            req = req.query(query);
        }
        if let Some(b) = body {
            req = req.json(b);
        }

        let resp = req.send().await?;
        let status = resp.status();
        let text = resp.text().await?;

        if !status.is_success() {
            anyhow::bail!("Extended {} {} -> {} : {}", method, path, status, describe_error(&text));
        }
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }

        let envelope: Envelope = serde_json::from_str(&text).map_err(|e| {
            tracing::error!(
                "Unreadable body on {}: {} (body: {}...)",
                path,
                e,
                text.chars().take(300).collect::<String>()
            );
            anyhow::Error::from(e)
        })?;
        if envelope.status.eq_ignore_ascii_case("ERR") || envelope.error.is_some() {
            let err = envelope.error.unwrap_or(ApiErrorBody {
                code: 0,
                message: "unknown error".into(),
            });
            anyhow::bail!("Extended {} {} -> error {}: {}", method, path, err.code, err.message);
        }
        Ok(envelope.data)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T> {
        let data = self.request(Method::GET, path, query, None::<&Value>).await?;
        decode(path, data)
    }
}

fn decode<T: DeserializeOwned>(path: &str, data: Value) -> Result<T> {
    serde_json::from_value::<T>(data.clone()).map_err(|e| {
        tracing::error!(
            "Deserialize error on {}: {} (data: {}...)",
            path,
            e,
            data.to_string().chars().take(300).collect::<String>()
        );
        e.into()
    })
}

fn describe_error(body: &str) -> String {
    #[derive(Deserialize)]
    struct ErrOnly {
        error: ApiErrorBody,
    }
    match serde_json::from_str::<ErrOnly>(body) {
        Ok(e) => format!("error {}: {}", e.error.code, e.error.message),
        Err(_) => body.to_string(),
    }
}

fn market_filter(market: Option<&str>) -> Vec<(&'static str, String)> {
    market
        .map(|m| vec![("market", m.to_string())])
        .unwrap_or_default()
}

#[async_trait]
impl ExtendedApi for ExtendedClient {
    async fn markets(&self, names: &[String]) -> Result<Vec<Market>> {
        let query: Vec<(&str, String)> = names.iter().map(|n| ("market", n.clone())).collect();
        self.get("/info/markets", &query).await
    }

    async fn balance(&self) -> Result<Balance> {
        self.get("/user/balance", &[]).await
    }

    async fn positions(&self, market: Option<&str>) -> Result<Vec<Position>> {
        self.get("/user/positions", &market_filter(market)).await
    }

    async fn open_orders(&self, market: Option<&str>) -> Result<Vec<OpenOrder>> {
        self.get("/user/orders", &market_filter(market)).await
    }

    async fn account_trades(&self, market: &str, limit: u64) -> Result<Vec<AccountTrade>> {
        let query = [("market", market.to_string()), ("limit", limit.to_string())];
        self.get("/user/trades", &query).await
    }

    async fn orderbook(&self, market: &str) -> Result<Orderbook> {
        self.get(&format!("/info/markets/{}/orderbook", market), &[]).await
    }

    async fn market_trades(&self, market: &str) -> Result<Vec<PublicTrade>> {
        self.get(&format!("/info/markets/{}/trades", market), &[]).await
    }

    async fn fees(&self, market: &str) -> Result<Vec<FeeSchedule>> {
        self.get("/user/fees", &[("market", market.to_string())]).await
    }

    async fn place_order(&self, order: &NewOrder) -> Result<PlacedOrder> {
        let data = self.request(Method::POST, "/user/order", &[], Some(order)).await?;
        decode("/user/order", data)
    }

    async fn cancel_order(&self, order_id: i64) -> Result<Value> {
        let path = format!("/user/order/{}", order_id);
        self.request(Method::DELETE, &path, &[], None::<&Value>).await
    }

    async fn cancel_order_by_external_id(&self, external_id: &str) -> Result<Value> {
        let query = [("externalId", external_id.to_string())];
        self.request(Method::DELETE, "/user/order", &query, None::<&Value>).await
    }

    async fn withdraw(&self, request: &WithdrawalRequest) -> Result<Value> {
        self.request(Method::POST, "/user/withdrawal", &[], Some(request)).await
    }

    async fn bridge_config(&self) -> Result<Value> {
        self.request(Method::GET, "/user/bridge/config", &[], None::<&Value>).await
    }

    async fn bridge_quote(&self, chain_in: &str, chain_out: &str, amount: Decimal) -> Result<Value> {
        let query = [
            ("chainIn", chain_in.to_string()),
            ("chainOut", chain_out.to_string()),
            ("amount", amount.to_string()),
        ];
        self.request(Method::GET, "/user/bridge/quote", &query, None::<&Value>).await
    }

    async fn commit_bridge_quote(&self, quote_id: &str) -> Result<()> {
        let query = [("id", quote_id.to_string())];
        self.request(Method::POST, "/user/bridge/quote", &query, None::<&Value>).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_envelopes_are_summarised() {
        assert_eq!(
            describe_error(r#"{"status":"ERR","error":{"code":1006,"message":"Market not found"}}"#),
            "error 1006: Market not found"
        );
        assert_eq!(describe_error("<html>502</html>"), "<html>502</html>");
    }

    #[test]
    fn market_filter_is_optional() {
        assert!(market_filter(None).is_empty());
        assert_eq!(market_filter(Some("BTC-USD")), vec![("market", "BTC-USD".to_string())]);
    }
}
