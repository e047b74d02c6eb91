use crate::core::schema::grvt::*;
use anyhow::Result;
use async_trait::async_trait;

/// The slice of the GRVT API the bridge drives, authenticated as one account.
#[async_trait]
pub trait GrvtApi: Send + Sync {
    async fn account_summary(&self, sub_account_id: &str) -> Result<SubAccountSummary>;
    async fn all_instruments(&self) -> Result<Vec<Instrument>>;
    async fn positions(&self, sub_account_id: &str) -> Result<Vec<Position>>;
    async fn create_order(&self, order: &Order) -> Result<CreatedOrder>;
    async fn cancel_order(&self, request: &CancelOrderRequest) -> Result<()>;
    /// Returns how many orders the venue reported as cancelled.
    async fn cancel_all_orders(&self, request: &CancelAllOrdersRequest) -> Result<usize>;
    async fn transfer(&self, request: &TransferRequest) -> Result<TransferAck>;
    async fn transfer_history(&self, request: &TransferHistoryRequest) -> Result<Page<TransferRecord>>;
    async fn withdrawal(&self, request: &WithdrawalRequest) -> Result<WithdrawalAck>;
    async fn order_history(&self, request: &OrderHistoryRequest) -> Result<Vec<RawOrder>>;
    async fn vault_invest(&self, request: &VaultRequest) -> Result<Ack>;
    async fn vault_redeem(&self, request: &VaultRequest) -> Result<Ack>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApiCredentials {
    pub account_id: String,
    pub api_key: String,
}

/// Opens API sessions. Funding operations get their own session, separate
/// from the trading one.
pub trait GrvtConnector: Send + Sync {
    fn connect(&self, credentials: &ApiCredentials) -> Result<Box<dyn GrvtApi>>;
}
