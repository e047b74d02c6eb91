use crate::core::error::BridgeError;
use crate::core::normalize::normalize;
use crate::core::params::Params;
use crate::core::types::CommandResponse;
use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

/// The fixed table of commands a venue understands.
pub trait CommandSet: Sized + Copy + Send + Sync + 'static {
    const ALL: &'static [Self];

    fn name(self) -> &'static str;

    fn parse(name: &str) -> Result<Self, BridgeError> {
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.name() == name)
            .ok_or_else(|| BridgeError::UnknownCommand(name.to_string()))
    }
}

#[async_trait]
pub trait Handler: Send + Sync {
    type Command: CommandSet;

    async fn handle(&self, command: Self::Command, params: &Params) -> Result<Value>;
}

/// Builds a venue handler from the parameters of the first request.
#[async_trait]
pub trait HandlerFactory: Send + Sync {
    type Handler: Handler;

    async fn build(&self, params: &Params) -> Result<Self::Handler>;

    /// Commands answerable without an account session. An error here stands
    /// in for a failed build: the request could not be started.
    async fn detached(
        &self,
        _command: <Self::Handler as Handler>::Command,
        _params: &Params,
    ) -> Option<Result<Value>> {
        None
    }
}

pub type CommandOf<F> = <<F as HandlerFactory>::Handler as Handler>::Command;

/// Run one command and fold any failure into an error response.
pub async fn dispatch<H: Handler>(handler: &H, command: H::Command, params: &Params) -> CommandResponse {
    let outcome = handler.handle(command, params).await;
    respond(command.name(), outcome)
}

pub fn respond(command: &str, outcome: Result<Value>) -> CommandResponse {
    match outcome {
        Ok(data) => CommandResponse::data(normalize(data)),
        Err(e) => {
            tracing::warn!("{} failed: {:#}", command, e);
            CommandResponse::error(format!("{:#}", e))
        }
    }
}
