use crate::core::dispatch::{dispatch, respond, CommandOf, CommandSet, HandlerFactory};
use crate::core::error::BridgeError;
use crate::core::params::Params;
use crate::core::types::{CommandRequest, CommandResponse};
use anyhow::Result;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

/// Answer newline-delimited requests until the input closes.
///
/// The venue handler is built from the first request that needs one and kept
/// for the rest of the session. A failed build is retried on the next request.
pub async fn serve<F, R, W>(factory: &F, input: R, mut output: W) -> Result<()>
where
    F: HandlerFactory,
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();
    let mut handler: Option<F::Handler> = None;

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let response = answer(factory, &mut handler, line).await;
        let mut encoded = serde_json::to_string(&response)?;
        encoded.push('\n');
        output.write_all(encoded.as_bytes()).await?;
        output.flush().await?;
    }

    tracing::debug!("Input closed, stream transport stopping");
    Ok(())
}

async fn answer<F: HandlerFactory>(
    factory: &F,
    slot: &mut Option<F::Handler>,
    line: &str,
) -> CommandResponse {
    let request: CommandRequest = match serde_json::from_str(line) {
        Ok(r) => r,
        Err(e) => return CommandResponse::error(BridgeError::MalformedRequest(e.to_string()).to_string()),
    };
    let command = match CommandOf::<F>::parse(&request.command) {
        Ok(c) => c,
        Err(e) => return CommandResponse::error(e.to_string()),
    };
    let params = Params::from(request.params);

    if let Some(outcome) = factory.detached(command, &params).await {
        return respond(command.name(), outcome);
    }

    if slot.is_none() {
        match factory.build(&params).await {
            Ok(h) => *slot = Some(h),
            Err(e) => {
                tracing::error!("Handler build failed: {:#}", e);
                return CommandResponse::error(format!("{:#}", e));
            }
        }
    }
    let Some(handler) = slot.as_ref() else {
        return CommandResponse::error("Handler unavailable");
    };
    dispatch(handler, command, &params).await
}
