use crate::core::dispatch::{dispatch, respond, CommandOf, CommandSet, HandlerFactory};
use crate::core::params::Params;
use crate::core::types::CommandResponse;
use serde_json::Value;

/// Result of a single invocation: the line to print and the process exit code.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub output: Value,
    pub exit_code: i32,
}

impl Outcome {
    fn answered(response: CommandResponse) -> Self {
        Self {
            output: response.into_bare(),
            exit_code: 0,
        }
    }

    fn refused(message: String) -> Self {
        Self {
            output: CommandResponse::error(message).into_bare(),
            exit_code: 1,
        }
    }
}

/// Run one command. Failures to start the request exit 1; handler errors are
/// reported in the output with exit 0.
pub async fn run<F: HandlerFactory>(factory: &F, command: &str, args: Option<&str>) -> Outcome {
    let command = match CommandOf::<F>::parse(command) {
        Ok(c) => c,
        Err(e) => return Outcome::refused(e.to_string()),
    };
    let params = match args {
        Some(raw) if !raw.trim().is_empty() => match Params::from_json(raw) {
            Ok(p) => p,
            Err(e) => return Outcome::refused(e.to_string()),
        },
        _ => Params::default(),
    };

    match factory.detached(command, &params).await {
        Some(Ok(data)) => return Outcome::answered(respond(command.name(), Ok(data))),
        Some(Err(e)) => return Outcome::refused(format!("{:#}", e)),
        None => {}
    }

    let handler = match factory.build(&params).await {
        Ok(h) => h,
        Err(e) => {
            tracing::error!("Handler build failed: {:#}", e);
            return Outcome::refused(format!("{:#}", e));
        }
    };
    Outcome::answered(dispatch(&handler, command, &params).await)
}
