use clap::Parser;
use perp_bridge::cli::{Cli, Mode, Venue};
use perp_bridge::core::dispatch::HandlerFactory;
use perp_bridge::core::types::Config;
use perp_bridge::handlers::extended::ExtendedFactory;
use perp_bridge::handlers::grvt::GrvtFactory;
use perp_bridge::transport::{oneshot, stream};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    if let Err(e) = dotenv::dotenv() {
        eprintln!("WARNING: .env load failed: {}", e);
    }
    // stdout carries responses only
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            println!("{}", serde_json::json!({ "error": format!("{:#}", e) }));
            std::process::exit(1);
        }
    };

    let code = match cli.venue {
        Venue::Grvt { mode } => run(&GrvtFactory::new(config), mode).await,
        Venue::Extended { mode } => run(&ExtendedFactory::new(config), mode).await,
    };
    std::process::exit(code);
}

async fn run<F: HandlerFactory>(factory: &F, mode: Mode) -> i32 {
    match mode {
        Mode::Serve => {
            tracing::info!("perp-bridge serving on stdin");
            let input = tokio::io::BufReader::new(tokio::io::stdin());
            match stream::serve(factory, input, tokio::io::stdout()).await {
                Ok(()) => 0,
                Err(e) => {
                    tracing::error!("Stream transport failed: {:#}", e);
                    1
                }
            }
        }
        Mode::Call { command, args } => {
            let outcome = oneshot::run(factory, &command, args.as_deref()).await;
            println!("{}", outcome.output);
            outcome.exit_code
        }
    }
}
