use clap::{Parser, Subcommand};

/// Command bridge to the GRVT and Extended perpetuals venues.
#[derive(Debug, Parser)]
#[command(name = "perp-bridge", version)]
pub struct Cli {
    #[command(subcommand)]
    pub venue: Venue,
}

#[derive(Debug, Subcommand)]
pub enum Venue {
    /// GRVT perpetuals
    Grvt {
        #[command(subcommand)]
        mode: Mode,
    },
    /// Extended (Starknet) perpetuals
    Extended {
        #[command(subcommand)]
        mode: Mode,
    },
}

#[derive(Debug, Subcommand)]
pub enum Mode {
    /// Read `{"command", "params"}` lines from stdin, answer one line each
    Serve,
    /// Run a single command and print its result
    Call {
        command: String,
        /// JSON object of command parameters
        args: Option<String>,
    },
}
