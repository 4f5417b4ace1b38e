//! Command-line configuration.

use std::net::SocketAddr;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "lineout")]
#[command(
    version,
    about = "Run WebAssembly and JavaScript guests with their stdout relayed line by line"
)]
pub struct Args {
    /// Output logs as JSON (for structured log aggregation).
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Serve the HTTP execution API.
    Serve {
        /// Address to listen on.
        #[arg(long, env = "LINEOUT_ADDR", default_value = "127.0.0.1:3000")]
        addr: SocketAddr,
    },
    /// Run one guest and relay its output to this terminal.
    Run {
        /// Local path or http(s) URL of a .wasm, .wat or .js file.
        source: String,
    },
}
