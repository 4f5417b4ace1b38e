use clap::Parser;

use lineout::config::{Args, Command};
use lineout::guest;
use lineout::relay::TerminalSurface;

fn run_to_terminal(source: &str) -> anyhow::Result<()> {
    let (code_type, code) = guest::load_source(source)?;
    let (report, relay) = guest::execute(code_type, &code, TerminalSurface)?;

    let stats = relay.stats();
    tracing::info!(
        output = %report.output,
        elapsed_ms = report.elapsed_ms,
        bytes = stats.bytes_received,
        lines = stats.lines_flushed,
        "guest finished"
    );

    let pending = relay.pending();
    if !pending.is_empty() {
        tracing::warn!(pending = %pending, "guest output ended without a line terminator");
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    lineout::telemetry::init_tracing("lineout=info,guest=info", args.log_json);

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting lineout");

    match args.command {
        Command::Serve { addr } => {
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(lineout::server::serve(addr))
        }
        Command::Run { source } => run_to_terminal(&source),
    }
}
