use std::io;
use std::process::ExitCode;

use gembridge_mcp::McpServer;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    // stdout is the protocol channel; all diagnostics go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let server = match McpServer::from_env() {
        Ok(server) => server,
        Err(message) => {
            eprintln!("{message}");
            return ExitCode::FAILURE;
        }
    };

    match server.serve_stdio() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("gembridged stdio transport error: {err}");
            ExitCode::FAILURE
        }
    }
}
