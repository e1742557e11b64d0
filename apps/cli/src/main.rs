//! `partshop` binary entry point.

use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    partshop_cli::run().await
}
