use clap::Parser;
use std::process::ExitCode;

use rbxavatar_lib::cli::Args;

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();
    rbxavatar_lib::init_tracing(args.verbose);
    rbxavatar_lib::run(args).await
}
