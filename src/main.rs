use clap::Parser;
use dify_creator::cli::Cli;
use std::process::ExitCode;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    dify_creator::cli::run(cli).await
}
