use clap::Parser;
use siegfried::cli::{Cli, log_filter, run};

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();

    let filter = log_filter(cli.verbose, std::env::var("RUST_LOG").ok().as_deref());
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    run(cli)
}
