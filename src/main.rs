//! kinsight CLI binary.
//!
//! All logic lives in the library; main only parses arguments, installs the
//! tracing subscriber, and maps the outcome to a process exit code.

use clap::Parser;

fn main() {
    let cli = kinsight::cli::Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("error: cannot start async runtime: {e}");
            std::process::exit(kinsight_model::ExitCode::Generic.as_i32());
        }
    };
    let code = runtime.block_on(kinsight::cli::run(cli));
    if code != kinsight_model::ExitCode::Success {
        std::process::exit(code.as_i32());
    }
}
