use clap::Parser;
use promptkeep_cli::PromptCli;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    // RUST_LOG wins; otherwise only warnings, on stderr so stdout stays parseable.
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .try_init();

    promptkeep_cli::run(PromptCli::parse())
}
