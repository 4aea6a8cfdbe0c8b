use anyhow::Context;
use cyberfarm_cli::args::{self, Command};
use cyberfarm_cli::config::Config;
use cyberfarm_cli::runner::{self, RunOptions};
use cyberfarm_cli::VERSION;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so stdout carries only the console transcript
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_level(true)
        .init();

    let argv: Vec<String> = std::env::args().collect();
    match args::parse(&argv)? {
        Command::Help => {
            args::print_help();
            Ok(())
        }
        Command::Version => {
            println!("cyberfarm {VERSION}");
            Ok(())
        }
        Command::Run(run_args) => {
            let config = Config::load().context("failed to load config")?;
            let opts = RunOptions::resolve(run_args, &config)?;
            tracing::info!(
                server = %opts.endpoints.bootstrap,
                script = %opts.script.display(),
                "starting"
            );
            runner::run(opts).await
        }
    }
}
