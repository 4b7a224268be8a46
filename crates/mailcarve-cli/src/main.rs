use anyhow::Result;
use clap::Parser;

use mailcarve_cli::{
    cli::{Cli, Commands},
    commands,
    config::AppConfig,
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    let env_filter = format!(
        "mailcarve_cli={0},mailcarve_pipeline={0},mailcarve_image={0},mailcarve_ai={0}",
        log_level
    );
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(env_filter))
        .init();

    let config = AppConfig::load(cli.config, cli.endpoint)?;

    match cli.command {
        Commands::Process {
            image_url,
            width,
            height,
            brand,
            subject,
            preview,
            tracked_subject,
            tracked_preview,
            watch,
        } => {
            commands::process(
                &config,
                commands::ProcessArgs {
                    image_url,
                    width,
                    height,
                    brand,
                    subject,
                    preview,
                    tracked_subject,
                    tracked_preview,
                    watch,
                },
            )
            .await
        }
    }
}
