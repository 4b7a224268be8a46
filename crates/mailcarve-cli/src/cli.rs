use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "mailcarve")]
#[command(about = "mailcarve - turn email-design images into review-ready campaigns")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Config file path (defaults to ~/.config/mailcarve/config.toml)
    #[arg(short = 'C', long, global = true)]
    pub config: Option<PathBuf>,

    /// AI service endpoint (overrides config file)
    #[arg(long, global = true)]
    pub endpoint: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Enqueue a design image and run the full pipeline on it
    Process {
        /// URL of the uploaded design image
        image_url: String,

        /// Nominal image width in pixels (corrected against the header)
        #[arg(long, default_value = "0")]
        width: u32,

        /// Nominal image height in pixels (corrected against the header)
        #[arg(long, default_value = "0")]
        height: u32,

        /// Brand id to load context for
        #[arg(short, long)]
        brand: Option<String>,

        /// Subject line provided by the design source
        #[arg(long)]
        subject: Option<String>,

        /// Preview text provided by the design source
        #[arg(long)]
        preview: Option<String>,

        /// Subject line tracked in the task tracker (wins over --subject)
        #[arg(long)]
        tracked_subject: Option<String>,

        /// Preview text tracked in the task tracker (wins over --preview)
        #[arg(long)]
        tracked_preview: Option<String>,

        /// Print progress checkpoints while the job runs
        #[arg(short, long)]
        watch: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_process_command() {
        let cli = Cli::parse_from([
            "mailcarve",
            "process",
            "https://cdn.example.com/design.png",
            "--width",
            "600",
            "--height",
            "5400",
            "--brand",
            "brand-1",
            "--watch",
        ]);
        let Commands::Process {
            image_url,
            width,
            height,
            brand,
            watch,
            ..
        } = cli.command;
        assert_eq!(image_url, "https://cdn.example.com/design.png");
        assert_eq!(width, 600);
        assert_eq!(height, 5400);
        assert_eq!(brand.as_deref(), Some("brand-1"));
        assert!(watch);
    }

    #[test]
    fn global_flags_sit_before_or_after_subcommand() {
        let cli = Cli::parse_from([
            "mailcarve",
            "process",
            "https://cdn.example.com/a.png",
            "--endpoint",
            "http://localhost:8500",
            "-v",
        ]);
        assert!(cli.verbose);
        assert_eq!(cli.endpoint.as_deref(), Some("http://localhost:8500"));
    }
}
