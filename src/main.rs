//! `reelsmith` CLI - render narrated videos from script files

mod cmd;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "reelsmith")]
#[command(about = "Narrated stock-footage videos from generated scripts")]
#[command(version)]
struct Cli {
    /// Verbose logging (debug level)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a script file into a finished video
    Render {
        /// Script JSON produced by the content generator
        script: PathBuf,

        /// Video kind (short, long, story); detected from the script when omitted
        #[arg(short, long)]
        kind: Option<String>,

        /// Config file (defaults to ~/.config/reelsmith/config.toml)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Override the output directory
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },

    /// Synthesize text and print the caption cues it produces
    Cues {
        /// Text to narrate
        text: String,

        /// Voice short name (defaults to the configured voice)
        #[arg(long)]
        voice: Option<String>,

        /// Config file (defaults to ~/.config/reelsmith/config.toml)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Show which video kind the next run should produce
    Next {
        /// Config file (defaults to ~/.config/reelsmith/config.toml)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Check that ffmpeg, ffprobe and the configured assets are usable
    Check {
        /// Config file (defaults to ~/.config/reelsmith/config.toml)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();

    match cli.command {
        Commands::Render {
            script,
            kind,
            config,
            output_dir,
        } => {
            cmd::render::cmd_render(
                &script,
                kind.as_deref(),
                config.as_deref(),
                output_dir.as_deref(),
            )
            .await?;
        }
        Commands::Cues {
            text,
            voice,
            config,
        } => {
            cmd::cues::cmd_cues(&text, voice.as_deref(), config.as_deref()).await?;
        }
        Commands::Next { config } => {
            cmd::next::cmd_next(config.as_deref()).await?;
        }
        Commands::Check { config } => {
            cmd::check::cmd_check(config.as_deref()).await?;
        }
    }

    Ok(())
}
