// avmerge - Video/Audio Download and Merge
// Copyright (C) 2025 Henning Berge
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.


use anyhow::{bail, Context};
use avmerge_core::file::derive_file_name;
use avmerge_core::media::{probe_duration_ms, ToolSource};
use avmerge_core::storage::Settings;
use avmerge_core::{ChannelObserver, Pipeline, PipelineConfig, PipelineEvent, PipelineState};
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn, Level};

#[derive(Parser)]
#[command(name = "avmerge-cli")]
#[command(about = "Download separate video and audio streams and merge them", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose logging (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Download both streams and merge them
    Run {
        /// Video stream URL (defaults to the last one used)
        #[arg(long)]
        video_url: Option<String>,
        /// Audio stream URL (defaults to the last one used)
        #[arg(long)]
        audio_url: Option<String>,
        /// Destination directory (defaults to the last one used)
        #[arg(short, long)]
        dir: Option<PathBuf>,
        /// Output file name (derived from the video URL if omitted)
        #[arg(short, long)]
        output: Option<String>,
        /// ffmpeg executable
        #[arg(long, default_value = "ffmpeg", conflicts_with = "bundled")]
        ffmpeg: PathBuf,
        /// Use the ffmpeg compiled into this binary
        #[arg(long)]
        bundled: bool,
        /// Do not remember these inputs
        #[arg(long)]
        no_save: bool,
    },
    /// Print the duration of a media file in milliseconds
    Probe {
        /// Media file
        file: PathBuf,
        /// ffmpeg executable
        #[arg(long, default_value = "ffmpeg")]
        ffmpeg: PathBuf,
    },
    /// Print the output name derived from a video URL
    DeriveName {
        /// Video URL
        url: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        _ => Level::DEBUG,
    };
    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Run {
            video_url,
            audio_url,
            dir,
            output,
            ffmpeg,
            bundled,
            no_save,
        } => {
            let tool = if bundled {
                ToolSource::Bundled
            } else {
                ToolSource::System { path: ffmpeg }
            };
            let succeeded = run(video_url, audio_url, dir, output, tool, !no_save).await?;
            if !succeeded {
                std::process::exit(1);
            }
        }
        Commands::Probe { file, ffmpeg } => {
            let ms = probe_duration_ms(&ffmpeg, &file)
                .await
                .with_context(|| format!("Failed to probe {}", file.display()))?;
            println!("{}", ms);
        }
        Commands::DeriveName { url } => match derive_file_name(&url) {
            Some(name) => println!("{}", name),
            None => bail!("No file name can be derived from '{}'", url),
        },
    }

    Ok(())
}

async fn run(
    video_url: Option<String>,
    audio_url: Option<String>,
    dir: Option<PathBuf>,
    output: Option<String>,
    tool: ToolSource,
    save: bool,
) -> anyhow::Result<bool> {
    let mut settings = Settings::load().await.unwrap_or_else(|e| {
        warn!("Ignoring unreadable settings: {}", e);
        Settings::default()
    });
    let request = settings.fill_request(video_url, audio_url, dir, output);
    if save {
        settings.remember(&request);
        if let Err(e) = settings.save().await {
            warn!("Failed to save settings: {}", e);
        }
    }

    let config = PipelineConfig::default().with_tool(tool);
    let (observer, mut events) = ChannelObserver::new();
    let handle = Pipeline::new(config, request, Arc::new(observer)).spawn();

    let mut stage = PipelineState::Idle;
    let mut progress_shown = false;
    while let Some(event) = events.recv().await {
        match event {
            PipelineEvent::State(state) => stage = state,
            PipelineEvent::Progress(fraction) => {
                eprint!("\r{:<18} {:>3}%", stage, (fraction * 100.0).round() as u32);
                std::io::stderr().flush().context("Failed to write progress")?;
                progress_shown = true;
            }
            PipelineEvent::Log(line) => {
                if progress_shown {
                    eprintln!();
                    progress_shown = false;
                }
                println!("{}", line);
            }
        }
    }
    if progress_shown {
        eprintln!();
    }

    let result = handle.await.context("Pipeline task panicked")?;
    info!(state = %result.final_state(), "run finished");
    Ok(result.is_success())
}
