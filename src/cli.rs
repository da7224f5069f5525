use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::Duration;

use crate::config::RuntimeConfig;
use crate::downloader::{
    default_resolutions, DownloadRequest, DownloadTarget, DownloadTask, ResolutionRequest,
    Session, TaskState, UrlStatus,
};

/// Progress bars are refreshed at this interval
const POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
/// Downloads videos at a chosen resolution, muxing adaptive streams with ffmpeg.
pub struct Arguments {
    /// Log debug information.
    #[arg(short, long, default_value_t = false, global = true)]
    pub verbose: bool,
    /// Use this config file instead of the one in the config directory.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Check a URL and list the resolutions it offers.
    Probe { url: String },
    /// Download one or more URLs concurrently.
    Download(DownloadArgs),
    /// Print the default resolution menu for this host.
    Resolutions,
}

#[derive(Args, Debug, Clone)]
pub struct DownloadArgs {
    #[arg(required = true)]
    pub urls: Vec<String>,
    /// "Highest available" or a label such as 720p.
    #[arg(short, long, default_value = "highest")]
    pub resolution: String,
    /// Destination directory (defaults to the configured one).
    #[arg(short, long)]
    pub destination: Option<PathBuf>,
    /// Treat every URL as a playlist.
    #[arg(long, default_value_t = false)]
    pub playlist: bool,
}

pub async fn handle_command(command: Command, runtime: &RuntimeConfig) -> anyhow::Result<()> {
    match command {
        Command::Resolutions => {
            for choice in default_resolutions(runtime.mux_available()) {
                println!("{}", choice);
            }
            if !runtime.mux_available() {
                println!("(ffmpeg not found: progressive streams only)");
            }
            Ok(())
        }
        Command::Probe { url } => {
            let session = runtime.build_session().context("Could not set up the downloader")?;
            probe(&session, &url).await
        }
        Command::Download(args) => {
            let session = runtime.build_session().context("Could not set up the downloader")?;
            download(&session, runtime, args).await
        }
    }
}

async fn probe(session: &Session, url: &str) -> anyhow::Result<()> {
    match session.validate_url(url).await {
        UrlStatus::Ready {
            content,
            is_playlist,
            resolutions,
        } => {
            println!("Title:      {}", content.title);
            println!("Playlist:   {}", if is_playlist { "yes" } else { "no" });
            let labels: Vec<String> = resolutions.iter().map(|r| r.to_string()).collect();
            println!("Resolutions: {}", labels.join(", "));
            Ok(())
        }
        UrlStatus::Invalid => bail!("Not a valid video URL: {}", url),
        UrlStatus::Unavailable { reason, message } => {
            bail!("{}: {}. {}", reason.description(), message, reason.suggestion())
        }
    }
}

async fn build_task(
    session: &Session,
    url: &str,
    resolution: ResolutionRequest,
    destination: PathBuf,
    playlist: bool,
) -> anyhow::Result<DownloadTask> {
    let target = if playlist {
        let playlist = session
            .resolve_playlist(url)
            .await
            .with_context(|| format!("Could not read playlist {}", url))?;
        DownloadTarget::Playlist(playlist)
    } else {
        match session.validate_url(url).await {
            UrlStatus::Ready { content, .. } => DownloadTarget::Content(content),
            UrlStatus::Invalid => bail!("Not a valid video URL: {}", url),
            UrlStatus::Unavailable { reason, .. } => {
                bail!("{} ({}). {}", reason.description(), url, reason.suggestion())
            }
        }
    };

    Ok(session.create_task(DownloadRequest {
        target,
        resolution,
        destination,
    }))
}

async fn download(
    session: &Session,
    runtime: &RuntimeConfig,
    args: DownloadArgs,
) -> anyhow::Result<()> {
    let resolution: ResolutionRequest = args
        .resolution
        .parse()
        .with_context(|| format!("Unknown resolution {:?}", args.resolution))?;
    let destination = args.destination.unwrap_or_else(|| runtime.destination.clone());

    let multi = MultiProgress::new();
    let style = ProgressStyle::with_template("{prefix:30!} [{bar:40.cyan/blue}] {pos:>3}% {msg}")?
        .progress_chars("#>-");

    let mut running: Vec<(DownloadTask, ProgressBar)> = Vec::new();
    let mut rejected = 0usize;

    for url in &args.urls {
        match build_task(session, url, resolution, destination.clone(), args.playlist).await {
            Ok(mut task) => {
                let bar = multi.add(ProgressBar::new(100));
                bar.set_style(style.clone());
                bar.set_prefix(task.title().to_string());
                task.start();
                running.push((task, bar));
            }
            Err(e) => {
                log::error!("{:#}", e);
                rejected += 1;
            }
        }
    }

    let mut interval = tokio::time::interval(POLL_INTERVAL);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                log::warn!("Interrupted, stopping downloads");
                for (task, _) in running.iter_mut() {
                    task.kill().await;
                }
                break;
            }
            _ = interval.tick() => {
                for (task, bar) in &running {
                    bar.set_position(task.get_progress() as u64);
                }
                if running.iter().all(|(task, _)| task.state().is_terminal()) {
                    break;
                }
            }
        }
    }

    let mut failed = rejected;
    for (task, bar) in &running {
        bar.set_position(task.get_progress() as u64);
        match task.state() {
            TaskState::Completed(outcome) => {
                if outcome.items_total > 1 || outcome.items_completed != outcome.items_total {
                    bar.finish_with_message(format!(
                        "done ({}/{} items)",
                        outcome.items_completed, outcome.items_total
                    ));
                } else {
                    bar.finish_with_message("done");
                }
            }
            TaskState::Failed(message) => {
                failed += 1;
                bar.abandon_with_message(format!("failed: {}", message));
            }
            _ => bar.abandon_with_message("killed"),
        }
    }

    if failed > 0 {
        bail!("{} of {} downloads failed", failed, args.urls.len());
    }
    Ok(())
}
