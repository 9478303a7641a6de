//! Tendies command-line front end

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use log::{debug, error};
use std::path::PathBuf;
use std::sync::Arc;
use std::{panic, process};
use tendies::exit_codes::{
    EXIT_ERROR, EXIT_INVALID_ARGS, EXIT_PANIC, EXIT_SUCCESS, exit_code_for,
};
use tendies::poster::carplay::CommandBitmapEncoder;
use tendies::poster::hash_watch::CancellationToken;
use tendies::poster::platform::NullProbe;
use tendies::poster::state::AppState;
use tendies::poster::worker::DeployWorker;
use tendies::{ApplyError, CarPlayOverride, Config, TendiesError};

#[derive(Parser, Debug)]
#[command(name = "tendies", version = tendies::VERSION, about = "Deploy poster bundles into the poster app")]
struct Cli {
    /// Log level (trace, debug, info, warn, error, json[:level])
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Queue .tendies bundles
    Import {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Show queued bundles and the stored app hashes
    List,
    /// Drop a queued bundle by its position in `list`
    Remove { index: usize },
    /// Deploy everything queued
    Apply {
        /// Videos to turn into posters alongside the bundles
        #[arg(long = "video")]
        videos: Vec<PathBuf>,
        /// Play generated video posters back and forth
        #[arg(long)]
        auto_reverse: bool,
    },
    /// Replace a CarPlay wallpaper
    Carplay {
        #[arg(long)]
        slot: String,
        #[arg(long)]
        light: Option<PathBuf>,
        #[arg(long)]
        dark: Option<PathBuf>,
        /// Program that turns an image into a CarPlay bitmap
        #[arg(long)]
        encoder: String,
        /// Extra arguments passed to the encoder before the file names
        #[arg(long = "encoder-arg", allow_hyphen_values = true)]
        encoder_args: Vec<String>,
    },
    /// Forget a CarPlay wallpaper override
    CarplayReset { name: String },
    /// Store app hashes
    SetHash {
        #[arg(long)]
        poster_board: Option<String>,
        #[arg(long)]
        carplay: Option<String>,
    },
    /// Wait for the helper to hand over app hashes
    WaitHash,
    /// Handle a pocketposter:// link or a local bundle path
    Open { link: String },
    /// Remove everything in the staging directory
    ClearCache,
    /// Ask the poster app to rebuild its collections
    ResetCollections {
        #[arg(long, default_value = "en")]
        language: String,
    },
    /// Bring the poster app to the front
    OpenPosterBoard,
}

fn main() {
    // Set up panic handler to return specific exit code
    panic::set_hook(Box::new(|panic_info| {
        eprintln!("PANIC: {panic_info}");
        process::exit(EXIT_PANIC);
    }));

    let result = panic::catch_unwind(run);

    match result {
        Ok(exit_code) => process::exit(exit_code),
        Err(_) => {
            eprintln!("Fatal: Unhandled panic in tendies");
            process::exit(EXIT_PANIC);
        }
    }
}

fn run() -> i32 {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let code = if e.use_stderr() { EXIT_INVALID_ARGS } else { EXIT_SUCCESS };
            let _ = e.print();
            return code;
        }
    };

    if let Some(ref level) = cli.log_level {
        tendies::logger::JsonLogger::init_with_level(level);
    } else {
        tendies::logger::JsonLogger::init();
    }
    debug!("🚀 tendies {} starting", tendies::VERSION);

    match dispatch(cli.command) {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => report_error(&e),
    }
}

fn report_error(err: &anyhow::Error) -> i32 {
    let Some(tendies_err) = err.downcast_ref::<TendiesError>() else {
        eprintln!("Error: {err:#}");
        return EXIT_ERROR;
    };
    error!("❌ {tendies_err}");

    match ApplyError::from_ref(tendies_err) {
        apply @ (ApplyError::WrongAppHash | ApplyError::CollectionsNeedsReset) => {
            eprintln!("{apply}");
            eprintln!("{}", apply.remedy());
        }
        ApplyError::Unexpected(_) => eprintln!("Error: {err:#}"),
    }
    exit_code_for(tendies_err)
}

fn dispatch(command: Command) -> anyhow::Result<()> {
    let config = Config::from_env();
    let mut state = tendies::open_state(config, Arc::new(NullProbe))
        .context("failed to open the staging directory")?;

    match command {
        Command::Import { files } => {
            for file in files {
                let queued = state.import_bundle(&file)?;
                println!("Queued {}", queued.display());
            }
        }
        Command::List => list(&state)?,
        Command::Remove { index } => match state.remove_bundle(index) {
            Some(bundle) => println!("Removed {}", bundle.display()),
            None => bail!("no queued bundle at position {index}"),
        },
        Command::Apply {
            videos,
            auto_reverse,
        } => {
            for video in &videos {
                state.import_video(video, auto_reverse)?;
            }
            let worker = DeployWorker::spawn(state.paths().tunnel_mount())?;
            let report = tendies::apply_tendies(&mut state, &worker)?;
            worker.shutdown();

            for deployed in &report.deployed {
                println!(
                    "Deployed {} to {} (identifier {})",
                    deployed.staged_name, deployed.extension, deployed.identifier
                );
            }
            for (bundle, reason) in &report.skipped_bundles {
                println!("Skipped {}: {reason}", bundle.display());
            }
            for (video, reason) in &report.skipped_videos {
                println!("Skipped video {}: {reason}", video.display());
            }
            println!("Applied {} descriptor(s). Respring to see them.", report.deployed.len());
        }
        Command::Carplay {
            slot,
            light,
            dark,
            encoder,
            encoder_args,
        } => {
            if light.is_none() && dark.is_none() {
                bail!("give --light and/or --dark for slot '{slot}'");
            }
            let encoder = CommandBitmapEncoder::locate(&encoder)?.with_args(encoder_args);
            let worker = DeployWorker::spawn(state.paths().tunnel_mount())?;
            let report = tendies::apply_carplay(
                &state,
                &worker,
                Arc::new(encoder),
                &[CarPlayOverride {
                    name: slot,
                    light,
                    dark,
                }],
            )?;
            worker.shutdown();
            println!(
                "Wrote {} bitmap(s); active: {}",
                report.written.len(),
                report.active.join(", ")
            );
        }
        Command::CarplayReset { name } => {
            state.reset_carplay(&name)?;
            println!("Reset {name}");
        }
        Command::SetHash {
            poster_board,
            carplay,
        } => {
            if poster_board.is_none() && carplay.is_none() {
                bail!("give --poster-board and/or --carplay");
            }
            state.set_app_hashes(poster_board.as_deref(), carplay.as_deref())?;
            println!("App hash saved");
        }
        Command::WaitHash => {
            let token = CancellationToken::new();
            signal_hook::flag::register(signal_hook::consts::SIGINT, token.flag())
                .context("failed to install the interrupt handler")?;
            println!("Waiting for {} ...", state.config().hash_file().display());
            let hashes = tendies::wait_for_app_hashes(&state, &token)?;
            println!("Poster board hash: {}", hashes.poster_board);
            if let Some(carplay) = hashes.carplay {
                println!("CarPlay hash: {carplay}");
            }
        }
        Command::Open { link } => {
            let parsed = tendies::handle_deep_link(&mut state, &link, None)?;
            println!("Handled {parsed:?}");
        }
        Command::ClearCache => {
            tendies::clear_cache(&mut state)?;
            println!("Cache cleared");
        }
        Command::ResetCollections { language } => {
            tendies::reset_collections(&state, &language)?;
            println!("Collections reset requested; respring to finish");
        }
        Command::OpenPosterBoard => tendies::open_poster_board(&state)?,
    }
    Ok(())
}

fn list(state: &AppState) -> anyhow::Result<()> {
    let prefs = state.preferences()?;
    let hash_or_unset = |h: &str| if h.is_empty() { "(unset)".to_string() } else { h.to_string() };
    println!("Poster board hash: {}", hash_or_unset(&prefs.poster_board_hash));
    println!("CarPlay hash: {}", hash_or_unset(&prefs.carplay_hash));

    if state.bundles().is_empty() {
        println!("No bundles queued");
    }
    for (index, bundle) in state.bundles().bundles().iter().enumerate() {
        println!("{index}: {}", bundle.display());
    }
    Ok(())
}
