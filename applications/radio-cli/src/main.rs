/// Radio CLI - console host for the radio engine
use anyhow::Context;
use clap::{Parser, Subcommand};
use radio_audio_desktop::{DesktopProvider, DEFAULT_CONNECT_TIMEOUT};
use radio_core::{DeviceId, Interrupt, RadioConfig, SourceCategory};
use radio_playback::{Catalog, RadioEngine};
use radio_resolver::{stream_candidates, ResolveUrl, StreamResolver};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod console;

use console::ConsoleCommand;

const DEFAULT_LOG_FILTER: &str = "radio_cli=info,radio_playback=info,radio_resolver=info,radio_audio_desktop=info";

#[derive(Parser)]
#[command(name = "radio-cli")]
#[command(about = "In-game radio engine console", long_about = None)]
struct Cli {
    /// Configuration file path (defaults to ./radio.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the engine and read commands from stdin
    Run {
        /// Device id the console starts on
        #[arg(short, long, default_value_t = 0)]
        device: u64,

        /// Channel to select and play at startup
        #[arg(long)]
        play: Option<String>,
    },
    /// Scan the library and list every channel
    Scan,
    /// Resolve a stream URL and list the candidates playback would try
    Resolve {
        /// Stream or wrapper playlist URL
        url: String,
    },
    /// Print the effective configuration
    Config,
}

fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = RadioConfig::load(cli.config.as_deref()).context("failed to load configuration")?;

    match cli.command {
        Commands::Run { device, play } => run(config, DeviceId::new(device), play.as_deref()),
        Commands::Scan => scan(&config),
        Commands::Resolve { url } => resolve(&config, &url),
        Commands::Config => {
            print!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

fn run(config: RadioConfig, mut device: DeviceId, startup: Option<&str>) -> anyhow::Result<()> {
    let resolver = StreamResolver::http(&config.resolver)?;
    let provider = DesktopProvider::new(DEFAULT_CONNECT_TIMEOUT)?;

    let engine = RadioEngine::new(config, Box::new(provider), Arc::new(resolver));
    engine.initialize();
    tracing::info!("Radio engine ready. Channels: {}", engine.channel_count());

    if let Some(name) = startup {
        report(engine.change_playlist(device, name) && engine.play(device), &engine, device);
    }

    println!("Type 'help' for commands.");
    let stdin = io::stdin();
    prompt(device)?;
    for line in stdin.lock().lines() {
        let line = line?;
        match console::parse(&line) {
            Ok(Some(ConsoleCommand::Quit)) => break,
            Ok(Some(ConsoleCommand::Device(next))) => {
                device = next;
                println!("Device {}", device);
            }
            Ok(Some(command)) => execute(&engine, device, command)?,
            Ok(None) => {}
            Err(e) => println!("error: {e:#}"),
        }
        prompt(device)?;
    }

    engine.shutdown();
    Ok(())
}

fn prompt(device: DeviceId) -> io::Result<()> {
    let mut stdout = io::stdout();
    write!(stdout, "radio[{}]> ", device)?;
    stdout.flush()
}

fn execute(engine: &RadioEngine, device: DeviceId, command: ConsoleCommand) -> anyhow::Result<()> {
    match command {
        ConsoleCommand::Select(name) => report(engine.change_playlist(device, &name), engine, device),
        ConsoleCommand::NextSource(category) => report(engine.change_to_next_source(device, category), engine, device),
        ConsoleCommand::CycleSource(category) => report(engine.select_next_source(device, category), engine, device),
        ConsoleCommand::Play => report(engine.play(device), engine, device),
        ConsoleCommand::PlayBackground => {
            engine.play_async(device, move |ok| {
                tracing::info!("Background play on device {} finished: {}", device, ok);
            });
            println!("queued");
        }
        ConsoleCommand::Start => report(engine.start(device), engine, device),
        ConsoleCommand::Pause => report(engine.pause(device), engine, device),
        ConsoleCommand::Stop => report(engine.stop(device), engine, device),
        ConsoleCommand::Forward => report(engine.forward(device), engine, device),
        ConsoleCommand::Rewind => report(engine.rewind(device), engine, device),
        ConsoleCommand::ShowVolume => println!("{:.0}%", engine.get_volume(device)),
        ConsoleCommand::SetVolume(percent) => report(engine.set_volume(device, percent), engine, device),
        ConsoleCommand::VolumeUp(step) => report(engine.volume_up(device, step), engine, device),
        ConsoleCommand::VolumeDown(step) => report(engine.volume_down(device, step), engine, device),
        ConsoleCommand::ShowTrack => println!("{}", engine.get_track(device)),
        ConsoleCommand::SetTrack(name) => report(engine.set_track(device, &name), engine, device),
        ConsoleCommand::PlayFx(name) => report(engine.play_fx(device, &name), engine, device),
        ConsoleCommand::StopFx => report(engine.stop_fx(device), engine, device),
        ConsoleCommand::Positions { emitter, listener } => {
            report(engine.set_positions(device, emitter, listener), engine, device);
        }
        ConsoleCommand::Fade { min, max, pan } => report(engine.set_fade_params(device, min, max, pan), engine, device),
        ConsoleCommand::Status => print!("{}", toml::to_string_pretty(&engine.status(device))?),
        ConsoleCommand::Channels => println!("{} channels", engine.channel_count()),
        ConsoleCommand::Rescan => report(engine.rescan_library(), engine, device),
        ConsoleCommand::Tick => report(engine.tick(), engine, device),
        ConsoleCommand::Help => println!("{}", console::HELP),
        ConsoleCommand::Device(_) | ConsoleCommand::Quit => {}
    }
    Ok(())
}

fn report(ok: bool, engine: &RadioEngine, device: DeviceId) {
    if ok {
        let source = engine.current_source_name(device);
        let track = engine.current_track_basename(device);
        match (source.is_empty(), track.is_empty()) {
            (true, _) => println!("ok"),
            (false, true) => println!("ok [{}]", source),
            (false, false) => println!("ok [{}] {}", source, track),
        }
    } else {
        let reason = engine.last_error(device).unwrap_or_else(|| "failed".to_string());
        println!("error: {}", reason);
    }
}

fn scan(config: &RadioConfig) -> anyhow::Result<()> {
    let catalog = Catalog::scan(config);
    if catalog.is_empty() {
        anyhow::bail!("no channels found under {}", config.root_path.display());
    }

    for category in [SourceCategory::Playlists, SourceCategory::Stations, SourceCategory::Streams] {
        let sources = catalog.sources(category);
        println!("[{}] {:?} ({})", category.code(), category, sources.len());
        for entry in sources {
            match &entry.stream_url {
                Some(url) => println!("  {:<32} {}", entry.key, url),
                None => println!(
                    "  {:<32} songs={} transitions={} ads={}",
                    entry.key,
                    entry.songs.len(),
                    entry.transitions.len(),
                    entry.ads.len()
                ),
            }
        }
    }
    Ok(())
}

fn resolve(config: &RadioConfig, url: &str) -> anyhow::Result<()> {
    let resolver = StreamResolver::http(&config.resolver)?;
    let resolved = resolver.resolve(url, &Interrupt::new());

    println!("resolved: {}", resolved);
    for (index, candidate) in stream_candidates(url, &resolved).iter().enumerate() {
        println!("  {}. {}", index + 1, candidate);
    }
    Ok(())
}
