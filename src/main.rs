//! SightGuide - console session
//!
//! Runs one navigation session in the terminal. Type `help` for the list of
//! simulated inputs; UI changes are printed to stdout and logs go to stderr.

use anyhow::Result;
use clap::Parser;
use sightguide::audit::AuditLog;
use sightguide::cloud::GeminiClient;
use sightguide::config::{config_path, Config};
use sightguide::console::{
    self, ConsoleBeeper, ConsoleCommand, ConsoleHaptics, ConsoleRig, ConsoleSms, FileCamera,
    FixedLocation,
};
use sightguide::emergency::GeoPoint;
use sightguide::perception::FrameAnalyzer;
use sightguide::session::{Capabilities, Collaborators, Session, SessionEvent};
use sightguide::tts;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Config file (defaults to the user config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Image returned whenever the camera is asked for a photo
    #[arg(long)]
    photo: Option<PathBuf>,

    /// Speech engine override (system, log)
    #[arg(long)]
    tts: Option<String>,

    /// Seconds to wait for a 'say' reply after a tap
    #[arg(long, default_value_t = 8)]
    listen_timeout: u64,

    /// Run as if camera permission was denied
    #[arg(long)]
    no_camera: bool,

    /// Run as if location permission was denied
    #[arg(long)]
    no_location: bool,

    /// Run as if SMS permission was denied
    #[arg(long)]
    no_sms: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_file = args.config.clone().unwrap_or_else(config_path);
    let first_run = !config_file.exists();
    let mut config = Config::load_from(&config_file)?;
    if let Some(engine) = &args.tts {
        config.tts_engine = engine.clone();
    }

    // Setup logging
    let level = if args.verbose {
        "debug".to_string()
    } else {
        config.log_level.to_lowercase()
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    info!("🧭 SightGuide v{} starting...", env!("CARGO_PKG_VERSION"));
    if first_run {
        match Config::default().save_to(&config_file) {
            Ok(()) => info!("📝 Wrote default config to {}", config_file.display()),
            Err(e) => warn!("⚠️ Could not write default config: {}", e),
        }
    }

    let audit = AuditLog::default_location();
    let cloud = GeminiClient::new(&config);
    if !cloud.has_api_key() {
        warn!("☁️ No cloud API key; set GEMINI_API_KEY to enable descriptions");
    }

    let rig = ConsoleRig::new(
        Duration::from_secs(args.listen_timeout),
        config.face_speech_gap(),
    );
    let collaborators = Collaborators {
        tts: tts::create_engine(&config),
        voice: rig.voice.clone(),
        cloud: Arc::new(cloud),
        camera: Arc::new(FileCamera::new(args.photo.clone())),
        location: Arc::new(FixedLocation(config.home_location.as_ref().map(|home| {
            GeoPoint {
                latitude: home.latitude,
                longitude: home.longitude,
            }
        }))),
        sms: Arc::new(ConsoleSms::new(audit.clone())),
        haptics: Arc::new(ConsoleHaptics),
        beeper: Arc::new(ConsoleBeeper),
        face_analyzer: Some(rig.faces.clone() as Arc<dyn FrameAnalyzer>),
        object_analyzer: Some(rig.objects.clone() as Arc<dyn FrameAnalyzer>),
    };
    let caps = Capabilities {
        camera: !args.no_camera,
        location: !args.no_location,
        sms: !args.no_sms,
    };

    let session = Session::new(&config, collaborators, caps).with_audit(audit);
    let handle = session.handle();
    let printer = tokio::spawn(console::print_states(handle.subscribe()));
    let runner = tokio::spawn(session.run());

    info!("✅ SightGuide ready - type 'help' for commands");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let command = match ConsoleCommand::parse_line(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(e) => {
                warn!("⚠️ {}", e);
                continue;
            }
        };
        let quit = command == ConsoleCommand::Quit;
        if let Err(e) = rig.apply(command, &handle).await {
            warn!("⚠️ {}", e);
            break;
        }
        if quit {
            break;
        }
    }

    // stdin closed without 'quit'
    let _ = handle.send(SessionEvent::Shutdown).await;
    runner.await?;
    printer.await?;

    info!("👋 Goodbye");
    Ok(())
}
