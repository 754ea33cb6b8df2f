//! Console front end
//!
//! Terminal stand-ins for the platform providers. Typed lines play the
//! role of speech, detector output and sensor readings so a session can be
//! driven without a phone.

use crate::asr::UtteranceSource;
use crate::audit::AuditLog;
use crate::camera::{downscale, Camera, CapturedImage};
use crate::emergency::{GeoPoint, LocationProvider, SmsGateway};
use crate::error::GuideResult;
use crate::haptics::{HapticPattern, Haptics};
use crate::perception::{AnalyzerKind, FaceNarrator, FaceObservation, FrameAnalyzer, PerceptionSink};
use crate::sensors::Beeper;
use crate::session::{SessionEvent, SessionHandle};
use crate::state::{Direction, Rect, Snapshot, UiState};
use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Width of the imaginary camera frame used for `obj` boxes
pub const FRAME_WIDTH: i32 = 640;

pub const HELP: &str = "\
Commands:
  tap                          tap the screen
  say <words>                  speak (answers a pending capture if one is running)
  obj <label>[,<label>..] <left> <top> <right> <bottom>
                               object detector result, frame is 640 wide
  text <words>                 text recognizer result
  faces <p> [<p>..]            face detector result, smile probability or '-'
  accel <x> <y> <z>            accelerometer reading in m/s²
  lux <value>                  ambient light reading
  fall                         report a fall directly
  help                         show this text
  quit                         leave";

/// One parsed console line
#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleCommand {
    Tap,
    Say(String),
    Objects { labels: Vec<String>, bounds: Rect },
    Text(String),
    Faces(Vec<FaceObservation>),
    Accel([f32; 3]),
    Lux(f32),
    Fall,
    Help,
    Quit,
}

impl ConsoleCommand {
    /// Parse a line. Blank lines give `Ok(None)`.
    pub fn parse_line(line: &str) -> Result<Option<Self>> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }
        let (verb, rest) = match line.split_once(char::is_whitespace) {
            Some((verb, rest)) => (verb, rest.trim()),
            None => (line, ""),
        };

        let command = match verb.to_lowercase().as_str() {
            "tap" => ConsoleCommand::Tap,
            "say" => ConsoleCommand::Say(non_empty(rest, "say needs some words")?),
            "text" => ConsoleCommand::Text(non_empty(rest, "text needs some words")?),
            "obj" => parse_objects(rest)?,
            "faces" => ConsoleCommand::Faces(parse_faces(rest)?),
            "accel" => {
                let values = parse_floats(rest)?;
                let [x, y, z] = values[..] else {
                    bail!("accel needs three numbers");
                };
                ConsoleCommand::Accel([x, y, z])
            }
            "lux" => {
                let values = parse_floats(rest)?;
                let [lux] = values[..] else {
                    bail!("lux needs one number");
                };
                ConsoleCommand::Lux(lux)
            }
            "fall" => ConsoleCommand::Fall,
            "help" | "?" => ConsoleCommand::Help,
            "quit" | "exit" => ConsoleCommand::Quit,
            other => bail!("unknown command '{}' (try 'help')", other),
        };
        Ok(Some(command))
    }
}

fn non_empty(rest: &str, message: &'static str) -> Result<String> {
    if rest.is_empty() {
        bail!(message);
    }
    Ok(rest.to_string())
}

fn parse_floats(rest: &str) -> Result<Vec<f32>> {
    rest.split_whitespace()
        .map(|v| v.parse::<f32>().with_context(|| format!("'{}' is not a number", v)))
        .collect()
}

fn parse_objects(rest: &str) -> Result<ConsoleCommand> {
    let tokens: Vec<&str> = rest.split_whitespace().collect();
    if tokens.len() < 5 {
        bail!("obj needs labels and four coordinates");
    }
    let (label_tokens, coords) = tokens.split_at(tokens.len() - 4);
    let coords = coords
        .iter()
        .map(|v| v.parse::<i32>().with_context(|| format!("'{}' is not a coordinate", v)))
        .collect::<Result<Vec<_>>>()?;

    let labels = label_tokens
        .join(" ")
        .split(',')
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>();
    if labels.is_empty() {
        bail!("obj needs at least one label");
    }

    Ok(ConsoleCommand::Objects {
        labels,
        bounds: Rect::new(coords[0], coords[1], coords[2], coords[3]),
    })
}

fn parse_faces(rest: &str) -> Result<Vec<FaceObservation>> {
    rest.split_whitespace()
        .map(|v| -> Result<FaceObservation> {
            let smiling_probability = match v {
                "-" => None,
                v => Some(v.parse::<f32>().with_context(|| format!("'{}' is not a probability", v))?),
            };
            Ok(FaceObservation {
                smiling_probability,
            })
        })
        .collect()
}

/// One-line description of a snapshot for the terminal
pub fn describe_snapshot(snapshot: &Snapshot) -> String {
    let mut line = format!("▶ {}", snapshot.ui);
    if let UiState::Success { bounds, .. } = &snapshot.ui {
        if !bounds.is_empty() {
            line.push_str(&format!(
                " @({},{})-({},{})",
                bounds.left, bounds.top, bounds.right, bounds.bottom
            ));
        }
    }

    let modes = &snapshot.modes;
    if modes.face_mode_on {
        line.push_str(" [faces]");
    }
    if modes.light_mode_on {
        line.push_str(" [light]");
    }
    if let Some(target) = &modes.target_object {
        line.push_str(&format!(" [find: {}]", target));
    }
    if modes.target_text {
        line.push_str(" [read]");
    }
    line
}

/// Print every UI change until the session ends
pub async fn print_states(mut states: watch::Receiver<Snapshot>) {
    let mut last: Option<UiState> = None;
    loop {
        let snapshot = states.borrow_and_update().clone();
        if last.as_ref() != Some(&snapshot.ui) {
            println!("{}", describe_snapshot(&snapshot));
            last = Some(snapshot.ui);
        }
        if states.changed().await.is_err() {
            break;
        }
    }
}

/// Voice capture answered by `say` lines
#[derive(Debug)]
pub struct ConsoleVoice {
    tx: mpsc::Sender<String>,
    rx: tokio::sync::Mutex<mpsc::Receiver<String>>,
    waiting: AtomicBool,
    timeout: Duration,
}

impl ConsoleVoice {
    pub fn new(timeout: Duration) -> Self {
        let (tx, rx) = mpsc::channel(4);
        Self {
            tx,
            rx: tokio::sync::Mutex::new(rx),
            waiting: AtomicBool::new(false),
            timeout,
        }
    }

    pub fn is_waiting(&self) -> bool {
        self.waiting.load(Ordering::SeqCst)
    }

    /// Hand `text` to a running capture. False when nobody is listening.
    pub fn offer(&self, text: &str) -> bool {
        self.is_waiting() && self.tx.try_send(text.to_string()).is_ok()
    }
}

#[async_trait]
impl UtteranceSource for ConsoleVoice {
    async fn capture_utterance(&self) -> Result<Option<String>> {
        let mut rx = self.rx.lock().await;
        while rx.try_recv().is_ok() {}

        self.waiting.store(true, Ordering::SeqCst);
        info!("🎙️ Listening, reply with 'say ...' within {:?}", self.timeout);
        let heard = tokio::time::timeout(self.timeout, rx.recv()).await;
        self.waiting.store(false, Ordering::SeqCst);

        match heard {
            Ok(text) => Ok(text),
            Err(_) => {
                debug!("Voice capture timed out");
                Ok(None)
            }
        }
    }
}

/// Frame analyzer fed from typed detector results
#[derive(Debug)]
pub struct ConsoleAnalyzer {
    kind: AnalyzerKind,
    sink: Mutex<Option<PerceptionSink>>,
    narrator: Mutex<FaceNarrator>,
}

impl ConsoleAnalyzer {
    pub fn new(kind: AnalyzerKind, face_speech_gap: Duration) -> Self {
        Self {
            kind,
            sink: Mutex::new(None),
            narrator: Mutex::new(FaceNarrator::new(face_speech_gap)),
        }
    }

    pub fn is_attached(&self) -> GuideResult<bool> {
        Ok(self.sink.lock()?.is_some())
    }

    fn current_sink(&self) -> GuideResult<Option<PerceptionSink>> {
        Ok(self.sink.lock()?.clone())
    }

    /// Report objects. False when detached or the session is busy.
    pub fn feed_objects(&self, labels: Vec<String>, bounds: Rect) -> GuideResult<bool> {
        let Some(sink) = self.current_sink()? else {
            return Ok(false);
        };
        let direction = Direction::from_bounds(&bounds, FRAME_WIDTH);
        Ok(sink.objects(labels, bounds, direction))
    }

    pub fn feed_text(&self, text: &str) -> GuideResult<bool> {
        let Some(sink) = self.current_sink()? else {
            return Ok(false);
        };
        Ok(sink.text(text))
    }

    /// Narrate faces; paced, so most calls report nothing
    pub fn feed_faces(&self, faces: &[FaceObservation]) -> GuideResult<bool> {
        let Some(sink) = self.current_sink()? else {
            return Ok(false);
        };
        let message = self.narrator.lock()?.narrate(faces, Instant::now());
        Ok(message.is_some_and(|m| sink.face(m)))
    }
}

#[async_trait]
impl FrameAnalyzer for ConsoleAnalyzer {
    async fn attach(&self, sink: PerceptionSink) -> Result<()> {
        *self.sink.lock().map_err(|e| anyhow!(e.to_string()))? = Some(sink);
        debug!("⌨️ {:?} input now reaches the session", self.kind);
        Ok(())
    }

    async fn detach(&self) -> Result<()> {
        *self.sink.lock().map_err(|e| anyhow!(e.to_string()))? = None;
        debug!("⌨️ {:?} input disconnected", self.kind);
        Ok(())
    }
}

#[derive(Debug)]
pub struct ConsoleHaptics;

impl Haptics for ConsoleHaptics {
    fn pulse(&self, pattern: HapticPattern) {
        info!(
            "📳 {:?} {:?} at {}",
            pattern,
            pattern.timings_ms(),
            pattern.amplitude()
        );
    }
}

#[derive(Debug)]
pub struct ConsoleBeeper;

impl Beeper for ConsoleBeeper {
    fn beep(&self, duration: Duration) {
        debug!("🔔 pip {:?}", duration);
    }
}

/// "Sends" texts by writing them to the audit log
#[derive(Debug)]
pub struct ConsoleSms {
    audit: AuditLog,
}

impl ConsoleSms {
    pub fn new(audit: AuditLog) -> Self {
        Self { audit }
    }
}

#[async_trait]
impl SmsGateway for ConsoleSms {
    async fn send(&self, recipient: &str, message: &str) -> Result<()> {
        warn!("✉️ SMS to {}: {}", recipient, message);
        self.audit
            .log(&format!("SMS to {}: {}", recipient, message))
            .context("could not record SMS")
    }
}

/// Always reports the same position, or none
#[derive(Debug)]
pub struct FixedLocation(pub Option<GeoPoint>);

#[async_trait]
impl LocationProvider for FixedLocation {
    async fn current_location(&self) -> Result<Option<GeoPoint>> {
        Ok(self.0)
    }
}

/// Returns a photo from disk for every capture
#[derive(Debug)]
pub struct FileCamera {
    path: Option<PathBuf>,
}

impl FileCamera {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }
}

#[async_trait]
impl Camera for FileCamera {
    async fn capture(&self, max_dimension: u32) -> Result<CapturedImage> {
        let Some(path) = &self.path else {
            bail!("no photo configured, start with --photo <file>");
        };
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("could not read {}", path.display()))?;
        debug!(
            "📷 Captured {} bytes from {} (max side {})",
            bytes.len(),
            path.display(),
            max_dimension
        );

        tokio::task::spawn_blocking(move || downscale(&bytes, max_dimension))
            .await
            .context("image scaling task failed")?
    }
}

/// The console providers a session is wired to
#[derive(Debug, Clone)]
pub struct ConsoleRig {
    pub voice: Arc<ConsoleVoice>,
    pub faces: Arc<ConsoleAnalyzer>,
    pub objects: Arc<ConsoleAnalyzer>,
}

impl ConsoleRig {
    pub fn new(listen_timeout: Duration, face_speech_gap: Duration) -> Self {
        Self {
            voice: Arc::new(ConsoleVoice::new(listen_timeout)),
            faces: Arc::new(ConsoleAnalyzer::new(AnalyzerKind::Face, face_speech_gap)),
            objects: Arc::new(ConsoleAnalyzer::new(AnalyzerKind::ObjectText, face_speech_gap)),
        }
    }

    /// Route one command into the session
    pub async fn apply(&self, command: ConsoleCommand, session: &SessionHandle) -> GuideResult<()> {
        match command {
            ConsoleCommand::Tap => session.send(SessionEvent::Tap).await?,
            ConsoleCommand::Say(text) => {
                if !self.voice.offer(&text) {
                    session.send(SessionEvent::Utterance(text)).await?;
                }
            }
            ConsoleCommand::Objects { labels, bounds } => {
                if !self.objects.feed_objects(labels, bounds)? {
                    info!("📷 Object detector is not running");
                }
            }
            ConsoleCommand::Text(text) => {
                if !self.objects.feed_text(&text)? {
                    info!("📷 Text recognizer is not running");
                }
            }
            ConsoleCommand::Faces(faces) => {
                if !self.faces.is_attached()? {
                    info!("📷 Face detector is not running");
                } else {
                    self.faces.feed_faces(&faces)?;
                }
            }
            ConsoleCommand::Accel(reading) => {
                session.send(SessionEvent::Acceleration(reading)).await?
            }
            ConsoleCommand::Lux(lux) => session.send(SessionEvent::Lux(lux)).await?,
            ConsoleCommand::Fall => session.send(SessionEvent::FallDetected).await?,
            ConsoleCommand::Help => println!("{}", HELP),
            ConsoleCommand::Quit => session.send(SessionEvent::Shutdown).await?,
        }
        Ok(())
    }
}
