//! UI/Output State Machine
//!
//! A `Session` owns the state for one active screen. Every input (taps,
//! utterances, detector results, sensor readings, finished background
//! work) arrives as a `SessionEvent` on one channel and is handled to
//! completion before the next, so the session is the only writer of
//! `UiState`. Slow work (voice capture, photo capture, cloud calls, SOS
//! dispatch) runs in spawned tasks that post their result back as another
//! event.
//!
//! Delayed actions carry the state generation they were armed in and are
//! dropped if the session has moved on by the time they arrive.

use crate::asr::{non_blank, UtteranceSource};
use crate::audit::AuditLog;
use crate::camera::{Camera, CapturedImage};
use crate::cloud::VisionService;
use crate::config::Config;
use crate::core::{select_analyzer, Command, CommandArbiter, PerceptionRouter, TextNormalizer};
use crate::emergency::{dispatch_sos, LocationProvider, SmsGateway};
use crate::error::{GuideError, GuideResult};
use crate::haptics::Haptics;
use crate::perception::{AnalyzerSlot, FrameAnalyzer, PerceptionSink};
use crate::sensors::{Beeper, FallDetector, LightCurve, LightGuide};
use crate::state::{Direction, ModeFlags, Rect, Snapshot, UiState};
use crate::store::StateStore;
use crate::tts::TtsEngine;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

pub const ANALYZING: &str = "Analyzing with AI...";
pub const SOS_SENT: &str = "SOS Sent";
pub const SMS_FAILED: &str = "SMS Failed";
pub const CAMERA_REQUIRED: &str = "Camera permission is required.";
pub const SOS_IN_PROGRESS: &str = "SOS is already being sent.";

const EVENT_QUEUE: usize = 64;

/// Everything that can change the session
#[derive(Debug)]
pub enum SessionEvent {
    /// The user tapped the screen
    Tap,
    /// A transcript to interpret directly
    Utterance(String),
    /// A voice capture round ended (`None`: cancelled or silent)
    CaptureFinished(Option<String>),
    Objects {
        labels: Vec<String>,
        bounds: Rect,
        direction: Direction,
    },
    Text(String),
    Face(String),
    /// Raw accelerometer reading in m/s²
    Acceleration([f32; 3]),
    /// Raw ambient light reading
    Lux(f32),
    /// A fall confirmed elsewhere
    FallDetected,
    CountdownExpired {
        generation: u64,
    },
    ListenPrompt {
        generation: u64,
    },
    PhotoCaptured {
        generation: u64,
        result: Result<CapturedImage, String>,
    },
    CloudFinished {
        generation: u64,
        result: Result<String, String>,
    },
    /// Outcome of the SOS dispatched for the fall in `generation`
    SosFinished {
        generation: u64,
        result: Result<(), String>,
    },
    /// Leave the screen: cancel timers and release providers
    Shutdown,
}

/// Platform permissions granted to this session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub camera: bool,
    pub location: bool,
    pub sms: bool,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            camera: true,
            location: true,
            sms: true,
        }
    }
}

/// External capability providers the session calls into
#[derive(Debug, Clone)]
pub struct Collaborators {
    pub tts: Arc<dyn TtsEngine>,
    pub voice: Arc<dyn UtteranceSource>,
    pub cloud: Arc<dyn VisionService>,
    pub camera: Arc<dyn Camera>,
    pub location: Arc<dyn LocationProvider>,
    pub sms: Arc<dyn SmsGateway>,
    pub haptics: Arc<dyn Haptics>,
    pub beeper: Arc<dyn Beeper>,
    pub face_analyzer: Option<Arc<dyn FrameAnalyzer>>,
    pub object_analyzer: Option<Arc<dyn FrameAnalyzer>>,
}

/// Cloneable handle for feeding and observing a running session
#[derive(Debug, Clone)]
pub struct SessionHandle {
    tx: mpsc::Sender<SessionEvent>,
    state: watch::Receiver<Snapshot>,
}

impl SessionHandle {
    pub async fn send(&self, event: SessionEvent) -> GuideResult<()> {
        self.tx
            .send(event)
            .await
            .map_err(|_| GuideError::SessionClosed)
    }

    /// Sink for analyzers that report outside the session's slot
    pub fn sink(&self) -> PerceptionSink {
        PerceptionSink::new(self.tx.clone())
    }

    pub fn snapshot(&self) -> Snapshot {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.state.clone()
    }

    /// Wait until a snapshot satisfies `predicate`
    pub async fn wait_for<F>(&self, predicate: F) -> GuideResult<Snapshot>
    where
        F: FnMut(&Snapshot) -> bool,
    {
        let mut rx = self.state.clone();
        let snapshot = rx
            .wait_for(predicate)
            .await
            .map_err(|_| GuideError::SessionClosed)?;
        Ok(snapshot.clone())
    }
}

pub struct Session {
    store: StateStore,
    arbiter: CommandArbiter,
    normalizer: TextNormalizer,
    router: PerceptionRouter,
    slot: AnalyzerSlot,
    fall: FallDetector,
    light: LightGuide,

    tts: Arc<dyn TtsEngine>,
    voice: Arc<dyn UtteranceSource>,
    cloud: Arc<dyn VisionService>,
    camera: Arc<dyn Camera>,
    location: Arc<dyn LocationProvider>,
    sms: Arc<dyn SmsGateway>,
    haptics: Arc<dyn Haptics>,

    caps: Capabilities,
    audit: AuditLog,
    emergency_contact: String,
    sos_countdown: Duration,
    fall_listen_delay: Duration,
    capture_max_dimension: u32,

    tx: mpsc::Sender<SessionEvent>,
    rx: mpsc::Receiver<SessionEvent>,
    countdown: Option<JoinHandle<()>>,
    listen_prompt: Option<JoinHandle<()>>,
    capture: Option<JoinHandle<()>>,
    /// Generation of the fall whose SOS is being sent
    sos_in_flight: Option<u64>,
    work: Vec<JoinHandle<()>>,
}

impl Session {
    pub fn new(config: &Config, collaborators: Collaborators, caps: Capabilities) -> Self {
        let (tx, rx) = mpsc::channel(EVENT_QUEUE);
        let slot = AnalyzerSlot::new(
            collaborators.face_analyzer,
            collaborators.object_analyzer,
            caps.camera,
            PerceptionSink::new(tx.clone()),
        );
        let curve = LightCurve {
            dark_lux: config.light_dark_lux,
            min_interval: Duration::from_millis(config.light_min_interval_ms),
            max_interval: Duration::from_millis(config.light_max_interval_ms),
        };

        Self {
            store: StateStore::new(ModeFlags::new(config.default_cloud_prompt.clone())),
            arbiter: CommandArbiter::new(
                config.wake_words.clone(),
                config.default_cloud_prompt.clone(),
            ),
            normalizer: TextNormalizer::new(),
            router: PerceptionRouter::new(config.haptic_min_gap()),
            slot,
            fall: FallDetector::new(config.fall_impact_threshold, config.fall_debounce()),
            light: LightGuide::new(curve, collaborators.beeper),
            tts: collaborators.tts,
            voice: collaborators.voice,
            cloud: collaborators.cloud,
            camera: collaborators.camera,
            location: collaborators.location,
            sms: collaborators.sms,
            haptics: collaborators.haptics,
            caps,
            audit: AuditLog::disabled(),
            emergency_contact: config.emergency_contact.clone(),
            sos_countdown: config.sos_countdown(),
            fall_listen_delay: config.fall_listen_delay(),
            capture_max_dimension: config.capture_max_dimension,
            tx,
            rx,
            countdown: None,
            listen_prompt: None,
            capture: None,
            sos_in_flight: None,
            work: Vec::new(),
        }
    }

    pub fn with_audit(mut self, audit: AuditLog) -> Self {
        self.audit = audit;
        self
    }

    pub fn handle(&self) -> SessionHandle {
        SessionHandle {
            tx: self.tx.clone(),
            state: self.store.subscribe(),
        }
    }

    pub fn snapshot(&self) -> Snapshot {
        self.store.snapshot()
    }

    /// Process events until `Shutdown`, then release everything
    pub async fn run(mut self) {
        self.enter().await;
        while let Some(event) = self.rx.recv().await {
            if !self.dispatch(event).await {
                break;
            }
        }
        self.exit().await;
    }

    /// Screen entry
    pub async fn enter(&mut self) {
        info!("👋 Session started");
        self.on_idle();
        if !self.caps.camera {
            warn!("📷 No camera permission, perception disabled");
            self.say(CAMERA_REQUIRED).await;
        }
        self.sync_resources().await;
    }

    /// Screen exit
    pub async fn exit(&mut self) {
        info!("👋 Session ending");
        self.cancel_timers();
        if let Some(capture) = self.capture.take() {
            capture.abort();
        }
        self.sos_in_flight = None;
        for task in self.work.drain(..) {
            task.abort();
        }
        self.slot.switch_to(None).await;
        self.light.stop();
        self.stop_speaking().await;
    }

    /// Handle one event. Returns false on `Shutdown`.
    pub async fn dispatch(&mut self, event: SessionEvent) -> bool {
        match event {
            SessionEvent::Tap => self.on_tap().await,
            SessionEvent::Utterance(text) => self.interpret(&text).await,
            SessionEvent::CaptureFinished(heard) => self.on_capture_finished(heard).await,
            SessionEvent::Objects {
                labels,
                bounds,
                direction,
            } => self.on_objects(&labels, bounds, direction).await,
            SessionEvent::Text(text) => self.on_text(&text).await,
            SessionEvent::Face(message) => self.on_face(&message).await,
            SessionEvent::Acceleration(reading) => {
                if self.fall.on_reading(reading, Instant::now()) {
                    self.on_fall_detected().await;
                }
            }
            SessionEvent::Lux(lux) => self.light.update_lux(lux),
            SessionEvent::FallDetected => self.on_fall_detected().await,
            SessionEvent::CountdownExpired { generation } => {
                self.on_countdown_expired(generation)
            }
            SessionEvent::ListenPrompt { generation } => self.on_listen_prompt(generation),
            SessionEvent::PhotoCaptured { generation, result } => {
                self.on_photo_captured(generation, result).await
            }
            SessionEvent::CloudFinished { generation, result } => {
                self.on_cloud_finished(generation, result).await
            }
            SessionEvent::SosFinished { generation, result } => {
                self.on_sos_finished(generation, result).await
            }
            SessionEvent::Shutdown => return false,
        }
        self.sync_resources().await;
        true
    }

    /// Clear reflex targets and rest
    pub fn on_idle(&mut self) {
        self.store.commit(Some(UiState::Idle), |m| m.clear_reflex_targets());
    }

    /// Like `on_idle`, but also cuts off speech
    pub async fn cancel_search(&mut self) {
        self.stop_speaking().await;
        self.on_idle();
    }

    /// Tap-to-interact: one action per current state
    pub async fn on_tap(&mut self) {
        match self.store.ui() {
            UiState::FallDetected if self.sos_dispatched() => {
                info!("🆘 Tap ignored, SOS already dispatched");
                self.say(SOS_IN_PROGRESS).await;
            }
            UiState::FallDetected => self.cancel_emergency("Cancelled", "SOS cancelled by tap").await,
            UiState::Processing(_) => self.cancel_search().await,
            UiState::Success { .. } => {
                self.stop_speaking().await;
                self.on_idle();
            }
            _ => self.begin_capture(true),
        }
    }

    /// Run one utterance through the arbiter and act on the result
    pub async fn interpret(&mut self, utterance: &str) {
        let text = self.normalizer.normalize(utterance);
        info!("📝 Heard: '{}'", text);

        let before = self.store.snapshot();
        if before.ui.is_fall_detected() && self.sos_dispatched() {
            let command = self.arbiter.parse(&text, before.modes.face_mode_on, true);
            if command == Command::CancelEmergency {
                info!("🆘 Cancel ignored, SOS already dispatched");
                self.say(SOS_IN_PROGRESS).await;
                return;
            }
        }

        let outcome = self.arbiter.interpret(&self.store, &text);
        if outcome.command == Command::CancelEmergency {
            self.cancel_timers();
            self.audit.record("SOS cancelled by voice");
        }
        if self.store.ui().is_capture_request() {
            self.request_photo();
        }

        if let Some(speech) = outcome.speech {
            self.say(&speech).await;
        }
    }

    /// Enter the emergency flow unless already in it
    pub async fn on_fall_detected(&mut self) {
        if self.store.ui().is_fall_detected() {
            debug!("Fall already being handled");
            return;
        }

        let snapshot = self.store.set_ui(UiState::FallDetected);
        warn!("🚨 Fall detected, SOS in {:?}", self.sos_countdown);
        self.audit.record("Fall detected");
        self.arm_emergency_timers(snapshot.generation);

        let warning = format!(
            "Fall detected. Sending SOS in {} seconds. Say Stop to cancel.",
            self.sos_countdown.as_secs()
        );
        self.say(&warning).await;
    }

    /// Ask the cloud about `image` using the sticky question
    pub async fn send_cloud_prompt(&mut self, image: CapturedImage) {
        let snapshot = self.store.set_ui(UiState::processing(ANALYZING));
        let question = snapshot.modes.last_cloud_prompt.clone();
        let generation = snapshot.generation;

        let cloud = Arc::clone(&self.cloud);
        let tx = self.tx.clone();
        self.spawn_work(async move {
            let result = cloud
                .describe(&image, &question)
                .await
                .map_err(|e| e.to_string());
            let _ = tx.send(SessionEvent::CloudFinished { generation, result }).await;
        });

        self.say(ANALYZING).await;
    }

    async fn cancel_emergency(&mut self, speech: &str, reason: &str) {
        info!("🛑 {}", reason);
        self.cancel_timers();
        self.audit.record(reason);
        self.on_idle();
        self.say(speech).await;
    }

    fn begin_capture(&mut self, show_listening: bool) {
        if self.capture.as_ref().is_some_and(|t| !t.is_finished()) {
            debug!("Voice capture already running");
            return;
        }
        if show_listening {
            self.store.set_ui(UiState::Listening);
        }
        info!("🎙️ Listening...");

        let voice = Arc::clone(&self.voice);
        let tx = self.tx.clone();
        self.capture = Some(tokio::spawn(async move {
            let heard = match voice.capture_utterance().await {
                Ok(transcript) => non_blank(transcript),
                Err(e) => {
                    warn!("🎙️ Voice capture failed: {}", e);
                    None
                }
            };
            let _ = tx.send(SessionEvent::CaptureFinished(heard)).await;
        }));
    }

    async fn on_capture_finished(&mut self, heard: Option<String>) {
        self.capture = None;
        match heard {
            Some(text) => self.interpret(&text).await,
            None => {
                debug!("Nothing heard");
                if self.store.ui() == UiState::Listening {
                    self.store.set_ui(UiState::Idle);
                }
            }
        }
    }

    async fn on_objects(&mut self, labels: &[String], bounds: Rect, direction: Direction) {
        let outcome = self
            .router
            .on_objects(&self.store, labels, bounds, direction, Instant::now());
        if let Some(pattern) = outcome.haptic {
            self.haptics.pulse(pattern);
        }
        if let Some(speech) = outcome.speech {
            self.say(&speech).await;
        }
    }

    async fn on_text(&mut self, text: &str) {
        if let Some(speech) = self.router.on_text(&self.store, text) {
            self.say(&speech).await;
        }
    }

    async fn on_face(&mut self, message: &str) {
        if let Some(speech) = self.router.on_face(&self.store, message) {
            self.say(&speech).await;
        }
    }

    fn arm_emergency_timers(&mut self, generation: u64) {
        self.cancel_timers();
        self.countdown = Some(self.post_after(
            self.sos_countdown,
            SessionEvent::CountdownExpired { generation },
        ));
        self.listen_prompt = Some(self.post_after(
            self.fall_listen_delay,
            SessionEvent::ListenPrompt { generation },
        ));
    }

    fn cancel_timers(&mut self) {
        for timer in [self.countdown.take(), self.listen_prompt.take()]
            .into_iter()
            .flatten()
        {
            timer.abort();
        }
    }

    fn post_after(&self, delay: Duration, event: SessionEvent) -> JoinHandle<()> {
        let tx = self.tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(event).await;
        })
    }

    /// True if `generation` is current and the session is still in a fall
    fn fall_still_pending(&self, generation: u64) -> bool {
        let snapshot = self.store.snapshot();
        snapshot.generation == generation && snapshot.ui.is_fall_detected()
    }

    fn on_countdown_expired(&mut self, generation: u64) {
        if !self.fall_still_pending(generation) {
            debug!("Countdown expired after the emergency ended");
            return;
        }
        self.countdown = None;
        self.sos_in_flight = Some(generation);
        info!("🆘 Countdown expired, sending SOS");

        let location = Arc::clone(&self.location);
        let sms = Arc::clone(&self.sms);
        let contact = self.emergency_contact.clone();
        let caps = self.caps;
        let tx = self.tx.clone();
        self.spawn_work(async move {
            let result = if caps.sms {
                dispatch_sos(location.as_ref(), sms.as_ref(), &contact, caps.location)
                    .await
                    .map(|_| ())
                    .map_err(|e| e.to_string())
            } else {
                Err("SMS permission denied".to_string())
            };
            let _ = tx
                .send(SessionEvent::SosFinished { generation, result })
                .await;
        });
    }

    /// True once the countdown for the current fall has expired
    fn sos_dispatched(&self) -> bool {
        self.sos_in_flight == Some(self.store.generation())
    }

    fn on_listen_prompt(&mut self, generation: u64) {
        if self.fall_still_pending(generation) {
            // Capture without leaving FallDetected so the countdown keeps running
            self.begin_capture(false);
        }
    }

    async fn on_sos_finished(&mut self, generation: u64, result: Result<(), String>) {
        if self.sos_in_flight == Some(generation) {
            self.sos_in_flight = None;
        }
        match &result {
            Ok(()) => self.audit.record("SOS sent"),
            Err(e) => {
                warn!("❌ SOS failed: {}", e);
                self.audit.record(&format!("SOS failed: {}", e));
            }
        }

        let snapshot = self.store.snapshot();
        if snapshot.ui.is_fall_detected() && snapshot.generation != generation {
            // A newer fall owns the screen and its countdown
            info!("🆘 Earlier SOS finished during a newer fall");
            return;
        }

        if result.is_ok() {
            self.store.set_ui(UiState::success(SOS_SENT));
            self.say("SOS sent with location.").await;
        } else {
            self.store.set_ui(UiState::error(SMS_FAILED));
            self.say("Could not send S O S.").await;
        }
    }

    fn request_photo(&mut self) {
        let generation = self.store.generation();
        let camera = Arc::clone(&self.camera);
        let max_dimension = self.capture_max_dimension;
        let allowed = self.caps.camera;
        let tx = self.tx.clone();
        self.spawn_work(async move {
            let result = if allowed {
                camera
                    .capture(max_dimension)
                    .await
                    .map_err(|e| e.to_string())
            } else {
                Err("camera permission denied".to_string())
            };
            let _ = tx
                .send(SessionEvent::PhotoCaptured { generation, result })
                .await;
        });
    }

    async fn on_photo_captured(&mut self, generation: u64, result: Result<CapturedImage, String>) {
        if generation != self.store.generation() {
            debug!("Photo arrived after the request was dismissed");
            return;
        }
        match result {
            Ok(image) => self.send_cloud_prompt(image).await,
            Err(e) => self.fail(format!("Camera Error: {}", e)).await,
        }
    }

    async fn on_cloud_finished(&mut self, generation: u64, result: Result<String, String>) {
        if generation != self.store.generation() {
            debug!("Dropping cloud answer for a dismissed request");
            return;
        }
        match result {
            Ok(answer) => {
                info!("☁️ {}", answer);
                self.store.set_ui(UiState::success(answer.clone()));
                self.say(&answer).await;
            }
            Err(e) => self.fail(format!("API Error: {}", e)).await,
        }
    }

    async fn fail(&mut self, message: String) {
        warn!("❌ {}", message);
        self.store.set_ui(UiState::error(message.clone()));
        self.say(&message).await;
    }

    /// Bring timers, the analyzer slot and light guidance in line with state
    async fn sync_resources(&mut self) {
        let snapshot = self.store.snapshot();
        if !snapshot.ui.is_fall_detected() {
            self.cancel_timers();
        }

        self.slot.switch_to(select_analyzer(&snapshot)).await;

        match (snapshot.modes.light_mode_on, self.light.is_running()) {
            (true, false) => self.light.start(),
            (false, true) => self.light.stop(),
            _ => {}
        }

        self.work.retain(|task| !task.is_finished());
    }

    fn spawn_work<F>(&mut self, work: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.work.push(tokio::spawn(work));
    }

    async fn say(&self, text: &str) {
        if let Err(e) = self.tts.speak(text).await {
            warn!("🔇 Could not speak '{}': {}", text, e);
        }
    }

    async fn stop_speaking(&self) {
        if let Err(e) = self.tts.stop().await {
            warn!("🔇 Could not stop speech: {}", e);
        }
    }
}
