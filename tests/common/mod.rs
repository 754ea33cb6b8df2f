pub mod mock_asr;
pub mod mock_tts;

pub use mock_asr::MockAsr;
pub use mock_tts::MockTts;

use anyhow::Result;
use async_trait::async_trait;
use sightguide::audit::AuditLog;
use sightguide::camera::{Camera, CapturedImage};
use sightguide::cloud::VisionService;
use sightguide::config::Config;
use sightguide::emergency::{GeoPoint, LocationProvider, SmsGateway};
use sightguide::haptics::{HapticPattern, Haptics};
use sightguide::perception::{AnalyzerKind, FrameAnalyzer, PerceptionSink};
use sightguide::sensors::Beeper;
use sightguide::session::{Capabilities, Collaborators, Session, SessionHandle};
use sightguide::state::Snapshot;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::task::JoinHandle;

/// Cloud backend with a canned reply
#[derive(Debug)]
pub struct MockCloud {
    reply: Result<String, String>,
    delay: Duration,
    pub questions: Mutex<Vec<String>>,
}

impl MockCloud {
    pub fn answering(text: &str) -> Self {
        Self {
            reply: Ok(text.to_string()),
            delay: Duration::ZERO,
            questions: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(error: &str) -> Self {
        Self {
            reply: Err(error.to_string()),
            ..Self::answering("")
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn get_questions(&self) -> Vec<String> {
        self.questions.lock().unwrap().clone()
    }
}

#[async_trait]
impl VisionService for MockCloud {
    async fn describe(&self, _image: &CapturedImage, question: &str) -> Result<String> {
        self.questions.lock().unwrap().push(question.to_string());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.reply.clone().map_err(|e| anyhow::anyhow!(e))
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// Camera returning a tiny JPEG, recording the requested size
#[derive(Debug, Default)]
pub struct MockCamera {
    pub requested: Mutex<Vec<u32>>,
}

#[async_trait]
impl Camera for MockCamera {
    async fn capture(&self, max_dimension: u32) -> Result<CapturedImage> {
        self.requested.lock().unwrap().push(max_dimension);
        Ok(CapturedImage::jpeg(vec![0xff, 0xd8, 0xff]))
    }
}

/// Location fix that can take a while to arrive
#[derive(Debug)]
pub struct MockLocation {
    pub point: Option<GeoPoint>,
    pub delay: Duration,
}

#[async_trait]
impl LocationProvider for MockLocation {
    async fn current_location(&self) -> Result<Option<GeoPoint>> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(self.point)
    }
}

#[derive(Debug, Default)]
pub struct MockSms {
    pub sent: Mutex<Vec<(String, String)>>,
    pub should_fail: AtomicBool,
}

impl MockSms {
    pub fn get_sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl SmsGateway for MockSms {
    async fn send(&self, recipient: &str, message: &str) -> Result<()> {
        if self.should_fail.load(Ordering::SeqCst) {
            return Err(anyhow::anyhow!("no signal"));
        }
        self.sent
            .lock()
            .unwrap()
            .push((recipient.to_string(), message.to_string()));
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MockHaptics {
    pub pulses: Mutex<Vec<HapticPattern>>,
}

impl Haptics for MockHaptics {
    fn pulse(&self, pattern: HapticPattern) {
        self.pulses.lock().unwrap().push(pattern);
    }
}

#[derive(Debug, Default)]
pub struct MockBeeper {
    pub beeps: AtomicUsize,
}

impl Beeper for MockBeeper {
    fn beep(&self, _duration: Duration) {
        self.beeps.fetch_add(1, Ordering::SeqCst);
    }
}

/// Analyzer that keeps its sink so tests can push detections
#[derive(Debug)]
pub struct MockAnalyzer {
    kind: AnalyzerKind,
    log: Arc<Mutex<Vec<String>>>,
    sink: Mutex<Option<PerceptionSink>>,
}

impl MockAnalyzer {
    pub fn new(kind: AnalyzerKind, log: Arc<Mutex<Vec<String>>>) -> Self {
        Self {
            kind,
            log,
            sink: Mutex::new(None),
        }
    }

    pub fn sink(&self) -> Option<PerceptionSink> {
        self.sink.lock().unwrap().clone()
    }
}

#[async_trait]
impl FrameAnalyzer for MockAnalyzer {
    async fn attach(&self, sink: PerceptionSink) -> Result<()> {
        self.log.lock().unwrap().push(format!("attach {:?}", self.kind));
        *self.sink.lock().unwrap() = Some(sink);
        Ok(())
    }

    async fn detach(&self) -> Result<()> {
        self.log.lock().unwrap().push(format!("detach {:?}", self.kind));
        *self.sink.lock().unwrap() = None;
        Ok(())
    }
}

/// A session wired entirely to mocks
pub struct TestRig {
    pub config: Config,
    pub caps: Capabilities,
    pub tts: Arc<MockTts>,
    pub asr: Arc<MockAsr>,
    pub cloud: Arc<MockCloud>,
    pub camera: Arc<MockCamera>,
    pub sms: Arc<MockSms>,
    pub haptics: Arc<MockHaptics>,
    pub beeper: Arc<MockBeeper>,
    pub faces: Arc<MockAnalyzer>,
    pub objects: Arc<MockAnalyzer>,
    pub analyzer_log: Arc<Mutex<Vec<String>>>,
    pub location: Option<GeoPoint>,
    pub location_delay: Duration,
    pub temp_dir: TempDir,
}

impl TestRig {
    pub fn new() -> Self {
        let analyzer_log = Arc::new(Mutex::new(Vec::new()));
        let mut config = Config::default();
        config.emergency_contact = "5550100".to_string();

        Self {
            config,
            caps: Capabilities::default(),
            tts: Arc::new(MockTts::new()),
            asr: Arc::new(MockAsr::new()),
            cloud: Arc::new(MockCloud::answering("A door is three steps ahead.")),
            camera: Arc::new(MockCamera::default()),
            sms: Arc::new(MockSms::default()),
            haptics: Arc::new(MockHaptics::default()),
            beeper: Arc::new(MockBeeper::default()),
            faces: Arc::new(MockAnalyzer::new(AnalyzerKind::Face, analyzer_log.clone())),
            objects: Arc::new(MockAnalyzer::new(
                AnalyzerKind::ObjectText,
                analyzer_log.clone(),
            )),
            analyzer_log,
            location: Some(GeoPoint {
                latitude: 51.5,
                longitude: -0.12,
            }),
            location_delay: Duration::ZERO,
            temp_dir: tempfile::tempdir().expect("Failed to create temp dir"),
        }
    }

    pub fn with_cloud(mut self, cloud: MockCloud) -> Self {
        self.cloud = Arc::new(cloud);
        self
    }

    pub fn with_location_delay(mut self, delay: Duration) -> Self {
        self.location_delay = delay;
        self
    }

    pub fn with_caps(mut self, caps: Capabilities) -> Self {
        self.caps = caps;
        self
    }

    pub fn audit_path(&self) -> PathBuf {
        self.temp_dir.path().join("audit.log")
    }

    pub fn audit_entries(&self) -> String {
        std::fs::read_to_string(self.audit_path()).unwrap_or_default()
    }

    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            tts: self.tts.clone(),
            voice: self.asr.clone(),
            cloud: self.cloud.clone(),
            camera: self.camera.clone(),
            location: Arc::new(MockLocation {
                point: self.location,
                delay: self.location_delay,
            }),
            sms: self.sms.clone(),
            haptics: self.haptics.clone(),
            beeper: self.beeper.clone(),
            face_analyzer: Some(self.faces.clone() as Arc<dyn FrameAnalyzer>),
            object_analyzer: Some(self.objects.clone() as Arc<dyn FrameAnalyzer>),
        }
    }

    /// Spawn the session and return its handle
    pub fn start(&self) -> (SessionHandle, JoinHandle<()>) {
        let session = Session::new(&self.config, self.collaborators(), self.caps)
            .with_audit(AuditLog::at(self.audit_path()));
        let handle = session.handle();
        let task = tokio::spawn(session.run());
        (handle, task)
    }

    pub fn analyzer_events(&self) -> Vec<String> {
        self.analyzer_log.lock().unwrap().clone()
    }

    pub async fn wait_spoken(&self, text: &str) {
        eventually(|| self.tts.was_spoken(text)).await;
    }
}

/// Wait (in paused time) for the session to reach a matching snapshot
pub async fn wait_until<F>(handle: &SessionHandle, predicate: F) -> Snapshot
where
    F: FnMut(&Snapshot) -> bool,
{
    tokio::time::timeout(Duration::from_secs(120), handle.wait_for(predicate))
        .await
        .expect("session never reached the expected state")
        .expect("session ended")
}

/// Poll `check` until it holds, advancing time a millisecond at a time
pub async fn eventually<F>(mut check: F)
where
    F: FnMut() -> bool,
{
    for _ in 0..5000 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    panic!("condition never became true");
}
