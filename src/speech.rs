use futures_util::StreamExt;
use futures_util::stream::BoxStream;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;

use crate::config::{RecognitionConfig, SpeechConfig};
use crate::error::{Error, Result};
use crate::message::TabId;
use crate::ui;

const ENABLE_LOGS: bool = true;
use crate::log_debug;

// ============================================================================
// Speech output
// ============================================================================

/// One request to the synthesizer
#[derive(Debug, Clone, PartialEq)]
pub struct Utterance {
    pub text: String,
    pub lang: String,
    pub rate: f32,
    pub pitch: f32,
    pub volume: f32,
}

impl Utterance {
    pub fn new(text: &str, config: &SpeechConfig) -> Self {
        Self {
            text: text.to_string(),
            lang: config.lang.clone(),
            rate: config.rate,
            pitch: config.pitch,
            volume: config.volume.clamp(0.0, 1.0),
        }
    }
}

/// Native text-to-speech capability. `speak` is fire-and-forget.
pub trait SpeechOutput: Send {
    fn is_supported(&self) -> bool {
        true
    }
    fn cancel(&mut self);
    fn speak(&mut self, utterance: Utterance);
}

/// Cancel-then-speak wrapper around a synthesizer
///
/// Every new utterance cancels whatever is still being spoken, so at most
/// one utterance is ever active.
pub struct Speaker {
    output: Box<dyn SpeechOutput>,
    config: SpeechConfig,
}

impl Speaker {
    pub fn new(output: Box<dyn SpeechOutput>, config: SpeechConfig) -> Self {
        Self { output, config }
    }

    /// Cancel current speech and speak `text`. Empty text only cancels.
    pub fn say(&mut self, text: &str) -> Result<()> {
        if !self.output.is_supported() {
            return Err(Error::Unsupported("Speech synthesis"));
        }
        self.output.cancel();
        if text.is_empty() {
            return Ok(());
        }
        self.output.speak(Utterance::new(text, &self.config));
        Ok(())
    }

    /// Stop any ongoing speech
    pub fn stop(&mut self) {
        self.output.cancel();
    }

    pub fn is_supported(&self) -> bool {
        self.output.is_supported()
    }
}

struct ChannelState {
    speaker: Speaker,
    /// Tab whose utterance is current
    owner: Option<TabId>,
}

/// The single speech channel shared by every tab
///
/// Speaking from any tab cancels whatever another tab was saying. A tab can
/// only cancel speech it started itself.
#[derive(Clone)]
pub struct SpeechChannel {
    state: Arc<Mutex<ChannelState>>,
}

impl SpeechChannel {
    pub fn new(output: Box<dyn SpeechOutput>, config: SpeechConfig) -> Self {
        Self {
            state: Arc::new(Mutex::new(ChannelState {
                speaker: Speaker::new(output, config),
                owner: None,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ChannelState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn is_supported(&self) -> bool {
        self.lock().speaker.is_supported()
    }

    /// Speak `text` for `tab`, interrupting any tab's current utterance
    pub fn say(&self, tab: TabId, text: &str) -> Result<()> {
        let mut state = self.lock();
        state.speaker.say(text)?;
        state.owner = (!text.is_empty()).then_some(tab);
        Ok(())
    }

    /// Stop speech started by `tab`; other tabs' speech is left alone
    pub fn cancel(&self, tab: TabId) {
        let mut state = self.lock();
        if state.owner == Some(tab) {
            state.speaker.stop();
            state.owner = None;
        }
    }

    pub fn owner(&self) -> Option<TabId> {
        self.lock().owner
    }
}

/// Speaks by printing to the terminal
pub struct ConsoleSpeech;

impl SpeechOutput for ConsoleSpeech {
    fn cancel(&mut self) {}

    fn speak(&mut self, utterance: Utterance) {
        ui::speaking(&utterance.text);
    }
}

/// What a [`MemorySpeech`] observed
#[derive(Debug, Clone, PartialEq)]
pub enum SpeechEvent {
    Cancelled,
    Spoke(Utterance),
}

pub type SpeechLog = Arc<Mutex<Vec<SpeechEvent>>>;

/// Records calls into a shared log instead of producing audio
#[derive(Clone, Default)]
pub struct MemorySpeech {
    log: SpeechLog,
}

impl MemorySpeech {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log(&self) -> SpeechLog {
        Arc::clone(&self.log)
    }

    /// Texts spoken so far, in order
    pub fn spoken(&self) -> Vec<String> {
        self.log
            .lock()
            .map(|log| {
                log.iter()
                    .filter_map(|e| match e {
                        SpeechEvent::Spoke(u) => Some(u.text.clone()),
                        SpeechEvent::Cancelled => None,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    fn record(&self, event: SpeechEvent) {
        if let Ok(mut log) = self.log.lock() {
            log.push(event);
        }
    }
}

impl SpeechOutput for MemorySpeech {
    fn cancel(&mut self) {
        self.record(SpeechEvent::Cancelled);
    }

    fn speak(&mut self, utterance: Utterance) {
        self.record(SpeechEvent::Spoke(utterance));
    }
}

// ============================================================================
// Speech input
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecognitionOptions {
    pub continuous: bool,
    pub interim: bool,
    pub lang: String,
}

impl From<&RecognitionConfig> for RecognitionOptions {
    fn from(config: &RecognitionConfig) -> Self {
        Self {
            continuous: config.continuous,
            interim: config.interim,
            lang: config.lang.clone(),
        }
    }
}

/// Events from the recognizer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranscriptEvent {
    /// Partial hypothesis, may still change
    Interim(String),
    Final(String),
    /// Recognizer error code (`no-speech`, `not-allowed`, ...)
    Error(String),
}

/// Native speech-to-text capability
pub trait SpeechInput: Send {
    /// Begin recognition; transcripts arrive on the returned stream until `stop`.
    fn start(&mut self, options: &RecognitionOptions) -> Result<BoxStream<'static, TranscriptEvent>>;
    fn stop(&mut self) -> Result<()>;
    fn is_running(&self) -> bool;
}

/// Recognizer fed from a channel: the terminal front-end and tests push
/// transcripts through a [`TranscriptFeed`].
pub struct ChannelRecognizer {
    rx: flume::Receiver<TranscriptEvent>,
    running: Option<CancellationToken>,
    supported: bool,
    permitted: bool,
    interim: bool,
}

/// Sending side of a [`ChannelRecognizer`]
#[derive(Clone)]
pub struct TranscriptFeed {
    tx: flume::Sender<TranscriptEvent>,
}

impl TranscriptFeed {
    pub fn send(&self, event: TranscriptEvent) -> bool {
        self.tx.send(event).is_ok()
    }

    pub fn say(&self, text: &str) -> bool {
        self.send(TranscriptEvent::Final(text.to_string()))
    }
}

impl ChannelRecognizer {
    pub fn new() -> (Self, TranscriptFeed) {
        let (tx, rx) = flume::unbounded();
        let recognizer = Self {
            rx,
            running: None,
            supported: true,
            permitted: true,
            interim: true,
        };
        (recognizer, TranscriptFeed { tx })
    }

    /// Behave like a browser without a recognition API
    pub fn unsupported(mut self) -> Self {
        self.supported = false;
        self
    }

    /// Behave as if microphone access was refused
    pub fn denied(mut self) -> Self {
        self.permitted = false;
        self
    }
}

impl SpeechInput for ChannelRecognizer {
    fn start(&mut self, options: &RecognitionOptions) -> Result<BoxStream<'static, TranscriptEvent>> {
        if !self.supported {
            return Err(Error::Unsupported("Speech recognition"));
        }
        if !self.permitted {
            return Err(Error::PermissionDenied);
        }
        if let Some(previous) = self.running.take() {
            previous.cancel();
        }
        // Nothing said while the microphone was off is heard
        let stale = self.rx.drain().count();
        if stale > 0 {
            log_debug!("dropped {} transcript(s) queued before start", stale);
        }

        let token = CancellationToken::new();
        self.running = Some(token.clone());
        self.interim = options.interim;
        let interim = self.interim;
        let continuous = options.continuous;
        let session = token.clone();

        let stream = self
            .rx
            .clone()
            .into_stream()
            .filter(move |event| {
                let keep = interim || !matches!(event, TranscriptEvent::Interim(_));
                std::future::ready(keep)
            })
            .take_until(token.cancelled_owned())
            .scan((), move |_, event| {
                // A one-shot session ends with its first final result
                if !continuous && matches!(event, TranscriptEvent::Final(_)) {
                    session.cancel();
                }
                std::future::ready(Some(event))
            });
        Ok(stream.boxed())
    }

    fn stop(&mut self) -> Result<()> {
        if let Some(token) = self.running.take() {
            token.cancel();
        }
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.running.as_ref().is_some_and(|token| !token.is_cancelled())
    }
}
