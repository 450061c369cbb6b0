//! Page agent - the content-side task for one tab
//!
//! The agent owns everything that lives inside the page: the document, the
//! pointer tracker and the recognizer. It speaks through the speech channel
//! shared by all tabs. Nothing outside touches that state directly; the
//! coordinator talks to it through [`PageHandle`] probes over a channel and
//! awaits one-shot replies.

use futures_util::StreamExt;
use futures_util::stream::BoxStream;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{mpsc, oneshot};

use crate::command::{Command, CommandInterpreter, Outcome, PageActions};
use crate::config::Config;
use crate::cursor::CursorState;
use crate::dom::{Document, DomSurface, NodeId};
use crate::error::{Error, Result, recognition_error_message};
use crate::message::TabId;
use crate::speech::{RecognitionOptions, SpeechChannel, SpeechInput, TranscriptEvent};
use crate::theme::{THEME_ATTRIBUTE, Theme};

const ENABLE_LOGS: bool = true;
use crate::{log_debug, log_info, log_warn};

/// Window-level effects of commands: where the page is and what it did
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Navigation {
    pub url: String,
    pub scroll_y: f64,
    /// URLs opened in new tabs
    pub opened: Vec<String>,
    pub reloads: u32,
    pub clicked: Vec<NodeId>,
}

impl Navigation {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            ..Default::default()
        }
    }
}

impl PageActions for Navigation {
    fn open_url(&mut self, url: &str) {
        self.opened.push(url.to_string());
    }

    fn scroll_by(&mut self, dy: f64) {
        self.scroll_y = (self.scroll_y + dy).max(0.0);
    }

    fn reload(&mut self) {
        self.reloads += 1;
    }

    fn click(&mut self, node: NodeId) {
        self.clicked.push(node);
    }
}

/// Notifications from a page agent to the front-end
#[derive(Debug, Clone, PartialEq)]
pub enum PageEvent {
    Interim(String),
    Final(String),
    Executed { command: Command, outcome: Outcome },
    /// A final transcript that was not a command
    Ignored(String),
    RecognitionError(String),
    /// The recognizer finished on its own; listening is off
    ListeningEnded,
}

/// Read-only view of a page's state
#[derive(Debug, Clone, PartialEq)]
pub struct PageView {
    pub navigation: Navigation,
    pub theme: Option<String>,
    pub listening: bool,
    pub tracking: bool,
}

enum Probe {
    TrackPointer,
    PointerMove { x: f64, y: f64 },
    CursorText(oneshot::Sender<Option<String>>),
    SelectionText(oneshot::Sender<String>),
    SetSelection(String),
    Speak {
        text: String,
        reply: oneshot::Sender<Result<()>>,
    },
    CancelSpeech,
    Utterance(String),
    ApplyTheme {
        theme: Theme,
        reply: oneshot::Sender<()>,
    },
    StartListening(oneshot::Sender<Result<()>>),
    StopListening(oneshot::Sender<Result<()>>),
    View(oneshot::Sender<PageView>),
}

/// Everything a page agent is built from
pub struct PageParts {
    pub tab: TabId,
    pub url: String,
    pub document: Document,
    pub speech: SpeechChannel,
    pub recognizer: Box<dyn SpeechInput>,
}

struct PageAgent {
    tab: TabId,
    document: Document,
    navigation: Navigation,
    cursor: Option<CursorState>,
    speech: SpeechChannel,
    recognizer: Box<dyn SpeechInput>,
    listening: Arc<AtomicBool>,
    recognition: RecognitionOptions,
    transcripts: Option<BoxStream<'static, TranscriptEvent>>,
    interpreter: CommandInterpreter,
    events: Option<mpsc::UnboundedSender<(TabId, PageEvent)>>,
}

/// Spawn the agent for one page and return the handle used to probe it.
/// The agent runs until every handle is dropped.
pub fn spawn_page(
    parts: PageParts,
    config: &Config,
    events: Option<mpsc::UnboundedSender<(TabId, PageEvent)>>,
) -> PageHandle {
    let (tx, rx) = flume::unbounded();
    let listening = Arc::new(AtomicBool::new(false));
    let agent = PageAgent {
        tab: parts.tab,
        document: parts.document,
        navigation: Navigation::new(&parts.url),
        cursor: None,
        speech: parts.speech,
        recognizer: parts.recognizer,
        listening: Arc::clone(&listening),
        recognition: RecognitionOptions::from(&config.recognition),
        transcripts: None,
        interpreter: CommandInterpreter::new(&config.commands),
        events,
    };
    tokio::spawn(agent.run(rx));
    PageHandle {
        tab: parts.tab,
        tx,
        listening,
    }
}

impl PageAgent {
    async fn run(mut self, rx: flume::Receiver<Probe>) {
        log_debug!("page agent for tab {} started", self.tab);
        loop {
            tokio::select! {
                probe = rx.recv_async() => match probe {
                    Ok(probe) => self.handle(probe),
                    Err(_) => break,
                },
                event = next_transcript(&mut self.transcripts) => match event {
                    Some(event) => self.on_transcript(event),
                    None => {
                        log_debug!("tab {}: recognition ended", self.tab);
                        self.transcripts = None;
                        self.listening.store(false, Ordering::SeqCst);
                        self.notify(PageEvent::ListeningEnded);
                    }
                },
            }
        }
        let _ = self.recognizer.stop();
        self.listening.store(false, Ordering::SeqCst);
        self.speech.cancel(self.tab);
        log_debug!("page agent for tab {} stopped", self.tab);
    }

    fn handle(&mut self, probe: Probe) {
        match probe {
            Probe::TrackPointer => {
                self.cursor.get_or_insert_with(CursorState::new);
            }
            Probe::PointerMove { x, y } => {
                if let Some(cursor) = self.cursor.as_mut() {
                    cursor.move_to(x, y);
                }
            }
            Probe::CursorText(reply) => {
                // An untracked pointer has no position to read yet
                let text = match self.cursor.as_mut() {
                    Some(cursor) => cursor.probe(&self.document).map(|s| s.cleaned_text),
                    None => {
                        self.cursor = Some(CursorState::new());
                        None
                    }
                };
                let _ = reply.send(text);
            }
            Probe::SelectionText(reply) => {
                let _ = reply.send(self.document.selection_text());
            }
            Probe::SetSelection(text) => self.document.set_selection(&text),
            Probe::Speak { text, reply } => {
                let result = self.speech.say(self.tab, &text);
                if let Err(e) = &result {
                    log_warn!("tab {}: {}", self.tab, e);
                }
                let _ = reply.send(result);
            }
            Probe::CancelSpeech => self.speech.cancel(self.tab),
            Probe::Utterance(text) => self.on_transcript(TranscriptEvent::Final(text)),
            Probe::ApplyTheme { theme, reply } => {
                theme.apply(&mut self.document);
                log_info!("tab {}: theme {}", self.tab, theme.name());
                let _ = reply.send(());
            }
            Probe::StartListening(reply) => {
                let _ = reply.send(self.start_listening());
            }
            Probe::StopListening(reply) => {
                self.transcripts = None;
                self.listening.store(false, Ordering::SeqCst);
                let _ = reply.send(self.recognizer.stop());
            }
            Probe::View(reply) => {
                let root = self.document.root();
                let _ = reply.send(PageView {
                    navigation: self.navigation.clone(),
                    theme: self
                        .document
                        .attribute(root, THEME_ATTRIBUTE)
                        .map(str::to_string),
                    listening: self.transcripts.is_some(),
                    tracking: self.cursor.is_some(),
                });
            }
        }
    }

    fn start_listening(&mut self) -> Result<()> {
        if self.transcripts.is_some() && self.recognizer.is_running() {
            log_debug!("tab {}: recognition already running", self.tab);
            return Ok(());
        }
        let stream = self.recognizer.start(&self.recognition)?;
        self.transcripts = Some(stream);
        self.listening.store(true, Ordering::SeqCst);
        log_info!("tab {}: listening ({})", self.tab, self.recognition.lang);
        Ok(())
    }

    fn on_transcript(&mut self, event: TranscriptEvent) {
        match event {
            TranscriptEvent::Interim(text) => {
                log_debug!("tab {}: interim {:?}", self.tab, text);
                self.notify(PageEvent::Interim(text));
            }
            TranscriptEvent::Final(text) => {
                log_info!("tab {}: recognized {:?}", self.tab, text);
                self.notify(PageEvent::Final(text.clone()));
                match self.interpreter.interpret(&text) {
                    Some(command) => self.execute(command),
                    None => self.notify(PageEvent::Ignored(text)),
                }
            }
            TranscriptEvent::Error(code) => {
                let message = recognition_error_message(&code);
                log_warn!("tab {}: {}", self.tab, Error::Recognition(code));
                self.notify(PageEvent::RecognitionError(message.to_string()));
            }
        }
    }

    fn execute(&mut self, command: Command) {
        let outcome = self
            .interpreter
            .execute(&command, &self.document, &mut self.navigation);
        if outcome == Outcome::Reloaded {
            if let Some(cursor) = self.cursor.as_mut() {
                cursor.reset();
            }
        }
        log_info!("tab {}: {} -> {:?}", self.tab, command, outcome);
        self.notify(PageEvent::Executed { command, outcome });
    }

    fn notify(&self, event: PageEvent) {
        if let Some(events) = &self.events {
            let _ = events.send((self.tab, event));
        }
    }
}

async fn next_transcript(
    transcripts: &mut Option<BoxStream<'static, TranscriptEvent>>,
) -> Option<TranscriptEvent> {
    match transcripts {
        Some(stream) => stream.next().await,
        None => std::future::pending().await,
    }
}

/// Cloneable client for one page agent
#[derive(Clone)]
pub struct PageHandle {
    tab: TabId,
    tx: flume::Sender<Probe>,
    listening: Arc<AtomicBool>,
}

impl PageHandle {
    pub fn tab(&self) -> TabId {
        self.tab
    }

    /// The agent has shut down
    pub fn is_closed(&self) -> bool {
        self.tx.is_disconnected()
    }

    /// Speech recognition is running; cleared as soon as it ends on its own
    pub fn is_listening(&self) -> bool {
        self.listening.load(Ordering::SeqCst)
    }

    async fn request<T>(&self, probe: impl FnOnce(oneshot::Sender<T>) -> Probe) -> Result<T> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send_async(probe(reply))
            .await
            .map_err(|_| Error::ProbeFailed(format!("tab {} is gone", self.tab)))?;
        rx.await
            .map_err(|_| Error::ProbeFailed(format!("tab {} returned no result", self.tab)))
    }

    fn post(&self, probe: Probe) {
        if self.tx.send(probe).is_err() {
            log_debug!("tab {} is gone, dropping probe", self.tab);
        }
    }

    /// Install the pointer tracker if it is not there yet
    pub fn track_pointer(&self) {
        self.post(Probe::TrackPointer);
    }

    pub fn pointer_move(&self, x: f64, y: f64) {
        self.post(Probe::PointerMove { x, y });
    }

    /// Cleaned text under the pointer if it moved onto a new element
    pub async fn cursor_text(&self) -> Result<Option<String>> {
        self.request(Probe::CursorText).await
    }

    pub async fn selection_text(&self) -> Result<String> {
        self.request(Probe::SelectionText).await
    }

    pub fn set_selection(&self, text: &str) {
        self.post(Probe::SetSelection(text.to_string()));
    }

    pub async fn speak(&self, text: &str) -> Result<()> {
        let text = text.to_string();
        self.request(|reply| Probe::Speak { text, reply }).await?
    }

    /// Speak without waiting for the agent
    pub fn say(&self, text: String) {
        let (reply, _) = oneshot::channel();
        self.post(Probe::Speak { text, reply });
    }

    pub fn cancel_speech(&self) {
        self.post(Probe::CancelSpeech);
    }

    /// Treat `text` as a final transcript from the recognizer
    pub fn utterance(&self, text: &str) {
        self.post(Probe::Utterance(text.to_string()));
    }

    pub async fn apply_theme(&self, theme: Theme) -> Result<()> {
        self.request(|reply| Probe::ApplyTheme { theme, reply }).await
    }

    pub async fn start_listening(&self) -> Result<()> {
        self.request(Probe::StartListening).await?
    }

    pub async fn stop_listening(&self) -> Result<()> {
        self.request(Probe::StopListening).await?
    }

    pub async fn view(&self) -> Result<PageView> {
        self.request(Probe::View).await
    }
}
