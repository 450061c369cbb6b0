//! Coordinator - the background side of the extension
//!
//! Receives popup requests, checks that the target page may run the
//! requested feature, and drives the tab's page agent and reading sessions.
//! Every request gets exactly one [`Response`]; failures become error
//! responses and never take the coordinator down.

use futures_util::FutureExt;
use tokio::sync::mpsc;

use crate::config::Config;
use crate::dom::Document;
use crate::error::{Error, Result};
use crate::message::{Envelope, Request, Response, TabId};
use crate::page::{PageEvent, PageHandle, PageParts, spawn_page};
use crate::poll::{PollMode, start_polling};
use crate::session::{SessionManager, TabSession};
use crate::speech::{SpeechChannel, SpeechInput, SpeechOutput};
use crate::theme::Theme;

const ENABLE_LOGS: bool = true;
use crate::{log_debug, log_info, log_warn};

pub struct Coordinator {
    config: Config,
    sessions: SessionManager,
    /// The one synthesizer every tab speaks through
    speech: SpeechChannel,
    events: Option<mpsc::UnboundedSender<(TabId, PageEvent)>>,
}

impl Coordinator {
    pub fn new(config: Config, speech: Box<dyn SpeechOutput>) -> Self {
        let speech = SpeechChannel::new(speech, config.speech.clone());
        Self {
            config,
            sessions: SessionManager::new(),
            speech,
            events: None,
        }
    }

    /// Forward page notifications (transcripts, executed commands) to `tx`
    pub fn with_events(mut self, tx: mpsc::UnboundedSender<(TabId, PageEvent)>) -> Self {
        self.events = Some(tx);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    /// Load a page into a new tab and make it the active one.
    /// Must be called within a tokio runtime.
    pub fn open_tab(
        &mut self,
        url: &str,
        document: Document,
        recognizer: Box<dyn SpeechInput>,
    ) -> TabId {
        let tab = self.sessions.next_tab_id();
        let page = spawn_page(
            PageParts {
                tab,
                url: url.to_string(),
                document,
                speech: self.speech.clone(),
                recognizer,
            },
            &self.config,
            self.events.clone(),
        );
        self.sessions.insert(tab, url, page);
        log_info!("opened tab {} at {}", tab, url);
        tab
    }

    pub fn close_tab(&mut self, tab: TabId) -> bool {
        let closed = self.sessions.remove(tab);
        if closed {
            log_info!("closed tab {}", tab);
        }
        closed
    }

    pub fn activate(&mut self, tab: TabId) -> bool {
        self.sessions.activate(tab)
    }

    /// Page agent for `tab`, or for the active tab
    pub fn page(&self, tab: Option<TabId>) -> Result<PageHandle> {
        let tab = self.target(tab)?;
        self.sessions
            .get(tab)
            .map(|session| session.page.clone())
            .ok_or(Error::UnknownTab(tab))
    }

    fn target(&self, tab: Option<TabId>) -> Result<TabId> {
        tab.or(self.sessions.active()).ok_or(Error::NoActiveTab)
    }

    /// Handle one JSON request line
    pub async fn dispatch_json(&mut self, json: &str) -> Response {
        match Envelope::from_json(json) {
            Ok(envelope) => self.dispatch(envelope).await,
            Err(e) => {
                log_debug!("rejected request {:?}: {}", json, e);
                Response::error(format!("invalid request: {}", e))
            }
        }
    }

    pub async fn dispatch(&mut self, envelope: Envelope) -> Response {
        self.handle(envelope.tab, envelope.request).await
    }

    pub async fn handle(&mut self, tab: Option<TabId>, request: Request) -> Response {
        let action = request.action();
        match self.try_handle(tab, request).await {
            Ok(response) => {
                log_debug!("{} -> {}", action, response.to_json());
                response
            }
            Err(e) => {
                log_warn!("{} failed: {}", action, e);
                e.into()
            }
        }
    }

    async fn try_handle(&mut self, tab: Option<TabId>, request: Request) -> Result<Response> {
        let tab = self.target(tab)?;
        let config = &self.config;
        let speech = &self.speech;
        let session = self.sessions.get_mut(tab).ok_or(Error::UnknownTab(tab))?;

        if let Some(feature) = request.page_feature() {
            if let Some(prefix) = config.restricted_prefix(&session.url) {
                return Err(Error::RestrictedContext {
                    feature,
                    prefix: prefix.to_string(),
                });
            }
        }

        match request {
            Request::StartListening => {
                session.page.start_listening().await?;
                Ok(Response::success())
            }
            Request::StopListening => {
                session.page.stop_listening().await?;
                Ok(Response::success())
            }
            Request::EnableTts => {
                enable_selection_reading(config, speech, session)?;
                Ok(Response::success())
            }
            Request::DisableTts => {
                disable_reading(session, PollMode::Selection);
                Ok(Response::success())
            }
            Request::EnableCursorReading => {
                enable_cursor_reading(config, speech, session)?;
                Ok(Response::success())
            }
            Request::DisableCursorReading => {
                disable_reading(session, PollMode::Cursor);
                Ok(Response::success())
            }
            Request::CheckTtsStatus => Ok(Response::TtsStatus {
                enabled: session.is_active(PollMode::Selection),
                cursor_enabled: session.is_active(PollMode::Cursor),
            }),
            Request::ApplyTheme { theme } => {
                let theme: Theme = theme.parse()?;
                session.page.apply_theme(theme).await?;
                session.theme = theme;
                Ok(Response::success())
            }
        }
    }

    /// Stop every session and drop every page agent
    pub fn shutdown(&mut self) {
        log_info!("shutting down {} tab(s)", self.sessions.len());
        self.sessions.shutdown();
    }
}

/// Speak the page's selection whenever it changes
fn enable_selection_reading(
    config: &Config,
    speech: &SpeechChannel,
    session: &mut TabSession,
) -> Result<()> {
    // Empty speech only cancels; it fails if nothing can speak at all
    speech.say(session.page.tab(), "")?;

    let sampler = session.page.clone();
    let speaker = session.page.clone();
    let handle = start_polling(
        PollMode::Selection,
        config.polling.selection_interval(),
        move || {
            let page = sampler.clone();
            async move { page.selection_text().await.map(Some) }.boxed()
        },
        move |text| speaker.say(text),
    );
    session.start(handle);
    log_info!("selection reading enabled on {}", session.url);
    Ok(())
}

/// Speak the element under the pointer whenever the pointer reaches a new one
fn enable_cursor_reading(
    config: &Config,
    speech: &SpeechChannel,
    session: &mut TabSession,
) -> Result<()> {
    speech.say(session.page.tab(), "")?;
    session.page.track_pointer();

    let sampler = session.page.clone();
    let speaker = session.page.clone();
    let handle = start_polling(
        PollMode::Cursor,
        config.polling.cursor_interval(),
        move || {
            let page = sampler.clone();
            async move { page.cursor_text().await }.boxed()
        },
        move |text| speaker.say(text),
    );
    session.start(handle);
    log_info!("cursor reading enabled on {}", session.url);
    Ok(())
}

fn disable_reading(session: &mut TabSession, mode: PollMode) {
    if session.stop(mode) {
        log_info!("{} reading disabled on {}", mode.label(), session.url);
    }
    session.page.cancel_speech();
}
