//! REPL input handling - one line of terminal input at a time
//!
//! A line is either a JSON request (the same messages the popup sends) or a
//! slash command standing in for what the user would do in the browser:
//! moving the pointer, selecting text, or speaking.

use std::ops::ControlFlow;

use crate::coordinator::Coordinator;
use crate::message::{Envelope, Response, TabId};
use crate::poll::PollMode;
use crate::speech::TranscriptFeed;
use crate::ui;

pub const HELP: &str = "\
JSON requests:    {\"action\":\"enableTTS\"}  {\"action\":\"applyTheme\",\"theme\":\"protanopia\"}
                  actions: startListening stopListening enableTTS disableTTS
                           enableCursorReading disableCursorReading checkTTSStatus applyTheme
/move X Y         move the pointer
/select TEXT      select text on the page
/say TEXT         speak a phrase into the microphone
/tab N            switch the active tab
/status           show tabs and sessions
/help             show this help
/quit             exit";

#[derive(Debug, Clone, PartialEq)]
pub enum ReplInput {
    Request(Envelope),
    Move { x: f64, y: f64 },
    Select(String),
    Say(String),
    Tab(TabId),
    Status,
    Help,
    Quit,
    Empty,
}

/// Parse one line of input
pub fn parse_line(line: &str) -> Result<ReplInput, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(ReplInput::Empty);
    }
    if line.starts_with('{') {
        return Envelope::from_json(line)
            .map(ReplInput::Request)
            .map_err(|e| format!("invalid request: {}", e));
    }
    let Some(command) = line.strip_prefix('/') else {
        return Err(format!("unrecognized input: {} (try /help)", line));
    };

    let (name, rest) = command.split_once(' ').unwrap_or((command, ""));
    let rest = rest.trim();
    match name {
        "move" => {
            let mut coords = rest.split_whitespace().map(str::parse::<f64>);
            match (coords.next(), coords.next(), coords.next()) {
                (Some(Ok(x)), Some(Ok(y)), None) => Ok(ReplInput::Move { x, y }),
                _ => Err("usage: /move X Y".to_string()),
            }
        }
        "select" => Ok(ReplInput::Select(rest.to_string())),
        "say" if !rest.is_empty() => Ok(ReplInput::Say(rest.to_string())),
        "say" => Err("usage: /say TEXT".to_string()),
        "tab" => rest
            .parse()
            .map(ReplInput::Tab)
            .map_err(|_| "usage: /tab N".to_string()),
        "status" => Ok(ReplInput::Status),
        "help" | "?" => Ok(ReplInput::Help),
        "quit" | "exit" | "q" => Ok(ReplInput::Quit),
        other => Err(format!("unknown command: /{}", other)),
    }
}

/// Microphone feeds of the open tabs
pub trait Microphones {
    fn feed(&self, tab: TabId) -> Option<&TranscriptFeed>;
}

impl Microphones for std::collections::BTreeMap<TabId, TranscriptFeed> {
    fn feed(&self, tab: TabId) -> Option<&TranscriptFeed> {
        self.get(&tab)
    }
}

/// Run one parsed input against the coordinator
pub async fn handle_input(
    input: ReplInput,
    coordinator: &mut Coordinator,
    microphones: &dyn Microphones,
) -> ControlFlow<()> {
    match input {
        ReplInput::Empty => {}
        ReplInput::Quit => return ControlFlow::Break(()),
        ReplInput::Help => ui::info(HELP),
        ReplInput::Request(envelope) => {
            let response = coordinator.dispatch(envelope).await;
            show_response(&response);
        }
        ReplInput::Move { x, y } => match coordinator.page(None) {
            Ok(page) => page.pointer_move(x, y),
            Err(e) => ui::error(&e.to_string()),
        },
        ReplInput::Select(text) => match coordinator.page(None) {
            Ok(page) => page.set_selection(&text),
            Err(e) => ui::error(&e.to_string()),
        },
        ReplInput::Say(text) => say(coordinator, microphones, &text),
        ReplInput::Tab(tab) => {
            if coordinator.activate(tab) {
                ui::info(&format!("tab {} is active", tab));
            } else {
                ui::error(&format!("no such tab: {}", tab));
            }
        }
        ReplInput::Status => status(coordinator).await,
    }
    ControlFlow::Continue(())
}

fn say(coordinator: &Coordinator, microphones: &dyn Microphones, text: &str) {
    let sessions = coordinator.sessions();
    let Some(tab) = sessions.active() else {
        ui::error("no active tab");
        return;
    };
    if !sessions.get(tab).is_some_and(|s| s.is_listening()) {
        ui::info("not listening, send {\"action\":\"startListening\"} first");
        return;
    }
    match microphones.feed(tab) {
        Some(feed) if feed.say(text) => {}
        _ => ui::error(&format!("tab {} has no microphone", tab)),
    }
}

async fn status(coordinator: &Coordinator) {
    let sessions = coordinator.sessions();
    if sessions.is_empty() {
        ui::info("no tabs open");
        return;
    }
    for (tab, session) in sessions.tabs() {
        let marker = if sessions.active() == Some(tab) { "*" } else { " " };
        let scroll = match session.page.view().await {
            Ok(view) => format!("scroll {}", view.navigation.scroll_y),
            Err(e) => e.to_string(),
        };
        ui::info(&format!(
            "{}{} {}  tts:{} cursor:{} listening:{} theme:{}  {}",
            marker,
            tab,
            session.url,
            on_off(session.is_active(PollMode::Selection)),
            on_off(session.is_active(PollMode::Cursor)),
            on_off(session.is_listening()),
            session.theme.name(),
            scroll,
        ));
    }
}

fn on_off(flag: bool) -> &'static str {
    if flag { "on" } else { "off" }
}

fn show_response(response: &Response) {
    if response.is_success() {
        ui::response(&response.to_json());
    } else {
        ui::error(&response.to_json());
    }
}
