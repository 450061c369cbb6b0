//! Voice commands - maps a recognized utterance to a page action
//!
//! Keywords are checked in a fixed order, first hit wins:
//! 1. `open <site>` - open a known site in a new tab
//! 2. `scroll` - up if the phrase says "up", otherwise down
//! 3. `refresh` - reload the page
//! 4. `click <text>` - activate the first link/button whose text matches
//!
//! Anything else is not a command and is ignored.

use std::collections::BTreeMap;
use std::fmt;

use crate::config::CommandsConfig;
use crate::dom::{DomSurface, NodeId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollDirection {
    Up,
    Down,
}

/// A page action derived from one utterance
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Open a site from the site table, by name
    Open(String),
    Scroll(ScrollDirection),
    Refresh,
    /// Activate the first link or button containing this text
    Click(String),
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Open(site) => write!(f, "open {}", site),
            Command::Scroll(ScrollDirection::Up) => write!(f, "scroll up"),
            Command::Scroll(ScrollDirection::Down) => write!(f, "scroll down"),
            Command::Refresh => write!(f, "refresh"),
            Command::Click(target) => write!(f, "click \"{}\"", target),
        }
    }
}

/// Side effects a command can have on the page's window
pub trait PageActions {
    fn open_url(&mut self, url: &str);
    fn scroll_by(&mut self, dy: f64);
    fn reload(&mut self);
    fn click(&mut self, node: NodeId);
}

/// What executing a command did
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Opened(String),
    Scrolled(f64),
    Reloaded,
    Clicked(NodeId),
    /// Nothing on the page (or in the site table) matched
    NoMatch,
}

const KEYWORDS: [&str; 4] = ["open", "scroll", "refresh", "click"];

/// Utterance interpreter and executor
pub struct CommandInterpreter {
    sites: BTreeMap<String, String>,
    scroll_amount: f64,
}

impl Default for CommandInterpreter {
    fn default() -> Self {
        Self::new(&CommandsConfig::default())
    }
}

impl CommandInterpreter {
    pub fn new(config: &CommandsConfig) -> Self {
        Self {
            sites: config.site_table(),
            scroll_amount: config.scroll_amount,
        }
    }

    /// Classify an utterance. Unrecognized phrases and unknown sites give `None`.
    pub fn interpret(&self, utterance: &str) -> Option<Command> {
        let text = utterance.to_lowercase();
        let keyword = KEYWORDS.iter().find(|k| text.contains(*k))?;

        match *keyword {
            "open" => {
                let site = argument_after(&text, "open");
                self.sites.contains_key(site).then(|| Command::Open(site.to_string()))
            }
            "scroll" => {
                let direction = if text.contains("up") {
                    ScrollDirection::Up
                } else {
                    ScrollDirection::Down
                };
                Some(Command::Scroll(direction))
            }
            "refresh" => Some(Command::Refresh),
            "click" => {
                let target = argument_after(&text, "click");
                (!target.is_empty()).then(|| Command::Click(target.to_string()))
            }
            _ => None,
        }
    }

    pub fn site_url(&self, site: &str) -> Option<&str> {
        self.sites.get(site).map(String::as_str)
    }

    /// Apply a command to a page.
    pub fn execute<D: DomSurface + ?Sized>(
        &self,
        command: &Command,
        dom: &D,
        actions: &mut dyn PageActions,
    ) -> Outcome {
        match command {
            Command::Open(site) => match self.site_url(site) {
                Some(url) => {
                    actions.open_url(url);
                    Outcome::Opened(url.to_string())
                }
                None => Outcome::NoMatch,
            },
            Command::Scroll(direction) => {
                let dy = match direction {
                    ScrollDirection::Up => -self.scroll_amount,
                    ScrollDirection::Down => self.scroll_amount,
                };
                actions.scroll_by(dy);
                Outcome::Scrolled(dy)
            }
            Command::Refresh => {
                actions.reload();
                Outcome::Reloaded
            }
            Command::Click(target) => match find_clickable(dom, target) {
                Some(node) => {
                    actions.click(node);
                    Outcome::Clicked(node)
                }
                None => Outcome::NoMatch,
            },
        }
    }
}

/// Classify with the built-in site table
pub fn interpret(utterance: &str) -> Option<Command> {
    CommandInterpreter::default().interpret(utterance)
}

/// First link/button in document order whose text contains `target`
pub fn find_clickable<D: DomSurface + ?Sized>(dom: &D, target: &str) -> Option<NodeId> {
    let target = target.to_lowercase();
    dom.interactive_elements()
        .into_iter()
        .find(|&node| dom.text_content(node).to_lowercase().contains(&target))
}

/// Text following the first occurrence of `keyword`, trimmed of spaces and
/// the trailing punctuation recognizers like to append
fn argument_after<'a>(text: &'a str, keyword: &str) -> &'a str {
    text.split_once(keyword)
        .map(|(_, rest)| rest)
        .unwrap_or_default()
        .trim()
        .trim_end_matches(|c: char| c.is_ascii_punctuation())
        .trim_end()
}
