//! Voice-driven page navigation and read-aloud accessibility.
//!
//! A coordinator handles popup requests per browser tab and drives page
//! agents: it reads the current selection or the text under the pointer
//! aloud, turns spoken phrases into page commands, and applies
//! color-vision themes.

#[macro_use]
pub mod logging;

pub mod clean;
pub mod command;
pub mod config;
pub mod coordinator;
pub mod cursor;
pub mod dom;
pub mod error;
pub mod message;
pub mod page;
pub mod poll;
pub mod repl;
pub mod resolve;
pub mod session;
pub mod speech;
pub mod theme;
pub mod ui;

pub use coordinator::Coordinator;
pub use error::{Error, Result};
pub use message::{Envelope, Request, Response, TabId};
