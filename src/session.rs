//! Session manager - per-tab reading sessions
//!
//! Each open tab has at most one selection poll and one cursor poll.
//! Starting a session replaces (and stops) the tab's previous one of the
//! same kind; closing the tab stops both.

use std::collections::BTreeMap;

use crate::message::TabId;
use crate::page::PageHandle;
use crate::poll::{PollHandle, PollMode};
use crate::theme::Theme;

const ENABLE_LOGS: bool = true;
use crate::log_debug;

/// Everything the coordinator tracks for one tab
pub struct TabSession {
    pub url: String,
    pub page: PageHandle,
    pub theme: Theme,
    tts: Option<PollHandle>,
    cursor: Option<PollHandle>,
}

impl TabSession {
    fn new(url: &str, page: PageHandle) -> Self {
        Self {
            url: url.to_string(),
            page,
            theme: Theme::Default,
            tts: None,
            cursor: None,
        }
    }

    fn slot(&mut self, mode: PollMode) -> &mut Option<PollHandle> {
        match mode {
            PollMode::Selection => &mut self.tts,
            PollMode::Cursor => &mut self.cursor,
        }
    }

    /// Voice commands are being listened for on this tab
    pub fn is_listening(&self) -> bool {
        self.page.is_listening()
    }

    pub fn is_active(&self, mode: PollMode) -> bool {
        let slot = match mode {
            PollMode::Selection => &self.tts,
            PollMode::Cursor => &self.cursor,
        };
        slot.as_ref().is_some_and(PollHandle::is_active)
    }

    /// Install `handle` as this tab's session for its mode
    pub fn start(&mut self, handle: PollHandle) {
        let mode = handle.mode();
        if let Some(previous) = self.slot(mode).replace(handle) {
            previous.stop();
            log_debug!("replaced {} session for {}", mode.label(), self.url);
        }
    }

    /// Stop the session for `mode`; false when none was running
    pub fn stop(&mut self, mode: PollMode) -> bool {
        match self.slot(mode).take() {
            Some(handle) => {
                handle.stop();
                true
            }
            None => false,
        }
    }

    pub fn stop_all(&mut self) {
        self.stop(PollMode::Selection);
        self.stop(PollMode::Cursor);
    }
}

/// Open tabs and which one is active
#[derive(Default)]
pub struct SessionManager {
    tabs: BTreeMap<TabId, TabSession>,
    active: Option<TabId>,
    next_id: TabId,
}

impl SessionManager {
    pub fn new() -> Self {
        Self {
            next_id: 1,
            ..Default::default()
        }
    }

    /// Reserve the id for a tab about to be opened
    pub fn next_tab_id(&mut self) -> TabId {
        let id = self.next_id.max(1);
        self.next_id = id + 1;
        id
    }

    /// Register a tab and make it active
    pub fn insert(&mut self, tab: TabId, url: &str, page: PageHandle) {
        if let Some(mut old) = self.tabs.insert(tab, TabSession::new(url, page)) {
            old.stop_all();
        }
        self.next_id = self.next_id.max(tab + 1);
        self.active = Some(tab);
    }

    /// Close a tab, stopping its sessions
    pub fn remove(&mut self, tab: TabId) -> bool {
        let Some(mut session) = self.tabs.remove(&tab) else {
            return false;
        };
        session.stop_all();
        if self.active == Some(tab) {
            self.active = self.tabs.keys().next_back().copied();
        }
        true
    }

    pub fn activate(&mut self, tab: TabId) -> bool {
        let known = self.tabs.contains_key(&tab);
        if known {
            self.active = Some(tab);
        }
        known
    }

    pub fn active(&self) -> Option<TabId> {
        self.active
    }

    pub fn get(&self, tab: TabId) -> Option<&TabSession> {
        self.tabs.get(&tab)
    }

    pub fn get_mut(&mut self, tab: TabId) -> Option<&mut TabSession> {
        self.tabs.get_mut(&tab)
    }

    pub fn tabs(&self) -> impl Iterator<Item = (TabId, &TabSession)> {
        self.tabs.iter().map(|(id, session)| (*id, session))
    }

    pub fn len(&self) -> usize {
        self.tabs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tabs.is_empty()
    }

    /// Stop every session in every tab
    pub fn shutdown(&mut self) {
        for session in self.tabs.values_mut() {
            session.stop_all();
        }
        self.tabs.clear();
        self.active = None;
    }
}
