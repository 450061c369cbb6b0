/// End-to-end tests driving the coordinator the way the popup does:
/// JSON requests in, JSON responses out, against an in-memory page.
use std::time::Duration;

use tokio::sync::mpsc;
use voice_navigator::command::{Command, Outcome, ScrollDirection};
use voice_navigator::config::Config;
use voice_navigator::dom::PageSnapshot;
use voice_navigator::page::PageEvent;
use voice_navigator::speech::{ChannelRecognizer, MemorySpeech, SpeechEvent, TranscriptFeed};
use voice_navigator::{Coordinator, Response, TabId};

const PAGE: &str = r#"{
    "url": "https://example.com/story",
    "document": {
        "tag": "html",
        "children": [
            {"tag": "head", "style": {"display": "none"}},
            {"tag": "body", "children": [
                {"tag": "p", "rect": {"x": 0, "y": 0, "width": 800, "height": 40},
                 "children": ["First paragraph of the story."]},
                {"tag": "p", "rect": {"x": 0, "y": 60, "width": 800, "height": 40},
                 "children": ["Second   paragraph, with <markup>."]},
                {"tag": "div", "style": {"display": "none"},
                 "rect": {"x": 0, "y": 120, "width": 800, "height": 40},
                 "children": ["Hidden banner"]},
                {"tag": "button", "rect": {"x": 0, "y": 200, "width": 100, "height": 30},
                 "children": ["Load comments"]}
            ]}
        ]
    }
}"#;

struct Harness {
    coordinator: Coordinator,
    tab: TabId,
    speech: MemorySpeech,
    feed: TranscriptFeed,
    events: mpsc::UnboundedReceiver<(TabId, PageEvent)>,
}

fn open(url: Option<&str>) -> Harness {
    let (tx, events) = mpsc::unbounded_channel();
    let speech = MemorySpeech::new();
    let mut coordinator =
        Coordinator::new(Config::default(), Box::new(speech.clone())).with_events(tx);
    let snapshot = PageSnapshot::from_json(PAGE).unwrap();
    let url = url
        .map(str::to_string)
        .or_else(|| snapshot.url.clone())
        .unwrap();
    let (recognizer, feed) = ChannelRecognizer::new();
    let tab = coordinator.open_tab(&url, snapshot.into_document(), Box::new(recognizer));
    Harness {
        coordinator,
        tab,
        speech,
        feed,
        events,
    }
}

async fn request(h: &mut Harness, json: &str) -> Response {
    h.coordinator.dispatch_json(json).await
}

/// Let every agent drain its queue
async fn settle(h: &Harness) {
    h.coordinator.page(None).unwrap().view().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_selection_is_read_aloud_once() {
    let mut h = open(None);
    let resp = request(&mut h, r#"{"action":"enableTTS"}"#).await;
    assert_eq!(resp.to_json(), r#"{"status":"success"}"#);

    let page = h.coordinator.page(None).unwrap();
    page.set_selection("Selected words");
    tokio::time::sleep(Duration::from_millis(3500)).await;
    settle(&h).await;
    assert_eq!(h.speech.spoken(), vec!["Selected words"]);

    page.set_selection("Other words");
    tokio::time::sleep(Duration::from_millis(1000)).await;
    settle(&h).await;
    assert_eq!(h.speech.spoken(), vec!["Selected words", "Other words"]);

    let resp = request(&mut h, r#"{"action":"disableTTS"}"#).await;
    assert!(resp.is_success());
    page.set_selection("After disable");
    tokio::time::sleep(Duration::from_millis(3000)).await;
    settle(&h).await;
    assert_eq!(h.speech.spoken().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_cursor_reading_follows_pointer() {
    let mut h = open(None);
    let resp = request(&mut h, r#"{"action":"enableCursorReading"}"#).await;
    assert!(resp.is_success());

    let page = h.coordinator.page(None).unwrap();
    page.pointer_move(10.0, 10.0);
    tokio::time::sleep(Duration::from_millis(1000)).await;
    settle(&h).await;
    assert_eq!(h.speech.spoken(), vec!["First paragraph of the story."]);

    // Hidden element: nothing new is read
    page.pointer_move(10.0, 130.0);
    tokio::time::sleep(Duration::from_millis(1000)).await;
    settle(&h).await;
    assert_eq!(h.speech.spoken().len(), 1);

    page.pointer_move(10.0, 70.0);
    tokio::time::sleep(Duration::from_millis(1000)).await;
    settle(&h).await;
    assert_eq!(
        h.speech.spoken(),
        vec!["First paragraph of the story.", "Second paragraph, with markup."]
    );

    let status = request(&mut h, r#"{"action":"checkTTSStatus"}"#).await;
    assert_eq!(status.to_json(), r#"{"enabled":false,"cursorEnabled":true}"#);
}

#[tokio::test]
async fn test_privileged_pages_are_refused() {
    let mut h = open(Some("chrome://extensions"));
    let cases = [
        (r#"{"action":"enableTTS"}"#, "TTS is not available on chrome:// pages"),
        (
            r#"{"action":"enableCursorReading"}"#,
            "Cursor reading is not available on chrome:// pages",
        ),
        (
            r#"{"action":"applyTheme","theme":"protanopia"}"#,
            "Theme is not available on chrome:// pages",
        ),
    ];
    for (json, message) in cases {
        let resp = request(&mut h, json).await;
        assert!(!resp.is_success(), "{json}");
        assert_eq!(resp.message(), Some(message));
    }
    let status = request(&mut h, r#"{"action":"checkTTSStatus"}"#).await;
    assert_eq!(status.to_json(), r#"{"enabled":false,"cursorEnabled":false}"#);
}

#[tokio::test]
async fn test_apply_theme() {
    let mut h = open(None);
    let tab = h.tab;
    let json = format!(r#"{{"tab":{tab},"action":"applyTheme","theme":"high-contrast"}}"#);
    assert!(request(&mut h, &json).await.is_success());

    let view = h.coordinator.page(Some(tab)).unwrap().view().await.unwrap();
    assert_eq!(view.theme.as_deref(), Some("high-contrast"));

    let resp = request(&mut h, r#"{"action":"applyTheme","theme":"neon"}"#).await;
    assert_eq!(resp.to_json(), r#"{"status":"error","message":"Theme not found: neon"}"#);
}

#[tokio::test]
async fn test_voice_commands() {
    let mut h = open(None);
    assert!(request(&mut h, r#"{"action":"startListening"}"#).await.is_success());

    h.feed.say("scroll down");
    h.feed.say("open github");
    h.feed.say("click load comments");

    let mut executed = Vec::new();
    while executed.len() < 3 {
        let (tab, event) = h.events.recv().await.unwrap();
        assert_eq!(tab, h.tab);
        if let PageEvent::Executed { command, outcome } = event {
            executed.push((command, outcome));
        }
    }
    assert_eq!(
        executed[0],
        (Command::Scroll(ScrollDirection::Down), Outcome::Scrolled(200.0))
    );
    assert_eq!(
        executed[1],
        (
            Command::Open("github".into()),
            Outcome::Opened("https://www.github.com".into())
        )
    );
    assert!(matches!(executed[2], (Command::Click(_), Outcome::Clicked(_))));

    let view = h.coordinator.page(None).unwrap().view().await.unwrap();
    assert_eq!(view.navigation.scroll_y, 200.0);
    assert_eq!(view.navigation.opened, vec!["https://www.github.com"]);
    assert!(view.listening);
    assert!(h.coordinator.sessions().get(h.tab).unwrap().is_listening());

    assert!(request(&mut h, r#"{"action":"stopListening"}"#).await.is_success());
    let view = h.coordinator.page(None).unwrap().view().await.unwrap();
    assert!(!view.listening);
    assert!(!h.coordinator.sessions().get(h.tab).unwrap().is_listening());
}

#[tokio::test]
async fn test_recognizer_ending_clears_listening() {
    let mut config = Config::default();
    config.recognition.continuous = false;
    let (tx, mut events) = mpsc::unbounded_channel();
    let mut coordinator =
        Coordinator::new(config, Box::new(MemorySpeech::new())).with_events(tx);
    let snapshot = PageSnapshot::from_json(PAGE).unwrap();
    let (recognizer, feed) = ChannelRecognizer::new();
    let document = snapshot.into_document();
    let tab = coordinator.open_tab("https://example.com", document, Box::new(recognizer));

    let resp = coordinator.dispatch_json(r#"{"action":"startListening"}"#).await;
    assert!(resp.is_success());
    assert!(coordinator.sessions().get(tab).unwrap().is_listening());

    feed.say("scroll down");
    while events.recv().await.unwrap().1 != PageEvent::ListeningEnded {}
    assert!(!coordinator.sessions().get(tab).unwrap().is_listening());

    // Listening can be turned back on afterwards
    let resp = coordinator.dispatch_json(r#"{"action":"startListening"}"#).await;
    assert!(resp.is_success());
    assert!(coordinator.sessions().get(tab).unwrap().is_listening());
}

#[tokio::test(start_paused = true)]
async fn test_tabs_share_one_speech_channel() {
    let (tx, _events) = mpsc::unbounded_channel();
    let speech = MemorySpeech::new();
    let mut coordinator =
        Coordinator::new(Config::default(), Box::new(speech.clone())).with_events(tx);
    let mut tabs = Vec::new();
    for _ in 0..2 {
        let snapshot = PageSnapshot::from_json(PAGE).unwrap();
        let (recognizer, _feed) = ChannelRecognizer::new();
        let document = snapshot.into_document();
        tabs.push(coordinator.open_tab("https://example.com", document, Box::new(recognizer)));
    }
    coordinator.page(Some(tabs[0])).unwrap().set_selection("left tab text");
    coordinator.page(Some(tabs[1])).unwrap().set_selection("right tab text");
    for &tab in &tabs {
        let json = format!(r#"{{"tab":{tab},"action":"enableTTS"}}"#);
        assert!(coordinator.dispatch_json(&json).await.is_success());
    }
    tokio::time::sleep(Duration::from_millis(1500)).await;
    for &tab in &tabs {
        coordinator.page(Some(tab)).unwrap().view().await.unwrap();
    }

    let mut spoken = speech.spoken();
    spoken.sort();
    assert_eq!(spoken, vec!["left tab text", "right tab text"]);

    // The second utterance interrupted the first one
    let log = speech.log();
    let log = log.lock().unwrap();
    let spoke: Vec<usize> = log
        .iter()
        .enumerate()
        .filter(|(_, e)| matches!(e, SpeechEvent::Spoke(_)))
        .map(|(i, _)| i)
        .collect();
    assert_eq!(spoke.len(), 2);
    assert!(log[spoke[0]..spoke[1]].contains(&SpeechEvent::Cancelled));
}

#[tokio::test]
async fn test_microphone_denied() {
    let (tx, _events) = mpsc::unbounded_channel();
    let mut coordinator =
        Coordinator::new(Config::default(), Box::new(MemorySpeech::new())).with_events(tx);
    let snapshot = PageSnapshot::from_json(PAGE).unwrap();
    let (recognizer, _feed) = ChannelRecognizer::new();
    coordinator.open_tab(
        "https://example.com",
        snapshot.into_document(),
        Box::new(recognizer.denied()),
    );
    let resp = coordinator.dispatch_json(r#"{"action":"startListening"}"#).await;
    assert_eq!(
        resp.message(),
        Some("Microphone access denied. Please grant permission.")
    );
}

#[tokio::test]
async fn test_closed_tab() {
    let mut h = open(None);
    let tab = h.tab;
    assert!(h.coordinator.close_tab(tab));
    let resp = request(&mut h, &format!(r#"{{"tab":{tab},"action":"checkTTSStatus"}}"#)).await;
    assert_eq!(resp.message(), Some(format!("no such tab: {tab}").as_str()));
}
