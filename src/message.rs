//! Popup ↔ coordinator protocol
//!
//! Requests carry their action name in an `action` field, the same JSON the
//! browser side sends. Every request gets exactly one [`Response`].

use serde::{Deserialize, Serialize};

use crate::error::Error;

pub type TabId = u32;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action")]
pub enum Request {
    #[serde(rename = "startListening")]
    StartListening,
    #[serde(rename = "stopListening")]
    StopListening,
    #[serde(rename = "enableTTS")]
    EnableTts,
    #[serde(rename = "disableTTS")]
    DisableTts,
    #[serde(rename = "enableCursorReading")]
    EnableCursorReading,
    #[serde(rename = "disableCursorReading")]
    DisableCursorReading,
    #[serde(rename = "checkTTSStatus")]
    CheckTtsStatus,
    #[serde(rename = "applyTheme")]
    ApplyTheme { theme: String },
}

impl Request {
    pub fn action(&self) -> &'static str {
        match self {
            Request::StartListening => "startListening",
            Request::StopListening => "stopListening",
            Request::EnableTts => "enableTTS",
            Request::DisableTts => "disableTTS",
            Request::EnableCursorReading => "enableCursorReading",
            Request::DisableCursorReading => "disableCursorReading",
            Request::CheckTtsStatus => "checkTTSStatus",
            Request::ApplyTheme { .. } => "applyTheme",
        }
    }

    /// Feature name for requests that must run inside the page, `None` for
    /// requests that are safe on any page
    pub fn page_feature(&self) -> Option<&'static str> {
        match self {
            Request::StartListening | Request::StopListening => Some("Voice navigation"),
            Request::EnableTts => Some("TTS"),
            Request::EnableCursorReading => Some("Cursor reading"),
            Request::ApplyTheme { .. } => Some("Theme"),
            Request::DisableTts | Request::DisableCursorReading | Request::CheckTtsStatus => None,
        }
    }
}

/// A request addressed to a tab; the active tab when `tab` is absent
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Envelope {
    #[serde(default)]
    pub tab: Option<TabId>,
    #[serde(flatten)]
    pub request: Request,
}

impl Envelope {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Response {
    Status {
        status: Status,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    TtsStatus {
        enabled: bool,
        #[serde(rename = "cursorEnabled")]
        cursor_enabled: bool,
    },
}

impl Response {
    pub fn success() -> Self {
        Response::Status {
            status: Status::Success,
            message: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Response::Status {
            status: Status::Error,
            message: Some(message.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        !matches!(
            self,
            Response::Status {
                status: Status::Error,
                ..
            }
        )
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            Response::Status { message, .. } => message.as_deref(),
            Response::TtsStatus { .. } => None,
        }
    }

    pub fn to_json(&self) -> String {
        // Plain enums and strings cannot fail to serialize
        serde_json::to_string(self).unwrap_or_default()
    }
}

impl From<Error> for Response {
    fn from(err: Error) -> Self {
        Response::error(err.to_string())
    }
}

impl<T> From<Result<T, Error>> for Response {
    fn from(result: Result<T, Error>) -> Self {
        match result {
            Ok(_) => Response::success(),
            Err(e) => e.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_actions() {
        let req: Request = serde_json::from_str(r#"{"action":"enableTTS"}"#).unwrap();
        assert_eq!(req, Request::EnableTts);
        let req: Request =
            serde_json::from_str(r#"{"action":"applyTheme","theme":"protanopia"}"#).unwrap();
        assert_eq!(req, Request::ApplyTheme { theme: "protanopia".into() });
        assert!(serde_json::from_str::<Request>(r#"{"action":"initialize"}"#).is_err());
    }

    #[test]
    fn test_action_names_round_trip() {
        let all = [
            Request::StartListening,
            Request::StopListening,
            Request::EnableTts,
            Request::DisableTts,
            Request::EnableCursorReading,
            Request::DisableCursorReading,
            Request::CheckTtsStatus,
            Request::ApplyTheme { theme: "default".into() },
        ];
        for req in all {
            let json = serde_json::to_value(&req).unwrap();
            assert_eq!(json["action"], req.action());
        }
    }

    #[test]
    fn test_envelope() {
        let env = Envelope::from_json(r#"{"tab": 3, "action": "checkTTSStatus"}"#).unwrap();
        assert_eq!(env.tab, Some(3));
        assert_eq!(env.request, Request::CheckTtsStatus);
        let env = Envelope::from_json(r#"{"action": "disableTTS"}"#).unwrap();
        assert_eq!(env.tab, None);
    }

    #[test]
    fn test_response_json() {
        assert_eq!(Response::success().to_json(), r#"{"status":"success"}"#);
        assert_eq!(
            Response::error("nope").to_json(),
            r#"{"status":"error","message":"nope"}"#
        );
        let status = Response::TtsStatus {
            enabled: true,
            cursor_enabled: false,
        };
        assert_eq!(status.to_json(), r#"{"enabled":true,"cursorEnabled":false}"#);
        assert!(status.is_success());
    }

    #[test]
    fn test_from_error() {
        let resp: Response = Error::PermissionDenied.into();
        assert!(!resp.is_success());
        assert_eq!(resp.message(), Some("Microphone access denied. Please grant permission."));
    }
}
