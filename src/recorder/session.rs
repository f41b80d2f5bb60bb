use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use crate::driver::BrowserHandle;

/// Kind of interaction captured in the browser
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ActionKind {
    Click,
    Input,
    Change,
    Submit,
    Navigate,
    /// Anything the capture script reports that has no dedicated step
    Other(String),
}

impl ActionKind {
    pub fn as_str(&self) -> &str {
        match self {
            ActionKind::Click => "click",
            ActionKind::Input => "input",
            ActionKind::Change => "change",
            ActionKind::Submit => "submit",
            ActionKind::Navigate => "navigate",
            ActionKind::Other(action) => action,
        }
    }
}

impl From<&str> for ActionKind {
    fn from(action: &str) -> Self {
        match action {
            "click" => ActionKind::Click,
            "input" => ActionKind::Input,
            "change" => ActionKind::Change,
            "submit" => ActionKind::Submit,
            "navigate" => ActionKind::Navigate,
            other => ActionKind::Other(other.to_string()),
        }
    }
}

impl From<String> for ActionKind {
    fn from(action: String) -> Self {
        ActionKind::from(action.as_str())
    }
}

impl From<ActionKind> for String {
    fn from(action: ActionKind) -> Self {
        action.as_str().to_string()
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw event as received from the capture script
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RecordedEvent {
    pub action: ActionKind,
    pub selector: String,
    pub text: String,
    pub value: String,
    pub timestamp: DateTime<Utc>,
}

impl RecordedEvent {
    pub fn new(
        action: ActionKind,
        selector: impl Into<String>,
        text: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            action,
            selector: selector.into(),
            text: text.into(),
            value: value.into(),
            timestamp: Utc::now(),
        }
    }
}

/// One recording, tied to one browser window
#[derive(Debug, Clone)]
pub struct Session {
    pub session_id: String,
    /// Must accompany the session id on every call
    pub browser_id: String,
    pub browser: BrowserHandle,
    pub created_at: DateTime<Utc>,
    pub last_ping: DateTime<Utc>,
    pub events: Vec<RecordedEvent>,
    /// Generated scenario body, in capture order
    pub steps: Vec<String>,
    /// Page URL at the last script injection
    pub last_injected_url: String,
}

impl Session {
    pub fn new(session_id: &str, browser_id: &str, browser: BrowserHandle) -> Self {
        let now = Utc::now();
        Self {
            session_id: session_id.to_string(),
            browser_id: browser_id.to_string(),
            browser,
            created_at: now,
            last_ping: now,
            events: Vec::new(),
            steps: Vec::new(),
            last_injected_url: String::new(),
        }
    }

    pub fn touch(&mut self) -> DateTime<Utc> {
        self.last_ping = Utc::now();
        self.last_ping
    }

    /// Distinct non-empty selectors in order of first appearance
    pub fn selectors_used(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.events
            .iter()
            .map(|e| e.selector.trim())
            .filter(|s| !s.is_empty())
            .filter(|s| seen.insert(s.to_string()))
            .map(str::to_string)
            .collect()
    }
}
