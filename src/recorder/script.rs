//! Client-side capture script

const RECORDER_JS: &str = include_str!("ui/recorder.js");

/// Builds the script injected into recorded pages
#[derive(Debug, Clone)]
pub struct CaptureScript {
    base_url: String,
}

impl CaptureScript {
    /// Script body answering whether the capture script is present in the page
    pub const PROBE: &'static str = "return window && window.__webRecorderInjected === true;";

    pub fn new(base_url: &str) -> Self {
        let trimmed = base_url.trim().trim_end_matches('/');
        let base_url = if trimmed.is_empty() {
            "http://localhost:9090".to_string()
        } else {
            trimmed.to_string()
        };
        Self { base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Capture script configured to post events for this session
    pub fn build(&self, session_id: &str, browser_id: &str) -> String {
        format!(
            "window.__recorderConfig = Object.assign({{}}, window.__recorderConfig || {{}}, \
             {{browserId:'{}',sessionId:'{}',baseUrl:'{}'}});\n{}",
            escape(browser_id),
            escape(session_id),
            escape(&self.base_url),
            RECORDER_JS
        )
    }
}

/// Escape for a single-quoted JavaScript string literal
fn escape(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('\'', "\\'")
        .replace('\n', "\\n")
        .replace('\r', "\\r")
}
