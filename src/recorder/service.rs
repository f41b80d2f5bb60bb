//! Recording orchestrator
//!
//! Drives the start / record / ping / stop lifecycle on top of the session
//! registry, the step mapper and the quality analyzer. It holds no session
//! state of its own.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use super::registry::{MonitorHook, SessionRegistry, SharedSession};
use super::script::CaptureScript;
use super::session::{ActionKind, RecordedEvent};
use super::step_mapper::{LocatorContext, StepMapper, StepTemplate};
use crate::driver::BrowserDriver;
use crate::error::{RecorderError, Result};
use crate::quality::{QualityAnalyzer, QualityResult};

/// Header the recorded steps are joined under before scoring
pub const SCENARIO_HEADER: &str = "Scenario: Recorded flow";

/// Identifiers handed to the client; both must accompany every later call
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StartedSession {
    pub session_id: String,
    pub browser_id: String,
}

/// One interaction reported by the capture script
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EventRequest {
    pub session_id: String,
    pub browser_id: String,
    pub action: String,
    pub selector: String,
    pub text: String,
    pub value: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PingStatus {
    pub status: &'static str,
    pub last_ping: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LocatorsUsed {
    pub selectors_used: Vec<String>,
}

/// Result of a finished recording
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RecordingSummary {
    pub steps: Vec<String>,
    pub quality: QualityResult,
    pub suggestions: Vec<String>,
    pub locators: LocatorsUsed,
}

/// Join steps into the scenario text that gets scored
pub fn scenario_text(steps: &[String]) -> String {
    let mut text = String::from(SCENARIO_HEADER);
    for step in steps {
        text.push('\n');
        text.push_str(step);
    }
    text
}

pub struct RecorderService {
    registry: Arc<SessionRegistry>,
    driver: Arc<dyn BrowserDriver>,
    mapper: StepMapper,
    analyzer: Arc<QualityAnalyzer>,
    script: CaptureScript,
}

impl RecorderService {
    pub fn new(
        driver: Arc<dyn BrowserDriver>,
        mapper: StepMapper,
        analyzer: Arc<QualityAnalyzer>,
        script: CaptureScript,
        poll_interval: Duration,
    ) -> Self {
        Self {
            registry: Arc::new(SessionRegistry::new(driver.clone(), poll_interval)),
            driver,
            mapper,
            analyzer,
            script,
        }
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    pub fn analyzer(&self) -> &Arc<QualityAnalyzer> {
        &self.analyzer
    }

    pub fn step_catalog(&self) -> &'static [StepTemplate] {
        StepMapper::catalog()
    }

    /// Open a browser, register the session, inject the capture script and
    /// start watching the browser.
    pub async fn start(&self) -> Result<StartedSession> {
        let browser = self
            .driver
            .open()
            .await
            .map_err(|e| RecorderError::browser("Could not start a browser for the session", e))?;

        let started = StartedSession {
            session_id: Uuid::new_v4().to_string(),
            browser_id: Uuid::new_v4().to_string(),
        };

        let session = match self
            .registry
            .create(&started.session_id, &started.browser_id, browser.clone())
            .await
        {
            Ok(session) => session,
            Err(e) => {
                if let Err(close_err) = self.driver.close(&browser).await {
                    warn!(
                        "Failed to close browser {} after session setup failed: {:#}",
                        browser, close_err
                    );
                }
                return Err(e);
            }
        };

        if let Err(e) = inject(self.driver.as_ref(), &self.script, &session).await {
            if let Err(close_err) = self.registry.close(&started.session_id).await {
                debug!("Session {} already released: {}", started.session_id, close_err);
            }
            return Err(e);
        }

        let reinjector = Arc::new(Reinjector {
            driver: self.driver.clone(),
            script: self.script.clone(),
        });
        self.registry
            .monitor(&started.session_id, Some(reinjector))
            .await?;

        Ok(started)
    }

    /// Store the event and its step line. Returns the step.
    pub async fn record_event(&self, ctx: &LocatorContext, event: EventRequest) -> Result<String> {
        let session_id = event.session_id.as_str();
        self.registry
            .validate(session_id, &event.browser_id)
            .await?;
        self.registry.touch(session_id).await?;

        let action = ActionKind::from(event.action.as_str());
        let step = self
            .mapper
            .map(ctx, &action, &event.selector, &event.text, &event.value);

        self.registry
            .append(
                session_id,
                RecordedEvent::new(action, event.selector, event.text, event.value),
                step.clone(),
            )
            .await?;
        Ok(step)
    }

    pub async fn ping(&self, session_id: &str, browser_id: &str) -> Result<PingStatus> {
        let session = self.registry.validate(session_id, browser_id).await?;
        let browser = session.lock().await.browser.clone();
        if self.registry.is_browser_closed(&browser).await {
            return Err(RecorderError::SessionUnavailable(session_id.to_string()));
        }
        let last_ping = self.registry.touch(session_id).await?;
        Ok(PingStatus {
            status: "alive",
            last_ping,
        })
    }

    pub async fn steps(&self, session_id: &str, browser_id: &str) -> Result<Vec<String>> {
        let session = self.registry.validate(session_id, browser_id).await?;
        let steps = session.lock().await.steps.clone();
        Ok(steps)
    }

    /// Close the session and score the recorded scenario
    pub async fn stop(&self, session_id: &str, browser_id: &str) -> Result<RecordingSummary> {
        self.registry.validate(session_id, browser_id).await?;
        // Fail on broken rules before the recording is discarded
        self.analyzer.rules().await?;

        let session = self.registry.close(session_id).await?;
        let quality = self
            .analyzer
            .analyze(&scenario_text(&session.steps))
            .await?;
        info!(
            "Session {} finished with {} steps (score {:.2})",
            session_id,
            session.steps.len(),
            quality.score
        );

        Ok(RecordingSummary {
            suggestions: quality.suggestions.clone(),
            locators: LocatorsUsed {
                selectors_used: session.selectors_used(),
            },
            steps: session.steps,
            quality,
        })
    }
}

/// Run the capture script in the session's page and remember the page URL
async fn inject(
    driver: &dyn BrowserDriver,
    script: &CaptureScript,
    session: &SharedSession,
) -> Result<()> {
    let (session_id, browser_id, browser) = {
        let s = session.lock().await;
        (s.session_id.clone(), s.browser_id.clone(), s.browser.clone())
    };

    driver
        .execute_script(&browser, &script.build(&session_id, &browser_id))
        .await
        .map_err(|e| RecorderError::browser("Could not inject the recorder script", e))?;

    let url = driver.current_url(&browser).await.unwrap_or_default();
    session.lock().await.last_injected_url = url;
    debug!("Recorder script injected in session {}", session_id);
    Ok(())
}

/// Re-injects the capture script when a navigation dropped it
struct Reinjector {
    driver: Arc<dyn BrowserDriver>,
    script: CaptureScript,
}

#[async_trait]
impl MonitorHook for Reinjector {
    async fn on_tick(&self, session: &SharedSession) {
        let (session_id, browser, last_url) = {
            let s = session.lock().await;
            (
                s.session_id.clone(),
                s.browser.clone(),
                s.last_injected_url.clone(),
            )
        };

        let injected = match self
            .driver
            .execute_script(&browser, CaptureScript::PROBE)
            .await
        {
            Ok(value) => value.as_bool().unwrap_or(false),
            Err(e) => {
                debug!("Could not check recorder script in session {}: {:#}", session_id, e);
                return;
            }
        };
        let url_changed = match self.driver.current_url(&browser).await {
            Ok(url) => url != last_url,
            Err(_) => false,
        };

        if !injected || url_changed {
            debug!("Re-injecting recorder script in session {}", session_id);
            if let Err(e) = inject(self.driver.as_ref(), &self.script, session).await {
                debug!("{}", e);
            }
        }
    }
}
