//! Session registry
//!
//! Owns every live recording session together with the background task that
//! watches its browser. Removal is single-winner: when an explicit stop and
//! the monitor's automatic reclamation race on the same session, exactly one
//! of them gets the session and releases its browser.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use super::session::{RecordedEvent, Session};
use crate::driver::{BrowserDriver, BrowserHandle};
use crate::error::{RecorderError, Result};

pub type SharedSession = Arc<Mutex<Session>>;

/// Extra work run by the lifecycle monitor on every tick while the browser is open
#[async_trait]
pub trait MonitorHook: Send + Sync {
    async fn on_tick(&self, session: &SharedSession);
}

struct Entry {
    session: SharedSession,
    monitor: Option<JoinHandle<()>>,
}

/// Concurrent store of recording sessions keyed by session id
pub struct SessionRegistry {
    sessions: Mutex<HashMap<String, Entry>>,
    driver: Arc<dyn BrowserDriver>,
    poll_interval: Duration,
}

impl SessionRegistry {
    pub fn new(driver: Arc<dyn BrowserDriver>, poll_interval: Duration) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            driver,
            poll_interval,
        }
    }

    /// Register a new session. An existing id is never overwritten.
    pub async fn create(
        &self,
        session_id: &str,
        browser_id: &str,
        browser: BrowserHandle,
    ) -> Result<SharedSession> {
        let mut sessions = self.sessions.lock().await;
        if sessions.contains_key(session_id) {
            return Err(RecorderError::DuplicateSession(session_id.to_string()));
        }

        let session = Arc::new(Mutex::new(Session::new(session_id, browser_id, browser)));
        sessions.insert(
            session_id.to_string(),
            Entry {
                session: session.clone(),
                monitor: None,
            },
        );
        info!(
            "Recording session {} created for browser {}",
            session_id, browser_id
        );
        Ok(session)
    }

    pub async fn get(&self, session_id: &str) -> Result<SharedSession> {
        self.sessions
            .lock()
            .await
            .get(session_id)
            .map(|entry| entry.session.clone())
            .ok_or_else(|| RecorderError::SessionNotFound(session_id.to_string()))
    }

    /// Look up a session and check that it belongs to `browser_id`.
    pub async fn validate(&self, session_id: &str, browser_id: &str) -> Result<SharedSession> {
        let session = self.get(session_id).await?;
        if session.lock().await.browser_id != browser_id {
            return Err(RecorderError::SessionMismatch(session_id.to_string()));
        }
        Ok(session)
    }

    pub async fn add_event(&self, session_id: &str, event: RecordedEvent) -> Result<()> {
        let session = self.get(session_id).await?;
        session.lock().await.events.push(event);
        Ok(())
    }

    pub async fn add_step(&self, session_id: &str, step: String) -> Result<()> {
        let session = self.get(session_id).await?;
        debug!("Step added to session {}: {}", session_id, step);
        session.lock().await.steps.push(step);
        Ok(())
    }

    /// Append an event together with its step under one lock, so the event
    /// log and the step list keep the same order under concurrent callers.
    pub async fn append(&self, session_id: &str, event: RecordedEvent, step: String) -> Result<()> {
        let session = self.get(session_id).await?;
        let mut session = session.lock().await;
        debug!("Step added to session {}: {}", session_id, step);
        session.events.push(event);
        session.steps.push(step);
        Ok(())
    }

    /// Refresh the last-ping timestamp
    pub async fn touch(&self, session_id: &str) -> Result<DateTime<Utc>> {
        let session = self.get(session_id).await?;
        let last_ping = session.lock().await.touch();
        Ok(last_ping)
    }

    /// Remove the session, stop its monitor and release its browser.
    ///
    /// Fails with `SessionNotFound` if another caller already removed it.
    pub async fn close(&self, session_id: &str) -> Result<Session> {
        let entry = self.take(session_id).await?;
        if let Some(monitor) = entry.monitor {
            monitor.abort();
        }
        let session = entry.session.lock().await.clone();
        self.release(&session).await;
        info!("Recording session {} closed", session_id);
        Ok(session)
    }

    /// Close every remaining session, used on shutdown
    pub async fn close_all(&self) {
        let ids: Vec<String> = self.sessions.lock().await.keys().cloned().collect();
        for id in ids {
            // Sessions reclaimed concurrently are already released
            let _ = self.close(&id).await;
        }
    }

    /// Liveness probe. Probe errors count as "still open".
    pub async fn is_browser_closed(&self, browser: &BrowserHandle) -> bool {
        match self.driver.is_closed(browser).await {
            Ok(closed) => closed,
            Err(e) => {
                debug!("Could not check browser {}: {:#}", browser, e);
                false
            }
        }
    }

    pub async fn contains(&self, session_id: &str) -> bool {
        self.sessions.lock().await.contains_key(session_id)
    }

    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Start watching the session's browser.
    ///
    /// The task polls at the registry interval until the session leaves the
    /// registry. When the browser is found closed the session is reclaimed
    /// through the same path as [`SessionRegistry::close`]. A previous monitor
    /// of the same session is replaced.
    pub async fn monitor(
        self: &Arc<Self>,
        session_id: &str,
        hook: Option<Arc<dyn MonitorHook>>,
    ) -> Result<()> {
        let task = tokio::spawn(run_monitor(
            Arc::downgrade(self),
            session_id.to_string(),
            hook,
            self.poll_interval,
        ));

        let mut sessions = self.sessions.lock().await;
        match sessions.get_mut(session_id) {
            Some(entry) => {
                if let Some(previous) = entry.monitor.replace(task) {
                    previous.abort();
                }
                Ok(())
            }
            None => {
                task.abort();
                Err(RecorderError::SessionNotFound(session_id.to_string()))
            }
        }
    }

    async fn take(&self, session_id: &str) -> Result<Entry> {
        self.sessions
            .lock()
            .await
            .remove(session_id)
            .ok_or_else(|| RecorderError::SessionNotFound(session_id.to_string()))
    }

    /// Removal path of the monitor itself: its own task handle is dropped, not aborted.
    async fn reclaim(&self, session_id: &str) -> Result<()> {
        let entry = self.take(session_id).await?;
        let session = entry.session.lock().await.clone();
        self.release(&session).await;
        info!(
            "Browser of session {} was closed, session released automatically",
            session_id
        );
        Ok(())
    }

    async fn release(&self, session: &Session) {
        if let Err(e) = self.driver.close(&session.browser).await {
            warn!(
                "Failed to close browser of session {}: {:#}",
                session.session_id, e
            );
        }
    }
}

async fn run_monitor(
    registry: Weak<SessionRegistry>,
    session_id: String,
    hook: Option<Arc<dyn MonitorHook>>,
    poll_interval: Duration,
) {
    loop {
        let Some(strong) = registry.upgrade() else {
            break;
        };
        if !check_session(&strong, &session_id, hook.as_deref()).await {
            break;
        }
        // The registry must not be kept alive while sleeping
        drop(strong);
        tokio::time::sleep(poll_interval).await;
    }
}

/// One monitor round. Returns false once the session is gone.
async fn check_session(
    registry: &SessionRegistry,
    session_id: &str,
    hook: Option<&dyn MonitorHook>,
) -> bool {
    let Ok(session) = registry.get(session_id).await else {
        debug!("Session {} is gone, monitor stopped", session_id);
        return false;
    };

    let browser = session.lock().await.browser.clone();
    if registry.is_browser_closed(&browser).await {
        if let Err(e) = registry.reclaim(session_id).await {
            debug!("Session {} already released: {}", session_id, e);
        }
        return false;
    }

    if let Some(hook) = hook {
        hook.on_tick(&session).await;
    }
    true
}
