use anyhow::Result;
use async_trait::async_trait;
use std::fmt;

/// Opaque identifier of a browser instance opened by a [`BrowserDriver`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BrowserHandle(String);

impl BrowserHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BrowserHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Browser driver used by the recorder
///
/// Abstracts the automation backend that opens the visible browser a user
/// records in. One handle maps to one browser window owned by one session.
#[async_trait]
pub trait BrowserDriver: Send + Sync {
    /// Open a new browser on a blank page
    async fn open(&self) -> Result<BrowserHandle>;

    /// Close the browser. Closing an unknown or already closed handle is not an error.
    async fn close(&self, handle: &BrowserHandle) -> Result<()>;

    /// URL of the page currently shown
    async fn current_url(&self, handle: &BrowserHandle) -> Result<String>;

    /// Execute a script body in the page. The body may `return` a value,
    /// which is handed back as JSON.
    async fn execute_script(
        &self,
        handle: &BrowserHandle,
        source: &str,
    ) -> Result<serde_json::Value>;

    /// Liveness probe
    ///
    /// # Returns
    /// `Ok(true)` once the user closed the browser. An `Err` means the state
    /// could not be determined; callers treat it as still open.
    async fn is_closed(&self, handle: &BrowserHandle) -> Result<bool>;
}
