//! In-memory browser driver for tests

use anyhow::Result;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use super::traits::{BrowserDriver, BrowserHandle};

#[derive(Default)]
pub(crate) struct FakeBrowserDriver {
    next_id: AtomicUsize,
    pub fail_open: Mutex<bool>,
    pub fail_script: Mutex<bool>,
    pub fail_probe: Mutex<bool>,
    closed_by_user: Mutex<HashSet<BrowserHandle>>,
    injected: Mutex<HashSet<BrowserHandle>>,
    urls: Mutex<HashMap<BrowserHandle, String>>,
    pub close_calls: Mutex<Vec<BrowserHandle>>,
    pub scripts: Mutex<Vec<(BrowserHandle, String)>>,
}

impl FakeBrowserDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate the user closing the window
    pub fn close_window(&self, handle: &BrowserHandle) {
        self.closed_by_user.lock().unwrap().insert(handle.clone());
    }

    /// Simulate a navigation that drops the injected script
    pub fn navigate(&self, handle: &BrowserHandle, url: &str) {
        self.urls
            .lock()
            .unwrap()
            .insert(handle.clone(), url.to_string());
        self.injected.lock().unwrap().remove(handle);
    }

    pub fn close_count(&self, handle: &BrowserHandle) -> usize {
        self.close_calls
            .lock()
            .unwrap()
            .iter()
            .filter(|h| *h == handle)
            .count()
    }

    pub fn script_count(&self, handle: &BrowserHandle) -> usize {
        self.scripts
            .lock()
            .unwrap()
            .iter()
            .filter(|(h, _)| h == handle)
            .count()
    }

    pub fn handles(&self) -> Vec<BrowserHandle> {
        let count = self.next_id.load(Ordering::SeqCst);
        (0..count)
            .map(|i| BrowserHandle::new(format!("fake-{}", i)))
            .collect()
    }
}

#[async_trait]
impl BrowserDriver for FakeBrowserDriver {
    async fn open(&self) -> Result<BrowserHandle> {
        if *self.fail_open.lock().unwrap() {
            anyhow::bail!("no browser available");
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let handle = BrowserHandle::new(format!("fake-{}", id));
        self.urls
            .lock()
            .unwrap()
            .insert(handle.clone(), "about:blank".to_string());
        Ok(handle)
    }

    async fn close(&self, handle: &BrowserHandle) -> Result<()> {
        self.close_calls.lock().unwrap().push(handle.clone());
        self.closed_by_user.lock().unwrap().insert(handle.clone());
        Ok(())
    }

    async fn current_url(&self, handle: &BrowserHandle) -> Result<String> {
        self.urls
            .lock()
            .unwrap()
            .get(handle)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("unknown handle"))
    }

    async fn execute_script(
        &self,
        handle: &BrowserHandle,
        source: &str,
    ) -> Result<serde_json::Value> {
        if *self.fail_script.lock().unwrap() {
            anyhow::bail!("javascript disabled");
        }
        if source.contains("__webRecorderInjected === true") {
            let injected = self.injected.lock().unwrap().contains(handle);
            return Ok(serde_json::Value::Bool(injected));
        }
        self.scripts
            .lock()
            .unwrap()
            .push((handle.clone(), source.to_string()));
        self.injected.lock().unwrap().insert(handle.clone());
        Ok(serde_json::Value::Null)
    }

    async fn is_closed(&self, handle: &BrowserHandle) -> Result<bool> {
        if *self.fail_probe.lock().unwrap() {
            anyhow::bail!("probe timed out");
        }
        Ok(self.closed_by_user.lock().unwrap().contains(handle))
    }
}
