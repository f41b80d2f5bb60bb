//! Locator resolution
//!
//! Locators are symbolic names for selectors, grouped per page or feature and
//! scoped to a project. Step generation resolves names through a
//! [`LocatorResolver`]; [`LocatorStore`] is the file-backed implementation.

mod store;

pub use store::LocatorStore;

use crate::error::Result;

/// Maps a symbolic target name to a concrete selector.
pub trait LocatorResolver: Send + Sync {
    /// Resolve `name` inside `group` of `project`.
    ///
    /// Fails with `InvalidConfiguration` when the group or name is unknown
    /// or the resolved selector is empty.
    fn resolve(&self, project: &str, group: &str, name: &str) -> Result<String>;
}
