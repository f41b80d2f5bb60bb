pub mod traits;
pub mod web;

#[cfg(test)]
pub(crate) mod testing;

pub use traits::{BrowserDriver, BrowserHandle};
