mod driver;

pub use driver::{BrowserType, PlaywrightDriver, WebDriverConfig};
