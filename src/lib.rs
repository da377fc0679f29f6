pub mod age;
pub mod browser;
pub mod capture;
pub mod config;
pub mod error;
pub mod page;

pub use capture::{capture_payload, PageTarget, PayloadTemplate};
pub use config::Settings;
pub use error::{Error, Result};
