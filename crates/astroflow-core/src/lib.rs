pub mod config;
pub mod error;
pub mod event;
pub mod types;

pub use config::Settings;
pub use error::{AstroflowError, Result};
pub use event::EventBus;
pub use types::*;
