pub mod adapters;
pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;

#[cfg(feature = "lambda")]
pub use config::lambda::{LambdaConfig, S3Storage};

pub use adapters::{http::HttpPageSource, ifttt::IftttNotifier, session::SessionState};
pub use config::{cli::LocalStorage, MonitorConfig, PageSourceKind};
pub use core::engine::MonitorEngine;
pub use utils::error::{MonitorError, Result};
