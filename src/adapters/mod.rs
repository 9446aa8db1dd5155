// Adapters layer: concrete implementations of the domain ports (page sources,
// notifier) plus the browser session they share.

#[cfg(feature = "browser")]
pub mod browser;
pub mod http;
pub mod ifttt;
pub mod session;
