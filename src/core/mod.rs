pub mod engine;
pub mod history;
pub mod parser;
pub mod scanner;
pub mod tracker;

pub use crate::domain::model::{
    Candidate, CheckOutcome, Listing, LoadedPage, NotifyOutcome, Observation, PriceState,
    ScanReport,
};
pub use crate::domain::ports::{ConfigProvider, Notifier, PageSource, Storage};
pub use crate::utils::error::Result;
