use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single marketplace entry as read from the listing page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    pub title: String,
    pub price: f64,
    pub url: String,
}

/// One listing block found on the page, before filtering.
#[derive(Debug, Clone)]
pub struct Candidate {
    /// Parsed entry, `None` when no price could be read from the block.
    pub listing: Option<Listing>,
    /// Full visible text of the block, one text node per line.
    pub text: String,
}

/// Page content after navigation.
#[derive(Debug, Clone)]
pub struct LoadedPage {
    pub final_url: String,
    pub html: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanReport {
    pub listing: Option<Listing>,
    pub candidates: usize,
    pub checked: usize,
    pub leading_foilers: usize,
    /// Index of the returned listing among the candidates.
    pub position: Option<usize>,
}

/// Persisted best-seen price.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceState {
    pub best_price: Option<f64>,
    pub best_title: Option<String>,
    pub best_url: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CheckOutcome {
    NavigationFailed {
        attempts: u32,
    },
    AuthRequired {
        url: String,
    },
    NoListing {
        report: ScanReport,
    },
    Observed {
        listing: Listing,
        new_low: bool,
        previous_best: Option<f64>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum NotifyOutcome {
    Sent { status: u16 },
    Skipped,
}

/// Row written to the history CSV.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Observation {
    pub observed_at: DateTime<Utc>,
    pub title: String,
    pub price: f64,
    pub url: String,
    pub new_low: bool,
}

pub fn format_price(price: f64) -> String {
    format!("{:.2} €", price)
}
