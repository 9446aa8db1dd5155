use crate::core::{Candidate, ScanReport};
use regex::Regex;
use std::sync::LazyLock;

static FOILER_TITLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bfoiler\b").expect("foiler pattern"));

/// A Foiler card names itself in its title, or carries the word somewhere
/// in its block when the title is generic.
pub fn is_foiler(candidate: &Candidate) -> bool {
    let title_says_so = candidate
        .listing
        .as_ref()
        .is_some_and(|listing| FOILER_TITLE_RE.is_match(&listing.title));
    title_says_so || candidate.text.to_lowercase().contains("foiler")
}

/// Walks the candidates in page order and returns the first priced listing
/// that is not a Foiler card.
///
/// Blocks without a readable price are skipped silently. `leading_foilers`
/// only counts Foilers sitting contiguously at the top of the list.
pub fn find_first_non_foiler(candidates: &[Candidate], max_scan_items: usize) -> ScanReport {
    let mut report = ScanReport {
        candidates: candidates.len(),
        ..Default::default()
    };
    tracing::info!(
        "🔎 Candidate blocks (ACHETER + À PARTIR DE): {}",
        candidates.len()
    );

    for (i, candidate) in candidates.iter().take(max_scan_items).enumerate() {
        report.checked += 1;

        let Some(listing) = &candidate.listing else {
            continue;
        };

        if is_foiler(candidate) {
            if report.leading_foilers == i {
                report.leading_foilers += 1;
            }
            tracing::info!("🚫 Row {}: '{}' is a Foiler, skipped", i, listing.title);
            continue;
        }

        tracing::info!(
            "✅ First non-Foiler at row {}: {:.2} € - {} - {}",
            i,
            listing.price,
            listing.title,
            listing.url
        );
        if report.leading_foilers > 0 {
            tracing::info!("Leading Foiler rows ignored: {}", report.leading_foilers);
        }
        report.listing = Some(listing.clone());
        report.position = Some(i);
        return report;
    }

    if report.leading_foilers > 0 {
        tracing::info!("Leading Foiler rows ignored: {}", report.leading_foilers);
    }
    tracing::info!(
        "No non-Foiler card found after checking {} blocks",
        report.checked
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Listing;

    fn priced(title: &str, price: f64, text: &str) -> Candidate {
        Candidate {
            listing: Some(Listing {
                title: title.to_string(),
                price,
                url: format!("https://example.com/{}", title),
            }),
            text: text.to_string(),
        }
    }

    fn unpriced(text: &str) -> Candidate {
        Candidate {
            listing: None,
            text: text.to_string(),
        }
    }

    #[test]
    fn test_skips_leading_foilers() {
        let candidates = vec![
            priced("Sierra Foiler", 1.0, "Sierra Foiler"),
            priced("FOILER Kojo", 1.5, "FOILER Kojo"),
            priced("Rin", 4.0, "Rin"),
        ];
        let report = find_first_non_foiler(&candidates, 300);
        assert_eq!(report.listing.unwrap().title, "Rin");
        assert_eq!(report.leading_foilers, 2);
        assert_eq!(report.position, Some(2));
        assert_eq!(report.checked, 3);
    }

    #[test]
    fn test_foiler_marker_in_block_text() {
        let candidates = vec![
            priced("Akesha", 2.0, "Akesha\nVendu par foiler"),
            priced("Teija", 3.0, "Teija"),
        ];
        let report = find_first_non_foiler(&candidates, 300);
        assert_eq!(report.listing.unwrap().title, "Teija");
        assert_eq!(report.leading_foilers, 1);
    }

    #[test]
    fn test_unpriced_block_breaks_leading_count() {
        let candidates = vec![
            unpriced("sans prix"),
            priced("X Foiler", 1.0, "X Foiler"),
            priced("Lyra", 6.0, "Lyra"),
        ];
        let report = find_first_non_foiler(&candidates, 300);
        assert_eq!(report.listing.unwrap().title, "Lyra");
        assert_eq!(report.leading_foilers, 0);
    }

    #[test]
    fn test_title_word_boundary() {
        // 標題不是完整單字 foiler，但區塊文字仍包含它
        let candidates = vec![priced("Foilerine", 2.0, "Foilerine")];
        let report = find_first_non_foiler(&candidates, 300);
        assert!(report.listing.is_none());
    }

    #[test]
    fn test_is_foiler_verdicts() {
        assert!(is_foiler(&priced("Sierra Foiler", 1.0, "Sierra Foiler")));
        assert!(is_foiler(&priced("Akesha", 2.0, "Akesha\nVendu par FOILER")));
        assert!(!is_foiler(&priced("Teija", 3.0, "Teija\nÀ PARTIR DE 3 €")));
        // 沒有價格的區塊仍可由文字判斷
        assert!(is_foiler(&unpriced("Foiler\nÀ PARTIR DE")));
        assert!(!is_foiler(&unpriced("Lyra")));
    }

    #[test]
    fn test_respects_scan_cap() {
        let candidates = vec![
            priced("A Foiler", 1.0, "A Foiler"),
            priced("B Foiler", 1.0, "B Foiler"),
            priced("Ordis", 2.0, "Ordis"),
        ];
        let report = find_first_non_foiler(&candidates, 2);
        assert!(report.listing.is_none());
        assert_eq!(report.candidates, 3);
        assert_eq!(report.checked, 2);
        assert_eq!(report.leading_foilers, 2);
    }
}
