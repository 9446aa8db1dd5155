use crate::core::{Candidate, Listing};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use std::sync::LazyLock;
use url::Url;

pub const DEFAULT_TITLE: &str = "Carte unique";

static BADGE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)À\s*PARTIR\s*DE").expect("badge pattern"));
static BUY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bACHETER\b").expect("buy pattern"));
static BADGE_PRICE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)À\s*PARTIR\s*DE\s*([0-9]+(?:[.,][0-9]{1,2})?)\s*€").expect("price pattern")
});
static BARE_PRICE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+(?:[.,]\d{1,2})?)\s*€").expect("bare price pattern"));

static CONTAINER_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("article, li, div").expect("container selector"));
static TITLE_SEL: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(r#"h3, h2, .title, [data-testid="card-title"]"#).expect("title selector")
});
static LINK_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("link selector"));

/// Reads a price in euros out of a block of text.
///
/// The "À PARTIR DE" badge wins over any other amount in the block; when it
/// is missing the first `<n> €` is used.
pub fn parse_price(text: &str) -> Option<f64> {
    let normalized = text.replace(['\u{a0}', '\u{202f}'], " ");

    let raw = BADGE_PRICE_RE
        .captures(&normalized)
        .or_else(|| BARE_PRICE_RE.captures(&normalized))
        .and_then(|caps| caps.get(1))?
        .as_str();

    raw.replace(',', ".").parse::<f64>().ok()
}

/// Elements whose text never shows on the page.
const HIDDEN_TAGS: [&str; 4] = ["script", "style", "noscript", "template"];

/// True once the listing page has rendered its price badges.
///
/// Only rendered text counts: entities are decoded and script or style
/// content (i18n bundles, JSON state) is ignored.
pub fn has_price_badge(html: &str) -> bool {
    let document = Html::parse_document(html);
    let text = document
        .tree
        .root()
        .descendants()
        .filter_map(|node| {
            let text = node.value().as_text()?;
            let hidden = node.ancestors().any(|parent| {
                parent
                    .value()
                    .as_element()
                    .is_some_and(|el| HIDDEN_TAGS.contains(&el.name()))
            });
            (!hidden).then_some(&**text)
        })
        .collect::<Vec<_>>()
        .join(" ")
        .replace(['\u{a0}', '\u{202f}'], " ");

    BADGE_RE.is_match(&text)
}

/// Text of an element, one non-empty text node per line.
fn element_text(element: &ElementRef) -> String {
    element
        .text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn is_listing_block(text: &str) -> bool {
    BUY_RE.is_match(text) && BADGE_RE.is_match(text)
}

/// Finds listing blocks in document order and parses each of them.
///
/// A block is an `article`, `li` or `div` showing both a buy button and a
/// "À PARTIR DE" badge. Wrappers around several blocks are skipped by keeping
/// only the innermost matches.
pub fn extract_candidates(html: &str, base_url: &str) -> Vec<Candidate> {
    let document = Html::parse_document(html);

    let matching: Vec<(ElementRef, String)> = document
        .select(&CONTAINER_SEL)
        .filter_map(|el| {
            let text = element_text(&el);
            is_listing_block(&text).then_some((el, text))
        })
        .collect();
    let matching_ids: HashSet<_> = matching.iter().map(|(el, _)| el.id()).collect();

    matching
        .into_iter()
        .filter(|(el, _)| {
            !el.select(&CONTAINER_SEL)
                .any(|inner| matching_ids.contains(&inner.id()))
        })
        .map(|(el, text)| Candidate {
            listing: extract_listing(&el, &text, base_url),
            text,
        })
        .collect()
}

fn extract_listing(element: &ElementRef, text: &str, base_url: &str) -> Option<Listing> {
    let price = parse_price(text)?;
    Some(Listing {
        title: extract_title(element, text),
        price,
        url: extract_url(element, base_url),
    })
}

fn extract_title(element: &ElementRef, text: &str) -> String {
    let dedicated = element
        .select(&TITLE_SEL)
        .next()
        .map(|t| element_text(&t).replace('\n', " "))
        .filter(|t| !t.is_empty());
    if let Some(title) = dedicated {
        return title;
    }

    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .find(|line| {
            let upper = line.to_uppercase();
            !upper.contains("À PARTIR") && !upper.contains("ACHETER") && !upper.contains("VENDRE")
        })
        .map(str::to_string)
        .unwrap_or_else(|| DEFAULT_TITLE.to_string())
}

/// First link that is neither the market list itself nor a Foiler page.
fn extract_url(element: &ElementRef, base_url: &str) -> String {
    for link in element.select(&LINK_SEL) {
        let Some(href) = link.value().attr("href").filter(|h| !h.is_empty()) else {
            continue;
        };
        let lower = href.to_lowercase();
        if lower.contains("market") || lower.contains("foiler") {
            continue;
        }
        if href.starts_with("http") {
            return href.to_string();
        }
        return Url::parse(base_url)
            .and_then(|base| base.join(href))
            .map(|u| u.to_string())
            .unwrap_or_else(|_| href.to_string());
    }
    base_url.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://www.altered.gg/fr-fr/cards/market?order[price]=ASC";

    #[test]
    fn test_parse_price_prefers_badge() {
        assert_eq!(parse_price("Vendu 3 € hier\nÀ PARTIR DE 12,50 €"), Some(12.5));
        assert_eq!(parse_price("à partir de 7 €"), Some(7.0));
        assert_eq!(parse_price("À\u{a0}PARTIR\u{a0}DE\u{202f}4.9\u{a0}€"), Some(4.9));
    }

    #[test]
    fn test_parse_price_fallback_and_missing() {
        assert_eq!(parse_price("Prix : 15,99 €"), Some(15.99));
        assert_eq!(parse_price("Aucun prix"), None);
        assert_eq!(parse_price("À PARTIR DE --"), None);
    }

    #[test]
    fn test_extract_candidates_innermost_blocks() {
        let html = r#"
            <html><body><div id="wrapper">
              <ul>
                <li><h3>Sierra</h3><span>À PARTIR DE 2,00 €</span><button>Acheter</button>
                    <a href="/fr-fr/cards/ALT_CORE_B_AX_04_U_123">voir</a></li>
                <li><h3>Kojo</h3><span>À PARTIR DE 3,10 €</span><button>Acheter</button></li>
              </ul>
            </div></body></html>"#;

        let candidates = extract_candidates(html, BASE);
        assert_eq!(candidates.len(), 2);

        let first = candidates[0].listing.as_ref().unwrap();
        assert_eq!(first.title, "Sierra");
        assert_eq!(first.price, 2.0);
        assert_eq!(
            first.url,
            "https://www.altered.gg/fr-fr/cards/ALT_CORE_B_AX_04_U_123"
        );

        let second = candidates[1].listing.as_ref().unwrap();
        assert_eq!(second.title, "Kojo");
        assert_eq!(second.url, BASE);
    }

    #[test]
    fn test_title_falls_back_to_first_plain_line() {
        let html = r#"<div><div><p>À partir de 5 €</p><p>Rin, Fils du Vent</p>
            <button>ACHETER</button><button>Vendre</button></div></div>"#;
        let candidates = extract_candidates(html, BASE);
        assert_eq!(candidates.len(), 1);
        assert_eq!(
            candidates[0].listing.as_ref().unwrap().title,
            "Rin, Fils du Vent"
        );
    }

    #[test]
    fn test_title_default_when_only_badges() {
        let html = r#"<article><span>À PARTIR DE 5 €</span><span>Acheter</span></article>"#;
        let candidates = extract_candidates(html, BASE);
        assert_eq!(candidates[0].listing.as_ref().unwrap().title, DEFAULT_TITLE);
    }

    #[test]
    fn test_url_skips_market_and_foiler_links() {
        let html = r#"<article><h2>Akesha</h2>
            <a href="/fr-fr/cards/market?x=1">market</a>
            <a href="https://foiler.example/akesha">foiler</a>
            <a href="https://www.altered.gg/fr-fr/cards/AKESHA_U_9">card</a>
            <span>À PARTIR DE 9 €</span><b>Acheter</b></article>"#;
        let candidates = extract_candidates(html, BASE);
        assert_eq!(
            candidates[0].listing.as_ref().unwrap().url,
            "https://www.altered.gg/fr-fr/cards/AKESHA_U_9"
        );
    }

    #[test]
    fn test_block_without_price_keeps_text() {
        let html = r#"<li><h3>Teija</h3><span>À PARTIR DE</span><span>Acheter</span></li>"#;
        let candidates = extract_candidates(html, BASE);
        assert_eq!(candidates.len(), 1);
        assert!(candidates[0].listing.is_none());
        assert!(candidates[0].text.contains("Teija"));
    }

    #[test]
    fn test_has_price_badge() {
        assert!(has_price_badge("<span>à partir de 2 €</span>"));
        assert!(!has_price_badge("<title>Connexion</title>"));
    }

    #[test]
    fn test_badge_with_nbsp_entities() {
        let html = "<li><h3>Kojo</h3><span>À&nbsp;PARTIR&nbsp;DE 5&nbsp;€</span>\
                    <button>Acheter</button></li>";
        assert!(has_price_badge(html));
        let candidates = extract_candidates(html, BASE);
        assert_eq!(candidates[0].listing.as_ref().unwrap().price, 5.0);
    }

    #[test]
    fn test_badge_inside_script_is_ignored() {
        let html = r#"<html><head><style>.b::after { content: "À partir de"; }</style></head>
            <body><div id="root">Chargement...</div>
            <script id="__NEXT_DATA__" type="application/json">{"from":"À partir de"}</script>
            </body></html>"#;
        assert!(!has_price_badge(html));
    }
}
