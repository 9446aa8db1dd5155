use anyhow::{bail, Context, Result};
use clap::Parser;
use price_monitor::app::build_page_source;
use price_monitor::config::toml_config::TomlConfig;
use price_monitor::core::parser::{extract_candidates, has_price_badge};
use price_monitor::core::scanner::{find_first_non_foiler, is_foiler};
use price_monitor::core::PageSource;
use price_monitor::utils::logger;
use price_monitor::{CliConfig, SessionState};

// 載入一次目標頁面並列出解析結果，用來檢查頁面結構是否改變
#[derive(Parser)]
#[command(name = "probe-page")]
#[command(about = "Load the market page once and print every parsed listing block")]
struct Args {
    #[command(flatten)]
    monitor: CliConfig,

    /// Save the fetched HTML to this file
    #[arg(long)]
    dump_html: Option<String>,

    /// Read HTML from a local file instead of loading the page
    #[arg(long)]
    from_file: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    logger::init_cli_logger(args.monitor.verbose);

    let file = args
        .monitor
        .config
        .as_deref()
        .map(TomlConfig::from_file)
        .transpose()?;
    let config = args.monitor.resolve(file.as_ref());

    let html = match &args.from_file {
        Some(path) => {
            std::fs::read_to_string(path).with_context(|| format!("reading {}", path))?
        }
        None => {
            let session = SessionState::from_file(&config.storage_state_path)?;
            let applied: Vec<&str> = session
                .cookies_for(&config.target_url)
                .into_iter()
                .map(|c| c.name.as_str())
                .collect();
            println!(
                "🍪 {} session cookies apply to the target: {}",
                applied.len(),
                applied.join(", ")
            );
            let source = build_page_source(&config, Some(&session))?;
            let page = source.load(&config.target_url).await?;
            println!("🌐 Final URL: {}", page.final_url);
            if page.final_url.starts_with(&config.auth_url_prefix) {
                bail!(
                    "redirected to login, the session in {} has expired",
                    config.storage_state_path
                );
            }
            page.html
        }
    };

    if let Some(path) = &args.dump_html {
        std::fs::write(path, &html).with_context(|| format!("writing {}", path))?;
        println!("💾 HTML saved to {}", path);
    }

    println!("🏷️ Price badge present: {}", has_price_badge(&html));

    let candidates = extract_candidates(&html, &config.target_url);
    println!("📋 {} candidate blocks", candidates.len());
    for (i, candidate) in candidates.iter().enumerate() {
        let verdict = if is_foiler(candidate) { "FOILER" } else { "ok" };
        match &candidate.listing {
            Some(listing) => println!(
                "  [{:>3}] {:<6} {:>8.2} € | {} | {}",
                i, verdict, listing.price, listing.title, listing.url
            ),
            None => println!(
                "  [{:>3}] {:<6}  (no price) | {}",
                i,
                verdict,
                candidate.text.lines().next().unwrap_or_default()
            ),
        }
    }

    let report = find_first_non_foiler(&candidates, config.max_scan_items);
    match report.listing {
        Some(listing) => println!(
            "✅ Would track: {:.2} € - {} (row {:?}, {} leading Foiler rows)",
            listing.price, listing.title, report.position, report.leading_foilers
        ),
        None => println!("⚠️ No non-Foiler listing found"),
    }

    Ok(())
}
