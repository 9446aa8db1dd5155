use clap::Parser;
use price_monitor::app::build_page_source;
use price_monitor::config::toml_config::TomlConfig;
use price_monitor::core::CheckOutcome;
use price_monitor::utils::{logger, validation::Validate};
use price_monitor::{
    CliConfig, IftttNotifier, LocalStorage, MonitorConfig, MonitorEngine, MonitorError,
    SessionState,
};

#[derive(Parser)]
#[command(name = "price-monitor")]
#[command(about = "Watches a card marketplace and alerts on new lowest prices")]
struct Cli {
    #[command(flatten)]
    monitor: CliConfig,
}

fn fail(e: &MonitorError) -> ! {
    tracing::error!(
        "❌ {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
    eprintln!("❌ {}", e.user_friendly_message());
    std::process::exit(e.exit_code().max(1));
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("⚠️ Could not listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::warn!("⚠️ Could not listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse().monitor;

    // 初始化日誌
    logger::init_cli_logger(cli.verbose);
    tracing::info!("🚀 Starting price-monitor (first non-Foiler card)");

    // 載入 TOML 配置 (選用)
    let file = match &cli.config {
        Some(path) => {
            tracing::info!("📁 Loading configuration from: {}", path);
            match TomlConfig::from_file(path) {
                Ok(file) => Some(file),
                Err(e) => fail(&e),
            }
        }
        None => None,
    };
    let config: MonitorConfig = cli.resolve(file.as_ref());
    tracing::debug!(
        "Resolved config: target={} source={} poll={}s",
        config.target_url,
        config.page_source,
        config.poll_seconds
    );

    // 驗證配置
    if let Err(e) = config.validate() {
        fail(&e);
    }

    // 沒有登入狀態就不啟動
    let session = match SessionState::from_file(&config.storage_state_path) {
        Ok(session) => session,
        Err(e) => fail(&e),
    };

    let source = match build_page_source(&config, Some(&session)) {
        Ok(source) => source,
        Err(e) => fail(&e),
    };
    let notifier = IftttNotifier::new(
        &config.ifttt_base_url,
        &config.ifttt_event,
        &config.ifttt_key,
    );
    let storage = LocalStorage::new(String::new());
    let monitor_enabled = config.monitor;
    if monitor_enabled {
        tracing::info!("🔍 Resource monitoring enabled");
    }

    let mut engine =
        MonitorEngine::new_with_monitoring(source, notifier, storage, config, monitor_enabled);

    if cli.once {
        match engine.check_once().await {
            Ok(CheckOutcome::NavigationFailed { attempts }) => {
                eprintln!("❌ Page did not load after {} attempts", attempts);
                std::process::exit(2);
            }
            Ok(CheckOutcome::AuthRequired { .. }) => {
                eprintln!("❌ Session expired, regenerate storage_state.json");
                std::process::exit(1);
            }
            Ok(outcome) => tracing::info!("✅ Single check finished: {:?}", outcome),
            Err(e) => fail(&e),
        }
        return;
    }

    match engine.run(shutdown_signal()).await {
        Ok(checks) => tracing::info!("👋 Monitor stopped after {} checks", checks),
        Err(e) => fail(&e),
    }
}
