#[cfg(feature = "lambda")]
use aws_config::BehaviorVersion;
#[cfg(feature = "lambda")]
use aws_sdk_s3::config::Region;
#[cfg(feature = "lambda")]
use aws_sdk_s3::Client as S3Client;
#[cfg(feature = "lambda")]
use lambda_runtime::{run, service_fn, Error, LambdaEvent};
#[cfg(feature = "lambda")]
use price_monitor::app::build_page_source;
#[cfg(feature = "lambda")]
use price_monitor::core::{CheckOutcome, Storage};
#[cfg(feature = "lambda")]
use price_monitor::utils::{logger, validation::Validate};
#[cfg(feature = "lambda")]
use price_monitor::{IftttNotifier, LambdaConfig, MonitorEngine, S3Storage, SessionState};
#[cfg(feature = "lambda")]
use serde::{Deserialize, Serialize};

/// EventBridge schedule payload; every field is optional.
#[cfg(feature = "lambda")]
#[derive(Deserialize, Default)]
pub struct Request {
    pub target_url: Option<String>,
}

#[cfg(feature = "lambda")]
#[derive(Serialize)]
pub struct Response {
    pub outcome: String,
    pub title: Option<String>,
    pub price: Option<f64>,
    pub url: Option<String>,
    pub new_low: bool,
}

#[cfg(feature = "lambda")]
fn boxed(e: price_monitor::MonitorError) -> Error {
    Box::new(e) as Box<dyn std::error::Error + Send + Sync>
}

#[cfg(feature = "lambda")]
async fn function_handler(event: LambdaEvent<Request>) -> Result<Response, Error> {
    tracing::info!("Starting price check Lambda invocation");

    let mut lambda_config = LambdaConfig::from_env().map_err(boxed)?;
    if let Some(url) = event.payload.target_url {
        lambda_config.monitor.target_url = url;
    }
    lambda_config.validate().map_err(boxed)?;

    // 創建AWS配置和S3客戶端
    let config = aws_config::load_defaults(BehaviorVersion::latest()).await;
    let region = Region::new(lambda_config.s3_region.clone());
    let config = aws_sdk_s3::config::Builder::from(&config)
        .region(region)
        .force_path_style(true)
        .build();
    let storage = S3Storage::new(S3Client::from_conf(config), lambda_config.s3_bucket.clone());

    let session = match &lambda_config.session_key {
        Some(key) => {
            let bytes = storage.read_file(key).await.map_err(boxed)?;
            SessionState::from_slice(&bytes, key).map_err(boxed)?
        }
        None => SessionState::from_file(&lambda_config.monitor.storage_state_path)
            .map_err(boxed)?,
    };

    let monitor = lambda_config.monitor;
    let source = build_page_source(&monitor, Some(&session)).map_err(boxed)?;
    let notifier = IftttNotifier::new(
        &monitor.ifttt_base_url,
        &monitor.ifttt_event,
        &monitor.ifttt_key,
    );
    let mut engine = MonitorEngine::new(source, notifier, storage, monitor);

    let response = match engine.check_once().await.map_err(boxed)? {
        CheckOutcome::Observed {
            listing, new_low, ..
        } => Response {
            outcome: "observed".to_string(),
            title: Some(listing.title),
            price: Some(listing.price),
            url: Some(listing.url),
            new_low,
        },
        other => Response {
            outcome: match other {
                CheckOutcome::NavigationFailed { .. } => "navigation_failed",
                CheckOutcome::AuthRequired { .. } => "auth_required",
                _ => "no_listing",
            }
            .to_string(),
            title: None,
            price: None,
            url: None,
            new_low: false,
        },
    };

    tracing::info!("Price check finished: {}", response.outcome);
    Ok(response)
}

#[cfg(feature = "lambda")]
#[tokio::main]
async fn main() -> Result<(), Error> {
    logger::init_lambda_logger();

    run(service_fn(function_handler)).await
}
