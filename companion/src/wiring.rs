//! Live channel subscriptions and the initial predictions fetch.

use lib_net::{ApiRequest, RequestOutcome, Subscription};
use shared::{Alert, AlertLevel, Prediction, PriceUpdate, ALERT, PRICE_UPDATE};
use tracing::{error, info, warn};

use crate::services::Services;

/// Log channel lifecycle and route prices and alerts to the log.
///
/// The returned tokens keep nothing alive; they only allow unsubscribing.
pub fn attach_channel_handlers(services: &Services) -> Vec<Subscription> {
    let channel = &services.channel;

    channel.on_connect(|| info!("Live channel connected"));
    channel.on_disconnect(|reason| warn!(reason = ?reason, "Live channel disconnected"));
    channel.on_error(|err| warn!(kind = %err.kind(), error = %err, "Live channel error"));

    let prices = channel.subscribe_as::<PriceUpdate, _>(PRICE_UPDATE, |tick| {
        info!(
            symbol = %tick.symbol,
            price = tick.price,
            source = tick.source.as_deref().unwrap_or("unknown"),
            "Price update"
        );
    });

    let alerts = channel.subscribe_as::<Alert, _>(ALERT, |alert| match alert.level {
        AlertLevel::Critical => error!(symbol = ?alert.symbol, text = %alert.message, "Alert"),
        AlertLevel::Warning => warn!(symbol = ?alert.symbol, text = %alert.message, "Alert"),
        AlertLevel::Info => info!(symbol = ?alert.symbol, text = %alert.message, "Alert"),
    });

    vec![prices, alerts]
}

/// Fetch `GET /predictions` through the cache.
pub async fn load_predictions(services: &Services) -> Option<Vec<Prediction>> {
    let outcome: RequestOutcome<Vec<Prediction>> = services
        .executor
        .execute(ApiRequest::get("/predictions"), services.predictions_options())
        .await;

    match outcome {
        RequestOutcome::Success { value, from_cache } => {
            info!(count = value.len(), from_cache, "Predictions loaded");
            for prediction in &value {
                info!(
                    symbol = %prediction.symbol,
                    direction = ?prediction.direction,
                    confidence = prediction.confidence,
                    target = prediction.target_price,
                    "Prediction"
                );
            }
            Some(value)
        }
        RequestOutcome::Failure(failure) => {
            warn!(kind = %failure.kind, attempts = failure.attempts, "Predictions unavailable");
            None
        }
    }
}
