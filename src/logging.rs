//! Tracing setup and log-safe formatting helpers.

use crate::config::{LogFormat, LoggingConfig};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global subscriber. `RUST_LOG` wins over `LOG_LEVEL`. Safe to
/// call more than once; later calls are ignored.
pub fn init_tracing(config: &LoggingConfig) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "airpay_backend={level},tower_http=info,sqlx=warn,reqwest=info",
            level = config.level.to_lowercase()
        )
        .into()
    });

    let registry = tracing_subscriber::registry().with(env_filter);
    let result = match config.format {
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_target(true),
            )
            .try_init(),
        LogFormat::Plain => registry.with(fmt::layer().with_target(true)).try_init(),
    };

    if let Err(e) = result {
        eprintln!("tracing already initialized: {}", e);
    }
}

/// Keeps the first four and last three characters of a phone number.
pub fn mask_msisdn(msisdn: &str) -> String {
    let chars: Vec<char> = msisdn.trim().chars().collect();
    if chars.len() <= 7 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 3..].iter().collect();
    format!("{}{}{}", head, "*".repeat(chars.len() - 7), tail)
}
