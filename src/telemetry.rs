use anyhow::{anyhow, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use uuid::Uuid;

use crate::campaign::types::{CampaignId, Role};

/// Initialize structured logging.
///
/// `RUST_LOG` wins over `log_level` when set. Logs go to stderr so command
/// output on stdout stays machine-readable.
pub fn init_telemetry(log_level: &str, json: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let result = if json {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(true)
                    .with_writer(std::io::stderr),
            )
            .with(filter)
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .with(filter)
            .try_init()
    };
    result.map_err(|e| anyhow!("Failed to initialize telemetry: {e}"))?;

    tracing::debug!("Ad marketplace telemetry initialized");
    Ok(())
}

/// Generate a correlation ID for linking related operations
pub fn generate_correlation_id() -> String {
    Uuid::new_v4().to_string()
}

/// Span wrapping one lifecycle operation
pub fn create_lifecycle_span(
    operation: &str,
    campaign_id: Option<CampaignId>,
    role: Role,
    correlation_id: &str,
) -> tracing::Span {
    let campaign_id = campaign_id.map(|id| id.to_string());
    tracing::info_span!(
        "campaign_lifecycle",
        operation = operation,
        campaign.id = campaign_id.as_deref(),
        actor.role = role.as_str(),
        correlation.id = correlation_id,
        otel.kind = "internal"
    )
}

pub fn shutdown_telemetry() {
    tracing::debug!("Ad marketplace telemetry shutdown complete");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_correlation_ids_are_unique() {
        assert_ne!(generate_correlation_id(), generate_correlation_id());
    }

    #[test]
    fn test_lifecycle_span_accepts_missing_campaign() {
        let correlation_id = generate_correlation_id();
        let _span = create_lifecycle_span("deposit", None, Role::Seller, &correlation_id);
        let _span = create_lifecycle_span(
            "accept_campaign",
            Some(CampaignId::new()),
            Role::ChannelOwner,
            &correlation_id,
        );
    }
}
