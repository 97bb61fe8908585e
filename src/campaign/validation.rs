// Payload checks shared by the lifecycle machine and campaign creation

use regex::Regex;
use rust_decimal::Decimal;

use super::errors::LifecycleError;
use super::types::NewCampaign;

static PROOF_URL: std::sync::LazyLock<Option<Regex>> =
    std::sync::LazyLock::new(|| Regex::new(r"(?i)^https?://[^\s/?#]+[^\s]*$").ok());

/// Reason text must carry at least `min_chars` characters once trimmed.
pub fn validate_reason(
    field: &'static str,
    reason: &str,
    min_chars: usize,
) -> Result<String, LifecycleError> {
    let trimmed = reason.trim();
    let length = trimmed.chars().count();
    if length < min_chars {
        return Err(LifecycleError::validation(
            field,
            format!("reason too short: {length} characters, at least {min_chars} required"),
        ));
    }
    Ok(trimmed.to_string())
}

pub fn validate_proof_url(url: &str) -> Result<String, LifecycleError> {
    let trimmed = url.trim();
    if trimmed.is_empty() {
        return Err(LifecycleError::validation("placement_proof_url", "proof missing"));
    }
    let valid = PROOF_URL
        .as_ref()
        .is_some_and(|pattern| pattern.is_match(trimmed));
    if !valid {
        return Err(LifecycleError::validation(
            "placement_proof_url",
            format!("'{trimmed}' is not an http(s) URL"),
        ));
    }
    Ok(trimmed.to_string())
}

pub fn validate_commission_percent(percent: Decimal) -> Result<(), LifecycleError> {
    if percent < Decimal::ZERO || percent >= Decimal::ONE_HUNDRED {
        return Err(LifecycleError::validation(
            "platform_commission_percent",
            format!("{percent} is outside [0, 100)"),
        ));
    }
    Ok(())
}

/// Money is kept in whole cents
pub fn validate_cents(field: &'static str, amount: Decimal) -> Result<(), LifecycleError> {
    if amount.normalize().scale() > 2 {
        return Err(LifecycleError::validation(
            field,
            format!("{amount} has more than two decimal places"),
        ));
    }
    Ok(())
}

pub fn validate_new_campaign(request: &NewCampaign) -> Result<(), LifecycleError> {
    if request.budget <= Decimal::ZERO {
        return Err(LifecycleError::validation(
            "budget",
            format!("budget must be positive, got {}", request.budget),
        ));
    }
    validate_cents("budget", request.budget)?;
    if request.end_date <= request.start_date {
        return Err(LifecycleError::validation(
            "end_date",
            format!(
                "end date {} must be after start date {}",
                request.end_date, request.start_date
            ),
        ));
    }
    if let Some(url) = request.creative.creative_video_url.as_deref() {
        validate_link("creative_video_url", url)?;
    }
    if let Some(url) = request.creative.ad_url.as_deref() {
        validate_link("ad_url", url)?;
    }
    Ok(())
}

fn validate_link(field: &'static str, url: &str) -> Result<(), LifecycleError> {
    validate_proof_url(url).map(|_| ()).map_err(|_| {
        LifecycleError::validation(field, format!("'{}' is not an http(s) URL", url.trim()))
    })
}
