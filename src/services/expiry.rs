//! Expiry computation from a duration and unit.

use chrono::{DateTime, Days, Months, Utc};

use crate::{error::AppError, models::license_key::DurationUnit};

/// Compute an absolute expiry `duration` `unit`s after `now`.
///
/// Months and years use calendar arithmetic: Jan 31 + 1 month is the last day
/// of February. `Unlimited` yields `None` and ignores `duration`.
///
/// # Errors
///
/// - `InvalidRequest`: `duration` missing or zero for a bounded unit, or the
///   result is out of range
pub fn compute_expiry(
    now: DateTime<Utc>,
    duration: Option<u32>,
    unit: DurationUnit,
) -> Result<Option<DateTime<Utc>>, AppError> {
    if unit == DurationUnit::Unlimited {
        return Ok(None);
    }

    let amount = match duration {
        Some(n) if n > 0 => n,
        _ => {
            return Err(AppError::InvalidRequest(
                "duration must be a positive integer".to_string(),
            ));
        }
    };

    let expires_at = match unit {
        DurationUnit::Days => now.checked_add_days(Days::new(u64::from(amount))),
        DurationUnit::Months => now.checked_add_months(Months::new(amount)),
        DurationUnit::Years => amount
            .checked_mul(12)
            .and_then(|months| now.checked_add_months(Months::new(months))),
        DurationUnit::Unlimited => None,
    };

    expires_at
        .map(Some)
        .ok_or_else(|| AppError::InvalidRequest("duration is out of range".to_string()))
}
