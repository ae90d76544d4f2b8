/// Field normalization and referential checks
///
/// The string checks are pure. `require_active_manager` reads the store but
/// never writes it.
///
/// When several fields are validated together the order is fixed:
/// name, mobile, PAN, manager. The first failure wins.
///
/// # Example
///
/// ```
/// use roster_shared::validation::{normalize_mobile, normalize_tax_id};
///
/// assert_eq!(normalize_mobile("+919876543210").unwrap(), "9876543210");
/// assert_eq!(normalize_tax_id("abcde1234f").unwrap(), "ABCDE1234F");
/// ```

use crate::error::{RecordError, RecordResult};
use crate::models::manager::Manager;
use once_cell::sync::Lazy;
use regex::Regex;
use sqlx::SqliteExecutor;

static MOBILE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9]{10}$").expect("mobile regex should compile"));

static TAX_ID_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z]{5}[0-9]{4}[A-Z]$").expect("PAN regex should compile"));

/// Strips one `+91` prefix, or failing that one leading `0`
///
/// Used directly for lookups, where the value is matched rather than validated.
pub fn strip_mobile_prefix(raw: &str) -> &str {
    raw.strip_prefix("+91")
        .or_else(|| raw.strip_prefix('0'))
        .unwrap_or(raw)
}

/// Normalizes a mobile number to its ten-digit form
pub fn normalize_mobile(raw: &str) -> RecordResult<String> {
    let stripped = strip_mobile_prefix(raw);

    if MOBILE_REGEX.is_match(stripped) {
        Ok(stripped.to_string())
    } else {
        Err(RecordError::InvalidMobile)
    }
}

/// Normalizes a PAN to upper case
pub fn normalize_tax_id(raw: &str) -> RecordResult<String> {
    let upper = raw.to_uppercase();

    if TAX_ID_REGEX.is_match(&upper) {
        Ok(upper)
    } else {
        Err(RecordError::InvalidTaxId)
    }
}

/// Returns the trimmed name, failing when absent or blank
pub fn require_non_empty_name(raw: Option<&str>) -> RecordResult<String> {
    match raw.map(str::trim) {
        Some(name) if !name.is_empty() => Ok(name.to_string()),
        _ => Err(RecordError::InvalidName),
    }
}

/// Loads `manager_id` if it exists and is active
///
/// A missing or inactive manager is a validation failure, not a lookup error.
pub async fn require_active_manager<'e, E>(executor: E, manager_id: &str) -> RecordResult<Manager>
where
    E: SqliteExecutor<'e>,
{
    Manager::find_active(executor, manager_id)
        .await?
        .ok_or(RecordError::ManagerNotActive)
}
