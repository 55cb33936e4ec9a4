use crate::error::ValidationError;
use tracing::debug;

/// Validate a submission before it becomes a transaction
/// Returns the key and value if both are present and non-empty.
/// The key is checked first.
pub fn validate_submission<'a>(
    key: Option<&'a str>,
    value: Option<&'a str>,
) -> Result<(&'a str, &'a str), ValidationError> {
    let key = key
        .filter(|k| !k.is_empty())
        .ok_or(ValidationError::MissingKey)?;
    let value = value
        .filter(|v| !v.is_empty())
        .ok_or(ValidationError::MissingValue)?;

    debug!(key, "Submission validated");
    Ok((key, value))
}
