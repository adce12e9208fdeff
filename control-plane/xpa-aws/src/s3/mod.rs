//! S3 kinds.

pub mod bucket;
pub mod bucket_policy;
pub mod object;

use xpa_runtime::ExternalError;

use crate::clients::ApiResult;

/// Result of a getter with the listed not-found codes mapped to `None`.
pub(crate) fn observed_or_absent<T>(
    res: ApiResult<T>,
    not_found: &[&str],
    reason: &'static str,
) -> Result<Option<T>, ExternalError> {
    match res {
        Ok(v) => Ok(Some(v)),
        Err(e) if e.is_any(not_found) => Ok(None),
        Err(e) => Err(ExternalError::api(reason, e)),
    }
}

/// Compare two JSON policy documents by meaning rather than by text.
pub(crate) fn policies_equal(
    desired: &str,
    observed: &str,
) -> Result<bool, ExternalError> {
    let want: serde_json::Value = serde_json::from_str(desired)
        .map_err(|e| ExternalError::Invalid(format!("policy is not valid JSON: {e}")))?;
    // An unparsable observed document can never match.
    Ok(serde_json::from_str::<serde_json::Value>(observed).is_ok_and(|got| got == want))
}
