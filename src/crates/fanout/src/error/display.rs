//! User-facing rendering of task errors

use super::ErrorCategory;
use crate::result::TaskError;
use regex::Regex;
use std::sync::OnceLock;

fn account_id_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"\b\d{8}(\d{4})\b").ok())
        .as_ref()
}

/// Mask 12-digit AWS account ids, keeping the last four digits
///
/// # Example
///
/// ```rust
/// use fanout::error::mask_account_ids;
///
/// assert_eq!(
///     mask_account_ids("arn:aws:iam::111122223333:role/Audit"),
///     "arn:aws:iam::********3333:role/Audit"
/// );
/// ```
pub fn mask_account_ids(input: &str) -> String {
    match account_id_pattern() {
        Some(re) => re.replace_all(input, "********$1").into_owned(),
        None => input.to_string(),
    }
}

/// Short explanation of a failure for terminal output
///
/// Well-known credential and permission failures get a hint; everything
/// else is shown as `code: message`. Account ids are masked.
pub fn format_error_for_user(error: &TaskError) -> String {
    let text = match error.error_code.as_str() {
        "ExpiredToken" | "ExpiredTokenException" => {
            "credentials have expired, sign in again and rerun".to_string()
        }
        "InvalidClientTokenId" => {
            "the access key is not recognized, check the configured credentials".to_string()
        }
        _ => match error.category {
            ErrorCategory::AccessDenied => format!(
                "permission denied ({}), the role lacks the IAM permission for this call",
                error.error_code
            ),
            ErrorCategory::Throttling => format!(
                "throttled by AWS ({}), rerun later or lower max_workers",
                error.error_code
            ),
            _ => format!("{}: {}", error.error_code, error.message),
        },
    };
    mask_account_ids(&text)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task_error(code: &str, category: ErrorCategory, message: &str) -> TaskError {
        TaskError::new("111122223333", "us-east-1", category, code, message)
    }

    #[test]
    fn test_mask_account_ids() {
        assert_eq!(mask_account_ids("account 111122223333 failed"), "account ********3333 failed");
        assert_eq!(mask_account_ids("no ids here"), "no ids here");
        // 13 digits is not an account id
        assert_eq!(mask_account_ids("1111222233334"), "1111222233334");
    }

    #[test]
    fn test_friendly_messages() {
        let err = task_error("ExpiredToken", ErrorCategory::ExpiredToken, "token expired");
        assert!(format_error_for_user(&err).contains("credentials have expired"));

        let err = task_error("InvalidClientTokenId", ErrorCategory::Unknown, "bad key");
        assert!(format_error_for_user(&err).contains("access key is not recognized"));

        let err = task_error("AccessDenied", ErrorCategory::AccessDenied, "nope");
        assert!(format_error_for_user(&err).starts_with("permission denied (AccessDenied)"));

        let err = task_error("SlowDown", ErrorCategory::Throttling, "slow down");
        assert!(format_error_for_user(&err).starts_with("throttled by AWS"));
    }

    #[test]
    fn test_fallback_message_is_masked() {
        let err = task_error(
            "ValidationException",
            ErrorCategory::InvalidRequest,
            "role arn:aws:iam::111122223333:role/x is invalid",
        );
        assert_eq!(
            format_error_for_user(&err),
            "ValidationException: role arn:aws:iam::********3333:role/x is invalid"
        );
    }
}
