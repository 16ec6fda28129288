//! Test assertion macros and helpers.

use crate::error::HelpdeskError;
use crate::result::ApiResult;

/// Assert that a result is Ok.
///
/// # Example
///
/// ```ignore
/// let result = policy::check_insert_client(&admin);
/// assert_ok!(result);
/// assert_ok!(result, "admins create clients");
/// ```
#[macro_export]
macro_rules! assert_ok {
    ($expr:expr) => {
        match &$expr {
            Ok(_) => (),
            Err(e) => panic!("assertion failed: expected Ok, got Err({:?})", e),
        }
    };
    ($expr:expr, $($arg:tt)+) => {
        match &$expr {
            Ok(_) => (),
            Err(e) => panic!("assertion failed: {}: expected Ok, got Err({:?})", format_args!($($arg)+), e),
        }
    };
}

/// Assert that a result is Err.
#[macro_export]
macro_rules! assert_err {
    ($expr:expr) => {
        match &$expr {
            Err(_) => (),
            Ok(v) => panic!("assertion failed: expected Err, got Ok({:?})", v),
        }
    };
    ($expr:expr, $($arg:tt)+) => {
        match &$expr {
            Err(_) => (),
            Ok(v) => panic!("assertion failed: {}: expected Err, got Ok({:?})", format_args!($($arg)+), v),
        }
    };
}

/// Assert that an error matches a specific variant.
///
/// # Example
///
/// ```ignore
/// let result = ctx.require_user_id();
/// assert_err_variant!(result, HelpdeskError::Unauthorized(_));
/// ```
#[macro_export]
macro_rules! assert_err_variant {
    ($expr:expr, $variant:pat) => {
        match &$expr {
            Err($variant) => (),
            Err(e) => panic!(
                "assertion failed: expected {}, got {:?}",
                stringify!($variant),
                e
            ),
            Ok(v) => panic!(
                "assertion failed: expected Err({}), got Ok({:?})",
                stringify!($variant),
                v
            ),
        }
    };
}

/// Assert that an `ApiResult` succeeded, yielding its data.
#[macro_export]
macro_rules! assert_api_ok {
    ($expr:expr) => {{
        let result = $expr;
        if let Some(err) = &result.error {
            panic!("assertion failed: expected success, got error {:?}", err);
        }
        result.data
    }};
}

/// Assert that an `ApiResult` failed with the given code.
///
/// # Example
///
/// ```ignore
/// assert_api_err!(service.get_ticket_by_id(&auth, id).await, "NOT_FOUND");
/// ```
#[macro_export]
macro_rules! assert_api_err {
    ($expr:expr) => {{
        let result = $expr;
        match result.error {
            Some(err) => {
                assert!(result.data.is_none(), "assertion failed: error result carried data");
                err
            }
            None => panic!("assertion failed: expected error, got success"),
        }
    }};
    ($expr:expr, $code:expr) => {{
        let err = $crate::assert_api_err!($expr);
        assert_eq!(err.code, $code, "unexpected error code (message: {})", err.message);
        err
    }};
}

/// Check if an error message contains a substring.
pub fn error_contains(error: &HelpdeskError, substring: &str) -> bool {
    error.to_string().contains(substring)
}

/// Check if a validation error names a specific field.
pub fn validation_error_for_field(error: &HelpdeskError, field: &str) -> bool {
    match error {
        HelpdeskError::Validation(msg) => msg.contains(field),
        _ => false,
    }
}

/// Check if an API result failed with a message containing `substring`.
pub fn api_error_contains<T>(result: &ApiResult<T>, substring: &str) -> bool {
    result
        .error_message()
        .map(|msg| msg.contains(substring))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::ApiError;

    #[test]
    fn test_assert_ok_macro() {
        let result: Result<i32, String> = Ok(42);
        assert_ok!(result);
    }

    #[test]
    #[should_panic(expected = "expected Ok")]
    fn test_assert_ok_macro_fails() {
        let result: Result<i32, String> = Err("error".to_string());
        assert_ok!(result);
    }

    #[test]
    fn test_assert_err_macro() {
        let result: Result<i32, String> = Err("error".to_string());
        assert_err!(result);
    }

    #[test]
    fn test_assert_err_variant_macro() {
        let result: crate::Result<()> = Err(HelpdeskError::NotFound("ticket".into()));
        assert_err_variant!(result, HelpdeskError::NotFound(_));
    }

    #[test]
    fn test_assert_api_macros() {
        let data = assert_api_ok!(ApiResult::success(7));
        assert_eq!(data, Some(7));

        let err = assert_api_err!(ApiResult::<i32>::failure(ApiError::forbidden("no")), "FORBIDDEN");
        assert_eq!(err.message, "no");
    }

    #[test]
    #[should_panic(expected = "expected error")]
    fn test_assert_api_err_fails_on_success() {
        assert_api_err!(ApiResult::success(1));
    }

    #[test]
    fn test_error_helpers() {
        let error = HelpdeskError::Validation("title is required".to_string());
        assert!(error_contains(&error, "title"));
        assert!(validation_error_for_field(&error, "title"));
        assert!(!validation_error_for_field(&HelpdeskError::Internal("title".into()), "title"));

        let failed: ApiResult<()> = ApiResult::failure(ApiError::validation("email is required"));
        assert!(api_error_contains(&failed, "email"));
        assert!(!api_error_contains(&ApiResult::success(()), "email"));
    }
}
