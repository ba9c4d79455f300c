//! Result type alias for Harbor

use super::errors::HarborError;

/// Result type alias for Harbor operations
///
/// # Examples
///
/// ```
/// use harbor::domain::result::Result;
/// use harbor::domain::errors::HarborError;
///
/// fn example_function() -> Result<String> {
///     Ok("success".to_string())
/// }
///
/// fn failing_function() -> Result<()> {
///     Err(HarborError::State("record is in flight".to_string()))
/// }
/// ```
pub type Result<T> = std::result::Result<T, HarborError>;
