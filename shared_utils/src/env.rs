//! Environment-variable access with structured errors.
//!
//! Configuration layers read optional overrides from the process environment.
//! These helpers keep the distinction between "not set" (fall back to the file
//! or default value) and "set but unusable" (a hard error) explicit.

use std::{fmt::Display, str::FromStr};

use thiserror::Error;

/// Errors raised while reading environment variables.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EnvVarError {
    /// The variable is set but its value could not be parsed.
    #[error("Invalid value {value:?} for environment variable {name}: {reason}")]
    Invalid {
        /// Variable name.
        name: String,
        /// Raw value as found in the environment.
        value: String,
        /// Parser error message.
        reason: String,
    },
}

/// Reads an optional environment variable. Empty values count as unset.
pub fn get_env_opt(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Reads and parses an optional environment variable.
///
/// Returns `Ok(None)` when the variable is unset, and
/// [`EnvVarError::Invalid`] when it is set to something `T` cannot parse.
pub fn parse_env_opt<T>(name: &str) -> Result<Option<T>, EnvVarError>
where
    T: FromStr,
    T::Err: Display,
{
    match get_env_opt(name) {
        None => Ok(None),
        Some(raw) => raw.parse::<T>().map(Some).map_err(|e| EnvVarError::Invalid {
            name: name.to_string(),
            value: raw,
            reason: e.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_and_blank_variables_are_none() {
        assert_eq!(get_env_opt("SHARED_UTILS_TEST_SURELY_UNSET"), None);
        // SAFETY: the variable name is unique to this test.
        unsafe { std::env::set_var("SHARED_UTILS_TEST_BLANK", "  ") };
        assert_eq!(get_env_opt("SHARED_UTILS_TEST_BLANK"), None);
        assert_eq!(
            parse_env_opt::<u64>("SHARED_UTILS_TEST_SURELY_UNSET").unwrap(),
            None
        );
    }

    #[test]
    fn parse_reports_bad_values() {
        // SAFETY: the variable name is unique to this test.
        unsafe { std::env::set_var("SHARED_UTILS_TEST_BAD_NUMBER", "twelve") };
        let err = parse_env_opt::<u64>("SHARED_UTILS_TEST_BAD_NUMBER").unwrap_err();
        let EnvVarError::Invalid { name, value, .. } = err;
        assert_eq!(name, "SHARED_UTILS_TEST_BAD_NUMBER");
        assert_eq!(value, "twelve");

        unsafe { std::env::set_var("SHARED_UTILS_TEST_GOOD_NUMBER", " 42 ") };
        assert_eq!(
            parse_env_opt::<u64>("SHARED_UTILS_TEST_GOOD_NUMBER").unwrap(),
            Some(42)
        );
    }
}
