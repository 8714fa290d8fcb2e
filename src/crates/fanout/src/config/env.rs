//! Environment variable loading
//!
//! Unset variables are `Ok(None)`; set but unusable values are errors that
//! name the variable.

use crate::{FanoutError, Result};
use std::env;
use std::fmt::Display;
use std::str::FromStr;

fn env_error(key: &str, message: impl Into<String>) -> FanoutError {
    FanoutError::Env {
        key: key.to_string(),
        message: message.into(),
    }
}

/// Load an environment variable as a string
pub fn get_env(key: &str) -> Result<Option<String>> {
    match env::var(key) {
        Ok(val) => Ok(Some(val)),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(env::VarError::NotUnicode(_)) => Err(env_error(key, "contains invalid UTF-8")),
    }
}

/// Load and parse an environment variable
///
/// ```rust,ignore
/// let workers: Option<usize> = get_env_parse("FANOUT_MAX_WORKERS")?;
/// ```
pub fn get_env_parse<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: Display,
{
    match get_env(key)? {
        Some(val) => val
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| env_error(key, format!("failed to parse {:?}: {}", val, e))),
        None => Ok(None),
    }
}

pub fn get_env_or(key: &str, default: impl Into<String>) -> Result<String> {
    Ok(get_env(key)?.unwrap_or_else(|| default.into()))
}

pub fn get_env_parse_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    Ok(get_env_parse(key)?.unwrap_or(default))
}

/// Load a boolean environment variable
///
/// Accepts true/1/yes/on and false/0/no/off, case-insensitive.
pub fn get_env_bool(key: &str) -> Result<Option<bool>> {
    match get_env(key)? {
        Some(val) => match val.trim().to_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(Some(true)),
            "false" | "0" | "no" | "off" => Ok(Some(false)),
            _ => Err(env_error(key, format!("invalid boolean value {:?}", val))),
        },
        None => Ok(None),
    }
}

/// Load a comma separated list, parsing each non-empty item
pub fn get_env_list<T>(key: &str) -> Result<Option<Vec<T>>>
where
    T: FromStr,
    T::Err: Display,
{
    match get_env(key)? {
        Some(val) => val
            .split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(|item| {
                item.parse::<T>()
                    .map_err(|e| env_error(key, format!("invalid item {:?}: {}", item, e)))
            })
            .collect::<Result<Vec<_>>>()
            .map(Some),
        None => Ok(None),
    }
}

/// `build_env_key("FANOUT_", "max_workers")` is `FANOUT_MAX_WORKERS`
pub fn build_env_key(prefix: &str, name: &str) -> String {
    format!("{}{}", prefix, name.to_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    // Each test uses its own variable names; the process environment is shared.

    #[test]
    fn test_get_env_missing() {
        assert_eq!(get_env("FANOUT_TEST_ENV_MISSING").unwrap(), None);
        assert_eq!(get_env_or("FANOUT_TEST_ENV_MISSING", "x").unwrap(), "x");
        assert_eq!(get_env_parse_or("FANOUT_TEST_ENV_MISSING", 7_u32).unwrap(), 7);
    }

    #[test]
    fn test_get_env_parse() {
        env::set_var("FANOUT_TEST_ENV_PARSE", " 42 ");
        assert_eq!(get_env_parse::<usize>("FANOUT_TEST_ENV_PARSE").unwrap(), Some(42));

        env::set_var("FANOUT_TEST_ENV_PARSE_BAD", "many");
        let err = get_env_parse::<usize>("FANOUT_TEST_ENV_PARSE_BAD").unwrap_err();
        assert!(matches!(err, FanoutError::Env { ref key, .. } if key == "FANOUT_TEST_ENV_PARSE_BAD"));
    }

    #[test]
    fn test_get_env_bool() {
        env::set_var("FANOUT_TEST_ENV_BOOL_ON", "Yes");
        env::set_var("FANOUT_TEST_ENV_BOOL_OFF", "0");
        env::set_var("FANOUT_TEST_ENV_BOOL_BAD", "maybe");

        assert_eq!(get_env_bool("FANOUT_TEST_ENV_BOOL_ON").unwrap(), Some(true));
        assert_eq!(get_env_bool("FANOUT_TEST_ENV_BOOL_OFF").unwrap(), Some(false));
        assert!(get_env_bool("FANOUT_TEST_ENV_BOOL_BAD").is_err());
    }

    #[test]
    fn test_get_env_list() {
        env::set_var("FANOUT_TEST_ENV_LIST", "1, 2,,3");
        assert_eq!(get_env_list::<u8>("FANOUT_TEST_ENV_LIST").unwrap(), Some(vec![1, 2, 3]));

        env::set_var("FANOUT_TEST_ENV_LIST_BAD", "1,x");
        assert!(get_env_list::<u8>("FANOUT_TEST_ENV_LIST_BAD").is_err());
    }

    #[test]
    fn test_build_env_key() {
        assert_eq!(build_env_key("FANOUT_", "max_workers"), "FANOUT_MAX_WORKERS");
    }
}
