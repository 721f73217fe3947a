use std::ffi::{OsStr, OsString};
use std::fmt::Display;
use std::path::Path;
use std::str::FromStr;

pub use anyhow::{anyhow, bail, Context, Result};
pub use std::result::Result as StdResult;

/// Read an environment override, falling back to `default` when the variable
/// is unset or empty (the `${VAR:-default}` convention).
pub fn env_override<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    match std::env::var(name) {
        Err(std::env::VarError::NotPresent) => Ok(default),
        Err(std::env::VarError::NotUnicode(_)) => {
            bail!("environment variable {} is not valid unicode", name)
        }
        Ok(s) if s.is_empty() => Ok(default),
        Ok(s) => s
            .parse()
            .map_err(|e| anyhow!("invalid value for {} ({:?}): {}", name, s, e)),
    }
}

/// Split a raw argument string into tokens the way unquoted shell expansion
/// would.  Quoting is not interpreted.
pub fn split_extra_args(s: &str) -> Vec<String> {
    s.split_whitespace().map(String::from).collect()
}

/// Prepend `dir` to a colon-separated search path, keeping any existing
/// entries behind it.
pub fn prepend_search_path(dir: &Path, existing: Option<&OsStr>) -> OsString {
    let mut path = OsString::from(dir);
    match existing {
        None => {}
        Some(rest) if rest.is_empty() => {}
        Some(rest) => {
            path.push(":");
            path.push(rest);
        }
    }
    path
}

mod launch;
pub use launch::*;
