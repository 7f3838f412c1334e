use crate::error::{Error, Result};
use std::env;
use std::path::PathBuf;

/// Base liftoff config directory (~/.config/liftoff/ on all platforms)
pub fn liftoff() -> Result<PathBuf> {
    #[cfg(windows)]
    {
        let appdata = env::var("APPDATA").map_err(|_| {
            Error::internal_unexpected(
                "APPDATA environment variable not set on Windows".to_string(),
            )
        })?;
        Ok(PathBuf::from(appdata).join("liftoff"))
    }

    #[cfg(not(windows))]
    {
        let home = env::var("HOME").map_err(|_| {
            Error::internal_unexpected(
                "HOME environment variable not set on Unix-like system".to_string(),
            )
        })?;
        Ok(PathBuf::from(home).join(".config").join("liftoff"))
    }
}

/// Environments directory
pub fn environments() -> Result<PathBuf> {
    Ok(liftoff()?.join("environments"))
}

/// Environment profile file path
pub fn environment(name: &str) -> Result<PathBuf> {
    Ok(environments()?.join(format!("{}.json", name)))
}
