//! Resolution of the dataset cache root.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use hsi_core::{Error, Result};
use tracing::debug;

/// Environment variable that overrides the default cache root.
pub const DATA_HOME_ENV: &str = "SCIKIT_LEARN_DATA";

const DEFAULT_DIR_NAME: &str = "scikit_learn_data";

/// Resolve and create the cache root.
///
/// Order: `explicit`, then `$SCIKIT_LEARN_DATA`, then `~/scikit_learn_data`.
pub fn resolve_data_home(explicit: Option<&Path>) -> Result<PathBuf> {
    let path = choose_data_home(
        explicit,
        std::env::var_os(DATA_HOME_ENV),
        dirs::home_dir(),
    )?;
    fs::create_dir_all(&path)?;
    debug!("Data home: {}", path.display());
    Ok(path)
}

fn choose_data_home(
    explicit: Option<&Path>,
    env_value: Option<OsString>,
    home: Option<PathBuf>,
) -> Result<PathBuf> {
    let raw = match (explicit, env_value) {
        (Some(path), _) => path.to_path_buf(),
        (None, Some(value)) if !value.is_empty() => PathBuf::from(value),
        _ => PathBuf::from("~").join(DEFAULT_DIR_NAME),
    };
    expand_tilde(&raw, home.as_deref())
}

/// Replace a leading `~` component with the home directory.
fn expand_tilde(path: &Path, home: Option<&Path>) -> Result<PathBuf> {
    match path.strip_prefix("~") {
        Ok(rest) => {
            let home = home.ok_or_else(|| {
                Error::Config(format!(
                    "cannot expand {}: home directory unknown",
                    path.display()
                ))
            })?;
            Ok(home.join(rest))
        }
        Err(_) => Ok(path.to_path_buf()),
    }
}
