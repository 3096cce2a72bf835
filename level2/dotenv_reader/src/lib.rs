use std::path::{Path, PathBuf};

use tracing::{debug, info};

/// the file looked for when no explicit path is given.
pub const DEFAULT_DOTENV_FILE: &str = ".env";

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Failed to load .env file {path:?}")]
    Load { path: PathBuf, #[source] source: dotenvy::Error },
}

fn load_file(path: &Path) -> Result<PathBuf, Error> {
    dotenvy::from_path(path).map_err(|source| Error::Load { path: path.to_path_buf(), source })?;
    info!(path = %path.display(), "loaded .env file");
    Ok(path.to_path_buf())
}

/// loads a .env file into the process environment.
/// variables that are already set in the environment always win over the file.
///
/// with an explicit path the file must exist. Without one, `.env` in the
/// current directory is used when present. Parent directories are not searched.
/// Returns the path of the file that was loaded, if any.
pub fn load_dotenv(dotenv_path: Option<&Path>) -> Result<Option<PathBuf>, Error> {
    match dotenv_path {
        Some(path) => load_file(path).map(Some),
        None => load_dotenv_from_dir(Path::new(".")),
    }
}

/// loads `<dir>/.env` if it exists.
pub fn load_dotenv_from_dir(dir: &Path) -> Result<Option<PathBuf>, Error> {
    let path = dir.join(DEFAULT_DOTENV_FILE);
    if !path.is_file() {
        debug!(dir = %dir.display(), "no .env file found");
        return Ok(None);
    }
    load_file(&path).map(Some)
}

/// reads a variable, treating unset and empty the same way.
pub fn non_empty_var(key: &str) -> Option<String> {
    match std::env::var(key) {
        Ok(val) if !val.trim().is_empty() => Some(val),
        _ => None,
    }
}
