//! Configuration loading and root folder resolution

use crate::{Error, Result};
use std::path::{Path, PathBuf};

/// Environment variable consulted when no command-line root folder is given
pub const ROOT_FOLDER_ENV: &str = "PVMAP_ROOT";

/// Database file name inside the root folder
const DATABASE_FILE: &str = "pvmap.db";

/// Root folder resolution priority order:
/// 1. Command-line argument (highest priority)
/// 2. `PVMAP_ROOT` environment variable
/// 3. TOML config file (`root_folder` key)
/// 4. OS-dependent compiled default (fallback)
pub fn resolve_root_folder(cli_arg: Option<&str>) -> PathBuf {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return PathBuf::from(path);
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
        if !path.is_empty() {
            return PathBuf::from(path);
        }
    }

    // Priority 3: TOML config file
    if let Ok(config_path) = find_config_file() {
        if let Ok(toml_content) = std::fs::read_to_string(&config_path) {
            if let Ok(config) = toml::from_str::<toml::Value>(&toml_content) {
                if let Some(root_folder) = config.get("root_folder").and_then(|v| v.as_str()) {
                    return PathBuf::from(root_folder);
                }
            }
        }
    }

    // Priority 4: OS-dependent compiled default
    default_root_folder()
}

/// Path of the shared SQLite store inside the root folder
pub fn database_path(root_folder: &Path) -> PathBuf {
    root_folder.join(DATABASE_FILE)
}

/// Create the root folder if it does not exist yet
pub fn ensure_root_folder(root_folder: &Path) -> Result<()> {
    std::fs::create_dir_all(root_folder)?;
    Ok(())
}

/// Locate the configuration file for the platform
fn find_config_file() -> Result<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("pvmap").join("config.toml"));

    if let Some(path) = user_config {
        if path.exists() {
            return Ok(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/pvmap/config.toml");
        if system_config.exists() {
            return Ok(system_config);
        }
    }

    Err(Error::Config("No config file found".to_string()))
}

/// OS-dependent default root folder path
fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("pvmap"))
        .unwrap_or_else(|| PathBuf::from("./pvmap_data"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn cli_argument_takes_priority() {
        std::env::set_var(ROOT_FOLDER_ENV, "/tmp/pvmap-env");
        let root = resolve_root_folder(Some("/tmp/pvmap-cli"));
        std::env::remove_var(ROOT_FOLDER_ENV);
        assert_eq!(root, PathBuf::from("/tmp/pvmap-cli"));
    }

    #[test]
    #[serial]
    fn environment_variable_used_without_cli_argument() {
        std::env::set_var(ROOT_FOLDER_ENV, "/tmp/pvmap-env");
        let root = resolve_root_folder(None);
        std::env::remove_var(ROOT_FOLDER_ENV);
        assert_eq!(root, PathBuf::from("/tmp/pvmap-env"));
    }

    #[test]
    fn database_path_is_inside_root() {
        let path = database_path(Path::new("/data/pvmap"));
        assert_eq!(path, PathBuf::from("/data/pvmap/pvmap.db"));
    }
}
