// src/infra/paths.rs — Path management
//
// All paths respect the ROUNDTABLE_HOME environment variable for isolation.
// When unset, config uses ~/.roundtable/ and data uses the platform data dir.

use directories::ProjectDirs;
use std::path::PathBuf;
use std::sync::OnceLock;

static PROJECT_DIRS: OnceLock<ProjectDirs> = OnceLock::new();

fn project_dirs() -> &'static ProjectDirs {
    PROJECT_DIRS.get_or_init(|| {
        ProjectDirs::from("", "", "roundtable").expect("Could not determine home directory")
    })
}

fn roundtable_home() -> Option<PathBuf> {
    std::env::var_os("ROUNDTABLE_HOME").map(PathBuf::from)
}

/// Configuration directory: $ROUNDTABLE_HOME/ or ~/.roundtable/
pub fn config_dir() -> PathBuf {
    if let Some(home) = roundtable_home() {
        return home;
    }
    dirs::home_dir()
        .expect("Could not determine home directory")
        .join(".roundtable")
}

/// Data directory: $ROUNDTABLE_HOME/data/ or the platform-local data dir.
pub fn data_dir() -> PathBuf {
    if let Some(home) = roundtable_home() {
        return home.join("data");
    }
    project_dirs().data_local_dir().to_path_buf()
}

/// Default config file path.
pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

/// SQLite database path.
pub fn db_path() -> PathBuf {
    data_dir().join("roundtable.db")
}
