//! Filesystem layout: where the config, corpus database, and logs live.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Resolved locations for everything the service reads or writes on disk.
#[derive(Debug, Clone)]
pub struct AppPaths {
    pub project_root: PathBuf,
    pub user_data_dir: PathBuf,
    pub log_dir: PathBuf,
    pub db_path: PathBuf,
}

impl AppPaths {
    pub fn new() -> Self {
        let project_root = locate_project_root();
        let user_data_dir = resolve_data_dir(&project_root);
        let log_dir = user_data_dir.join("logs");
        let db_path = user_data_dir.join("corpus.db");

        // log_dir is nested under user_data_dir, so one call creates both.
        let _ = fs::create_dir_all(&log_dir);

        AppPaths {
            project_root,
            user_data_dir,
            log_dir,
            db_path,
        }
    }

    /// The YAML settings file, overridable with `RESEARCH_CONFIG_PATH`.
    pub fn config_path(&self) -> PathBuf {
        match env::var_os("RESEARCH_CONFIG_PATH") {
            Some(path) => PathBuf::from(path),
            None => self.project_root.join("config.yml"),
        }
    }
}

/// `RESEARCH_ROOT` wins, then whichever of the current directory and the
/// crate manifest directory carries a `config.yml`.
fn locate_project_root() -> PathBuf {
    if let Some(root) = env::var_os("RESEARCH_ROOT") {
        return PathBuf::from(root);
    }

    let cwd = env::current_dir().ok();
    let candidates = [cwd.clone(), Some(PathBuf::from(env!("CARGO_MANIFEST_DIR")))];
    for dir in candidates.into_iter().flatten() {
        if dir.join("config.yml").exists() {
            return dir;
        }
    }

    cwd.unwrap_or_else(|| PathBuf::from(env!("CARGO_MANIFEST_DIR")))
}

fn resolve_data_dir(project_root: &Path) -> PathBuf {
    if let Some(dir) = env::var_os("RESEARCH_DATA_DIR") {
        return PathBuf::from(dir);
    }

    // Debug builds keep their data next to the sources.
    if cfg!(debug_assertions) {
        return project_root.to_path_buf();
    }

    match env::consts::OS {
        "windows" => env::var_os("LOCALAPPDATA")
            .or_else(|| env::var_os("USERPROFILE"))
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("ResearchAssistant"),
        "macos" => home_dir()
            .join("Library")
            .join("Application Support")
            .join("ResearchAssistant"),
        _ => env::var_os("XDG_DATA_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| home_dir().join(".local/share"))
            .join("research-assistant"),
    }
}

fn home_dir() -> PathBuf {
    env::var_os("HOME")
        .or_else(|| env::var_os("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
}
