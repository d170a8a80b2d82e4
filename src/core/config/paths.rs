use std::env;
use std::fs;
use std::path::{Path, PathBuf};

const APP_DIR_NAME: &str = "research-rag";

/// Filesystem locations used by the application.
#[derive(Debug, Clone)]
pub struct AppPaths {
    /// Directory holding the shipped `config.yml`.
    pub project_root: PathBuf,
    /// Per-user overrides, secrets and logs.
    pub user_data_dir: PathBuf,
    pub log_dir: PathBuf,
    pub secrets_path: PathBuf,
}

impl AppPaths {
    pub fn new() -> Self {
        let project_root = discover_project_root();
        let user_data_dir = discover_user_data_dir(&project_root);
        Self::with_dirs(project_root, user_data_dir)
    }

    /// Build paths rooted at explicit directories (tests, embedding hosts).
    pub fn with_dirs(project_root: PathBuf, user_data_dir: PathBuf) -> Self {
        let log_dir = user_data_dir.join("logs");
        let secrets_path = user_data_dir.join("secrets.yaml");

        if let Err(err) = fs::create_dir_all(&log_dir) {
            // logging is not up yet
            eprintln!("Cannot create log directory {}: {}", log_dir.display(), err);
        }

        AppPaths {
            project_root,
            user_data_dir,
            log_dir,
            secrets_path,
        }
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}

fn env_path(key: &str) -> Option<PathBuf> {
    env::var_os(key)
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
}

/// `RESEARCH_ROOT`, else the first of cwd / crate dir that has a
/// `config.yml`, else cwd.
fn discover_project_root() -> PathBuf {
    if let Some(root) = env_path("RESEARCH_ROOT") {
        return root;
    }

    let cwd = env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let manifest_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    [cwd.clone(), manifest_dir]
        .into_iter()
        .find(|dir| dir.join("config.yml").exists())
        .unwrap_or(cwd)
}

fn discover_user_data_dir(project_root: &Path) -> PathBuf {
    if let Some(dir) = env_path("RESEARCH_DATA_DIR") {
        return dir;
    }
    // debug builds keep user data next to the checkout
    if cfg!(debug_assertions) {
        return project_root.to_path_buf();
    }
    platform_data_dir().join(APP_DIR_NAME)
}

fn platform_data_dir() -> PathBuf {
    let home = env_path("HOME")
        .or_else(|| env_path("USERPROFILE"))
        .unwrap_or_else(|| PathBuf::from("."));

    if cfg!(target_os = "windows") {
        env_path("LOCALAPPDATA").unwrap_or(home)
    } else if cfg!(target_os = "macos") {
        home.join("Library").join("Application Support")
    } else {
        env_path("XDG_DATA_HOME").unwrap_or_else(|| home.join(".local").join("share"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_dirs_create_log_directory() {
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("data");
        let paths = AppPaths::with_dirs(dir.path().to_path_buf(), data.clone());

        assert!(paths.log_dir.is_dir());
        assert_eq!(paths.log_dir, data.join("logs"));
        assert_eq!(paths.secrets_path, data.join("secrets.yaml"));
        assert_eq!(paths.project_root, dir.path());
    }
}
