use directories::ProjectDirs;
use std::path::PathBuf;

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("org", "deckard", "deckard")
}

pub fn data_root() -> PathBuf {
    if let Some(pd) = project_dirs() {
        pd.data_dir().to_path_buf()
    } else {
        // Fallback: current dir
        std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
    }
}

/// Where decks live unless configured otherwise.
pub fn default_deck_root() -> PathBuf {
    data_root().join("decks")
}

pub fn default_log_file() -> PathBuf {
    data_root().join("deckard.log")
}

pub fn config_file() -> Option<PathBuf> {
    project_dirs().map(|pd| pd.config_dir().join("config.toml"))
}
