use directories::ProjectDirs;
use std::path::PathBuf;

/// Centralized application directory resolution
pub struct AppDirs;

impl AppDirs {
    pub fn state_dir() -> Option<PathBuf> {
        if let Ok(home) = std::env::var("HOME") {
            Some(
                PathBuf::from(home)
                    .join(".local")
                    .join("state")
                    .join("typecast"),
            )
        } else {
            ProjectDirs::from("", "", "typecast").map(|pd| pd.data_local_dir().to_path_buf())
        }
    }

    /// Key-value database holding saves and backstage passes.
    pub fn db_path() -> Option<PathBuf> {
        Self::state_dir().map(|dir| dir.join("typecast.db"))
    }

    pub fn log_path() -> Option<PathBuf> {
        Self::state_dir().map(|dir| dir.join("typecast.log"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn files_live_in_state_dir() {
        let Some(dir) = AppDirs::state_dir() else {
            return;
        };
        assert_eq!(AppDirs::db_path().unwrap(), dir.join("typecast.db"));
        assert_eq!(AppDirs::log_path().unwrap(), dir.join("typecast.log"));
    }
}
