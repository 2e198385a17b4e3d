// Copyright (c) 2023 Mike Tsao. All rights reserved.

use app_dirs2::{AppDataType, AppInfo};
use std::{env::current_dir, path::PathBuf};

const APP_INFO: AppInfo = AppInfo {
    name: "Fillin",
    author: "Mike Tsao <mike@sowbug.com>",
};

/// Where to look for settings.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PathType {
    /// The current working directory is root.
    Dev,

    /// The OS-specific per-user config directory is root.
    User,
}

/// Paths contains path-building utilities.
pub struct Paths {}
impl Paths {
    /// The name of the settings file, wherever it lives.
    pub const CONFIG_FILE: &'static str = "fillin.json5";

    fn cwd() -> PathBuf {
        current_dir().unwrap_or_default()
    }

    /// Returns the directory that holds the settings file for the given type.
    pub fn config_root(path_type: PathType) -> PathBuf {
        match path_type {
            PathType::Dev => Self::cwd(),
            // See https://docs.rs/app_dirs2/latest/app_dirs2/ for
            // platform-specific example paths
            PathType::User => app_dirs2::get_app_root(AppDataType::UserConfig, &APP_INFO)
                .unwrap_or_else(|_| Self::cwd()),
        }
    }

    /// Returns the path of the settings file for the given type. The file
    /// may not exist.
    pub fn config(path_type: PathType) -> PathBuf {
        let mut path = Self::config_root(path_type);
        path.push(Self::CONFIG_FILE);
        path
    }

    /// Returns the first existing settings file, checking the working
    /// directory before the per-user directory.
    pub fn find_config() -> Option<PathBuf> {
        [PathType::Dev, PathType::User]
            .into_iter()
            .map(Self::config)
            .find(|path| path.is_file())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_paths_end_with_the_file_name() {
        for path_type in [PathType::Dev, PathType::User] {
            let path = Paths::config(path_type);
            assert_eq!(
                path.file_name().and_then(|name| name.to_str()),
                Some(Paths::CONFIG_FILE)
            );
        }
    }

    #[test]
    fn dev_config_lives_in_working_directory() {
        assert_eq!(
            Paths::config_root(PathType::Dev),
            current_dir().unwrap_or_default()
        );
    }
}
