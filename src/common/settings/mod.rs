/*
 * Supertag
 * Copyright (C) 2020 Andrew Moffat
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU Affero General Public License for more details.
 *
 * You should have received a copy of the GNU Affero General Public License
 * along with this program.  If not, see <http://www.gnu.org/licenses/>.
 */

use super::constants;
use super::err::{TagfsError, TagfsResult};
use log::LevelFilter;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub mod config;

/// `Settings` combines the loaded `Config` with the one piece of runtime state this process
/// actually has: the backing root it was told to mount. The teacher's `Settings` also carried a
/// `Dirs` trait for platform project directories and a `collection` for its multi-mount registry;
/// neither applies here, since a `tagfs` process serves exactly one mount rooted at a CLI
/// argument.
pub struct Settings {
    config: config::Config,
    root: PathBuf,
}

impl Settings {
    pub fn new(root: impl AsRef<Path>) -> TagfsResult<Self> {
        let config = config::build().map_err(|e| TagfsError::Other(Box::new(e)))?;
        Ok(Self {
            config,
            root: root.as_ref().to_path_buf(),
        })
    }

    pub fn get_config(&self) -> &config::Config {
        &self.config
    }

    /// The backing root this process mounts over.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory (under the backing root) where the rotating logger writes its files.
    pub fn log_dir(&self) -> PathBuf {
        self.root.join(constants::LOG_DIR_NAME)
    }

    pub fn log_level(&self) -> LevelFilter {
        LevelFilter::from_str(&self.config.log_level).unwrap_or(LevelFilter::Warn)
    }

    pub fn registry_xattr_name(&self) -> &'static str {
        constants::REGISTRY_XATTR
    }

    pub fn file_tags_xattr_name(&self) -> &'static str {
        constants::FILE_TAGS_XATTR
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_resolve_root_and_log_dir() {
        let settings = Settings::new("/tmp/some-root").unwrap();
        assert_eq!(settings.root(), Path::new("/tmp/some-root"));
        assert_eq!(
            settings.log_dir(),
            Path::new("/tmp/some-root/.tagfs/log")
        );
    }

    #[test]
    fn default_log_level_is_warn() {
        let settings = Settings::new("/tmp/some-root").unwrap();
        assert_eq!(settings.log_level(), LevelFilter::Warn);
    }
}
