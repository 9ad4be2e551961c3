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

#![allow(dead_code)]

use fuse_sys::MountHandle;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tagfs::common::settings::Settings;
use tagfs::registry::TagRegistry;
use tagfs::TagFilesystem;

pub mod td;

/// A mounted `tagfs` instance over a fresh backing directory. Unmounts (via `MountHandle`'s own
/// `Drop`) when this value is dropped, the same shape as the teacher's `TestHelper` /
/// `tests/common/td.rs::TempDir` pairing, trimmed down to the one thing this spec's tests need: a
/// live mount with no sqlite database, no notification socket, no project-directories registry.
pub struct TestMount {
    backing: td::TempDir,
    mountpoint: td::TempDir,
    handle: Option<Arc<Mutex<MountHandle>>>,
}

impl TestMount {
    pub fn new() -> Self {
        let backing = td::TempDir::new();
        let mountpoint = td::TempDir::new();

        let settings = Arc::new(Settings::new(backing.path()).unwrap());
        let registry = Arc::new(
            TagRegistry::load(settings.root(), settings.registry_xattr_name()).unwrap(),
        );
        let ops = TagFilesystem::new(settings.clone(), registry);

        let fuse_conf = tagfs::fuse::util::make_fuse_config();
        let mount_conf = tagfs::fuse::util::make_mount_config(settings.root());

        let handle = fuse_sys::mount(&mountpoint.path(), ops, true, fuse_conf, mount_conf)
            .expect("mount failed");

        Self {
            backing,
            mountpoint,
            handle: Some(handle),
        }
    }

    /// The synthetic namespace root, as seen through the FUSE mount.
    pub fn root(&self) -> PathBuf {
        self.mountpoint.path()
    }

    pub fn path(&self, rel: &str) -> PathBuf {
        self.root().join(rel)
    }

    /// The real, flat backing directory every synthetic path ultimately resolves into.
    pub fn backing_root(&self) -> PathBuf {
        self.backing.path()
    }
}

impl Drop for TestMount {
    fn drop(&mut self) {
        // Unmount before the backing/mountpoint temp directories are removed by their own Drop
        // impls (fields drop in declaration order, and those come before `handle`). Dropping the
        // only remaining Arc<Mutex<MountHandle>> runs MountHandle::drop, which unmounts and joins
        // the fuse_loop thread.
        self.handle.take();
    }
}

pub fn ls(dir: &Path) -> HashSet<String> {
    fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect()
}

pub fn names(items: &[&str]) -> HashSet<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}
