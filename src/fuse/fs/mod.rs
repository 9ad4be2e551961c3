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

mod getattr;
mod readdir;
mod xattr;

use crate::common::constants;
use crate::common::err::{TagfsError, TagfsResult};
use crate::common::settings::Settings;
use crate::common::types::{PathClass, TagSet};
use crate::registry::TagDirStat;
use crate::registry::TagRegistry;
use crate::tagstore;
use fuse_sys::{
    fuse_file_info, mode_t, new_statvfs, off_t, stat, statvfs, uid_t, gid_t, FileEntry,
    Filesystem, FuseResult, Request,
};
use std::fs;
use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
use std::os::unix::io::{IntoRawFd, RawFd};
use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;
use std::sync::Arc;

/// The TagFS Operations Object (§2): the single value that answers every VFS callback, backed by
/// the Tag Registry and the backing root's configuration. Holds no other mutable state — the
/// Registry's own lock is the only thing that needs to serialize across calls, and the FUSE
/// dispatcher itself serializes calls to begin with (§5).
pub struct TagFilesystem {
    settings: Arc<Settings>,
    registry: Arc<TagRegistry>,
}

impl TagFilesystem {
    pub fn new(settings: Arc<Settings>, registry: Arc<TagRegistry>) -> Self {
        Self { settings, registry }
    }

    fn classify(&self, path: &Path) -> PathClass {
        PathClass::classify(path, |t| self.registry.contains(t))
    }

    /// Resolves a file branch's required tags against the tag universe (§7: a path whose
    /// required tags aren't all registered fails with "no such entry" regardless of whether a
    /// backing file with that base name happens to exist), then enforces §4.1's visibility rule
    /// against the file's actual on-disk tag set — the same check `getattr.rs` makes — so a
    /// backing file that merely shares a base name with the one addressed by this path (but
    /// carries a different, non-superset tag set) is treated as absent rather than silently
    /// operated on. Returns the backing path.
    fn resolve_file_path(&self, name: &str, required_tags: &TagSet) -> TagfsResult<PathBuf> {
        if !self.registry.contains_all(required_tags) {
            return Err(TagfsError::NoSuchEntry);
        }
        let backing = self.settings.root().join(name);
        let tags = tagstore::read_tags(&backing, self.settings.file_tags_xattr_name())
            .map_err(|_| TagfsError::NoSuchEntry)?;
        if !required_tags.is_subset(&tags) {
            return Err(TagfsError::NoSuchEntry);
        }
        Ok(backing)
    }

    fn any_file_tagged(&self, tag: &str) -> TagfsResult<bool> {
        for dirent in fs::read_dir(self.settings.root())? {
            let dirent = dirent?;
            if dirent.file_type()?.is_dir() {
                continue;
            }
            let tags = tagstore::read_tags(&dirent.path(), self.settings.file_tags_xattr_name())?;
            if tags.contains(tag) {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

impl Filesystem for TagFilesystem {
    fn init_request_id(&self) {
        crate::common::log::REQUEST_ID.with(|cell| {
            let id = crate::common::log::REQ_COUNTER.fetch_add(1, Ordering::SeqCst);
            *cell.borrow_mut() = id;
        });
    }

    fn getattr(&self, _req: &Request, path: &Path) -> FuseResult<stat> {
        Ok(getattr::getattr(self, path)?)
    }

    fn readdir(
        &self,
        _req: &Request,
        path: &Path,
    ) -> FuseResult<Box<dyn Iterator<Item = FileEntry>>> {
        Ok(readdir::readdir(self, path)?)
    }

    fn readlink(&self, _req: &Request, path: &Path) -> FuseResult<PathBuf> {
        match self.classify(path) {
            PathClass::File {
                name,
                required_tags,
            } => {
                let backing = self.resolve_file_path(&name, &required_tags)?;
                Ok(fs::read_link(&backing).map_err(TagfsError::from)?)
            }
            PathClass::TagDir { .. } | PathClass::Root => Err(TagfsError::NotSupported.into()),
        }
    }

    fn symlink(&self, _req: &Request, target: &Path, new: &Path) -> FuseResult<()> {
        let name = PathClass::name(new).ok_or(TagfsError::NoSuchEntry)?;
        let required_tags = PathClass::prefix_tags(new);
        if self.registry.contains(&name) {
            return Err(TagfsError::Exists.into());
        }
        if !self.registry.contains_all(&required_tags) {
            return Err(TagfsError::NoSuchEntry.into());
        }
        let backing = self.settings.root().join(&name);
        std::os::unix::fs::symlink(target, &backing).map_err(TagfsError::from)?;
        tagstore::write_tags(&backing, self.settings.file_tags_xattr_name(), &required_tags)?;
        Ok(())
    }

    fn create(&self, _req: &Request, path: &Path, mode: mode_t) -> FuseResult<RawFd> {
        let name = PathClass::name(path).ok_or(TagfsError::NoSuchEntry)?;
        let required_tags = PathClass::prefix_tags(path);
        if self.registry.contains(&name) {
            return Err(TagfsError::Exists.into());
        }
        if !self.registry.contains_all(&required_tags) {
            return Err(TagfsError::NoSuchEntry.into());
        }
        let backing = self.settings.root().join(&name);
        // create_new refuses to clobber a backing file that already exists under a different
        // tag set but isn't visible at this path — that file is a distinct File Entry, not this
        // one, and a plain create(true)+truncate(true) would silently destroy its contents.
        let file = fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .mode(mode)
            .open(&backing)
            .map_err(TagfsError::from)?;
        tagstore::write_tags(&backing, self.settings.file_tags_xattr_name(), &required_tags)?;
        Ok(file.into_raw_fd())
    }

    fn open(&self, _req: &Request, path: &Path, fi: *const fuse_file_info) -> FuseResult<RawFd> {
        match self.classify(path) {
            PathClass::File {
                name,
                required_tags,
            } => {
                let backing = self.resolve_file_path(&name, &required_tags)?;
                let flags = unsafe { (*fi).flags };
                let mut opts = fs::OpenOptions::new();
                let file = crate::fuse::util::open_opts_from_mode(&mut opts, flags)
                    .open(&backing)
                    .map_err(TagfsError::from)?;
                Ok(file.into_raw_fd())
            }
            PathClass::TagDir { .. } | PathClass::Root => {
                Err(TagfsError::PermissionDenied.into())
            }
        }
    }

    fn truncate(&self, _req: &Request, path: &Path, offset: off_t) -> FuseResult<()> {
        match self.classify(path) {
            PathClass::File {
                name,
                required_tags,
            } => {
                let backing = self.resolve_file_path(&name, &required_tags)?;
                crate::fuse::util::truncate(&backing, offset).map_err(TagfsError::from)?;
                Ok(())
            }
            PathClass::TagDir { .. } | PathClass::Root => Err(TagfsError::IsADirectory.into()),
        }
    }

    fn rmdir(&self, _req: &Request, path: &Path) -> FuseResult<()> {
        match self.classify(path) {
            PathClass::File {
                name,
                required_tags,
            } => {
                let backing = self.resolve_file_path(&name, &required_tags)?;
                fs::remove_dir(backing).map_err(TagfsError::from)?;
                Ok(())
            }
            PathClass::TagDir { tag, all_tags } => {
                if !self.registry.contains_all(&all_tags) {
                    return Err(TagfsError::NoSuchEntry.into());
                }
                if self.any_file_tagged(&tag)? {
                    return Err(TagfsError::NotEmpty.into());
                }
                self.registry.remove(&tag)?;
                Ok(())
            }
            PathClass::Root => Err(TagfsError::NotSupported.into()),
        }
    }

    fn unlink(&self, _req: &Request, path: &Path) -> FuseResult<()> {
        match self.classify(path) {
            PathClass::File {
                name,
                required_tags,
            } => {
                let backing = self.resolve_file_path(&name, &required_tags)?;
                fs::remove_file(backing).map_err(TagfsError::from)?;
                Ok(())
            }
            PathClass::TagDir { .. } => Err(TagfsError::IsADirectory.into()),
            PathClass::Root => Err(TagfsError::NotSupported.into()),
        }
    }

    fn link(&self, _req: &Request, old: &Path, new: &Path) -> FuseResult<()> {
        match self.classify(old) {
            PathClass::File {
                name: old_name,
                required_tags: old_required,
            } => {
                let old_backing = self.resolve_file_path(&old_name, &old_required)?;
                let new_name = PathClass::name(new).ok_or(TagfsError::NoSuchEntry)?;
                let new_required = PathClass::prefix_tags(new);
                if self.registry.contains(&new_name) {
                    return Err(TagfsError::Exists.into());
                }
                if !self.registry.contains_all(&new_required) {
                    return Err(TagfsError::NoSuchEntry.into());
                }
                let new_backing = self.settings.root().join(&new_name);
                if new_name != old_name {
                    fs::hard_link(&old_backing, &new_backing).map_err(TagfsError::from)?;
                }
                tagstore::write_tags(
                    &new_backing,
                    self.settings.file_tags_xattr_name(),
                    &new_required,
                )?;
                Ok(())
            }
            PathClass::TagDir { .. } | PathClass::Root => {
                Err(TagfsError::PermissionDenied.into())
            }
        }
    }

    fn mkdir(&self, _req: &Request, path: &Path, mode: mode_t) -> FuseResult<()> {
        let name = PathClass::name(path).ok_or(TagfsError::NoSuchEntry)?;
        let prefix = PathClass::prefix_tags(path);
        if !self.registry.contains_all(&prefix) {
            return Err(TagfsError::NoSuchEntry.into());
        }
        if self.registry.contains(&name) {
            return Err(TagfsError::Exists.into());
        }
        if self.settings.root().join(&name).symlink_metadata().is_ok() {
            return Err(TagfsError::Exists.into());
        }

        let state_dir = self.settings.root().join(constants::STATE_DIR_NAME);
        fs::create_dir_all(&state_dir).map_err(TagfsError::from)?;
        let scratch = state_dir.join(format!("mkdir-{}", name));
        fs::create_dir(&scratch).map_err(TagfsError::from)?;
        fs::set_permissions(&scratch, fs::Permissions::from_mode(mode))
            .map_err(TagfsError::from)?;
        let snapshot = TagDirStat::from_metadata(&fs::metadata(&scratch).map_err(TagfsError::from)?);
        fs::remove_dir(&scratch).map_err(TagfsError::from)?;

        self.registry.insert(&name, snapshot)?;
        Ok(())
    }

    fn rename(&self, _req: &Request, src: &Path, dst: &Path) -> FuseResult<()> {
        match self.classify(src) {
            PathClass::TagDir { tag, all_tags } => {
                if !self.registry.contains_all(&all_tags) {
                    return Err(TagfsError::NoSuchEntry.into());
                }
                let new_name = PathClass::name(dst).ok_or(TagfsError::NoSuchEntry)?;
                if self.registry.contains(&new_name)
                    || self.settings.root().join(&new_name).symlink_metadata().is_ok()
                {
                    return Err(TagfsError::Exists.into());
                }
                self.registry.rename(&tag, &new_name)?;
                Ok(())
            }
            PathClass::File {
                name: old_name,
                required_tags: old_required,
            } => {
                let old_backing = self.resolve_file_path(&old_name, &old_required)?;
                let new_name = PathClass::name(dst).ok_or(TagfsError::NoSuchEntry)?;
                let new_required = PathClass::prefix_tags(dst);
                if self.registry.contains(&new_name) {
                    return Err(TagfsError::Exists.into());
                }
                if !self.registry.contains_all(&new_required) {
                    return Err(TagfsError::NoSuchEntry.into());
                }

                let new_backing = self.settings.root().join(&new_name);
                fs::rename(&old_backing, &new_backing).map_err(TagfsError::from)?;

                let current = tagstore::read_tags(&new_backing, self.settings.file_tags_xattr_name())?;
                let to_remove: TagSet = old_required.difference(&new_required).cloned().collect();
                let to_add: TagSet = new_required.difference(&old_required).cloned().collect();
                let mut updated = current;
                for t in &to_remove {
                    updated.remove(t);
                }
                for t in &to_add {
                    updated.insert(t.clone());
                }
                tagstore::write_tags(&new_backing, self.settings.file_tags_xattr_name(), &updated)?;
                Ok(())
            }
            PathClass::Root => Err(TagfsError::NotSupported.into()),
        }
    }

    fn statfs(&self, _req: &Request, _path: &Path) -> FuseResult<statvfs> {
        let mut res = new_statvfs();
        res.f_bsize = 4096;
        res.f_frsize = 4096;

        #[cfg(target_os = "macos")]
        {
            res.f_blocks = ((100 * 1024u64.pow(3)) / res.f_bsize as u64) as u32;
        }
        #[cfg(not(target_os = "macos"))]
        {
            res.f_blocks = (100 * 1024u64.pow(3)) / res.f_bsize;
        }

        res.f_bfree = res.f_blocks;
        res.f_bavail = res.f_blocks;
        res.f_files = 100;
        res.f_ffree = 10_000;
        res.f_favail = res.f_ffree;
        Ok(res)
    }

    fn chmod(&self, _req: &Request, path: &Path, mode: mode_t) -> FuseResult<()> {
        match self.classify(path) {
            PathClass::File {
                name,
                required_tags,
            } => {
                let backing = self.resolve_file_path(&name, &required_tags)?;
                fs::set_permissions(&backing, fs::Permissions::from_mode(mode))
                    .map_err(TagfsError::from)?;
                Ok(())
            }
            PathClass::TagDir { .. } | PathClass::Root => Err(TagfsError::NotSupported.into()),
        }
    }

    fn chown(&self, _req: &Request, path: &Path, uid: uid_t, gid: gid_t) -> FuseResult<()> {
        match self.classify(path) {
            PathClass::File {
                name,
                required_tags,
            } => {
                let backing = self.resolve_file_path(&name, &required_tags)?;
                nix::unistd::chown(
                    &backing,
                    Some(nix::unistd::Uid::from_raw(uid)),
                    Some(nix::unistd::Gid::from_raw(gid)),
                )
                .map_err(TagfsError::from)?;
                Ok(())
            }
            PathClass::TagDir { .. } | PathClass::Root => Err(TagfsError::NotSupported.into()),
        }
    }

    fn setxattr(
        &self,
        _req: &Request,
        path: &Path,
        name: &str,
        value: &[u8],
        position: u32,
        flags: i32,
    ) -> FuseResult<()> {
        Ok(xattr::setxattr(self, path, name, value, position, flags)?)
    }

    fn getxattr(
        &self,
        _req: &Request,
        path: &Path,
        name: &str,
        position: u32,
    ) -> FuseResult<Vec<u8>> {
        Ok(xattr::getxattr(self, path, name, position)?)
    }

    fn listxattr(&self, _req: &Request, path: &Path, options: i32) -> FuseResult<Vec<String>> {
        Ok(xattr::listxattr(self, path, options)?)
    }

    fn removexattr(&self, _req: &Request, path: &Path, name: &str, options: i32) -> FuseResult<()> {
        Ok(xattr::removexattr(self, path, name, options)?)
    }
}
