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

use super::TagFilesystem;
use crate::common::err::{TagfsError, TagfsResult};
use crate::common::types::PathClass;
use crate::fuse::util;
use std::path::{Path, PathBuf};

/// Resolves `path` to a real backing path for xattr passthrough: the root itself, or the backing
/// file named by the path's last component. Tag directories have no backing inode (§4.5: xattr
/// family is not supported on the tag branch).
fn backing_path(fsys: &TagFilesystem, path: &Path) -> TagfsResult<PathBuf> {
    match PathClass::classify(path, |t| fsys.registry.contains(t)) {
        PathClass::Root => Ok(fsys.settings.root().to_path_buf()),
        PathClass::TagDir { .. } => Err(TagfsError::NotSupported),
        PathClass::File { name, .. } => Ok(fsys.settings.root().join(name)),
    }
}

/// Whether `name` is this system's own bookkeeping attribute, hidden from generic xattr tools and
/// immutable via the generic xattr calls (mutated only through the tag-aware VFS ops).
fn is_reserved(fsys: &TagFilesystem, name: &str) -> bool {
    name == fsys.settings.file_tags_xattr_name() || name == fsys.settings.registry_xattr_name()
}

pub fn setxattr(
    fsys: &TagFilesystem,
    path: &Path,
    name: &str,
    value: &[u8],
    position: u32,
    flags: i32,
) -> TagfsResult<()> {
    if is_reserved(fsys, name) {
        return Err(TagfsError::PermissionDenied);
    }
    let backing = backing_path(fsys, path)?;
    util::setxattr(&backing, name, value, position, flags)?;
    Ok(())
}

pub fn getxattr(fsys: &TagFilesystem, path: &Path, name: &str, position: u32) -> TagfsResult<Vec<u8>> {
    if is_reserved(fsys, name) {
        return Err(TagfsError::NoSuchEntry);
    }
    let backing = backing_path(fsys, path)?;
    Ok(util::getxattr(&backing, name, position)?)
}

pub fn listxattr(fsys: &TagFilesystem, path: &Path, options: i32) -> TagfsResult<Vec<String>> {
    let backing = backing_path(fsys, path)?;
    let names = util::listxattr(&backing, options)?;
    Ok(names
        .into_iter()
        .filter(|n| !is_reserved(fsys, n))
        .collect())
}

pub fn removexattr(fsys: &TagFilesystem, path: &Path, name: &str, options: i32) -> TagfsResult<()> {
    if is_reserved(fsys, name) {
        return Err(TagfsError::PermissionDenied);
    }
    let backing = backing_path(fsys, path)?;
    util::removexattr(&backing, name, options)?;
    Ok(())
}
