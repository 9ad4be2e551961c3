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
use crate::fuse::util::{stat_from_metadata, stat_from_tagdir};
use crate::tagstore;
use fuse_sys::stat;
use std::fs;
use std::path::Path;

/// Root stats the backing root itself; a tag branch returns the Registry's frozen snapshot; a
/// file branch stats the backing file, but only once its on-disk tags confirm it's actually
/// visible at this path (§4.1's visibility rule).
pub fn getattr(fsys: &TagFilesystem, path: &Path) -> TagfsResult<stat> {
    match PathClass::classify(path, |t| fsys.registry.contains(t)) {
        PathClass::Root => {
            let md = fs::metadata(fsys.settings.root())?;
            Ok(stat_from_metadata(&md))
        }
        PathClass::TagDir { tag, all_tags } => {
            if !fsys.registry.contains_all(&all_tags) {
                return Err(TagfsError::NoSuchEntry);
            }
            let snapshot = fsys.registry.snapshot(&tag).ok_or(TagfsError::NoSuchEntry)?;
            Ok(stat_from_tagdir(&snapshot))
        }
        PathClass::File {
            name,
            required_tags,
        } => {
            if !fsys.registry.contains_all(&required_tags) {
                return Err(TagfsError::NoSuchEntry);
            }
            let backing = fsys.settings.root().join(&name);
            let md = fs::symlink_metadata(&backing).map_err(|_| TagfsError::NoSuchEntry)?;
            let tags = tagstore::read_tags(&backing, fsys.settings.file_tags_xattr_name())?;
            if !required_tags.is_subset(&tags) {
                return Err(TagfsError::NoSuchEntry);
            }
            Ok(stat_from_metadata(&md))
        }
    }
}
