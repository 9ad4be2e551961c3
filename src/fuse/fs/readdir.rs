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
use crate::common::types::{PathClass, Tag, TagSet};
use crate::tagstore;
use chrono::{DateTime, TimeZone, Utc};
use fuse_sys::FileEntry;
use std::path::Path;

/// Tag-directory children are every registered tag not already required by the path and not the
/// directory's own tag; file children are every backing filename whose tags are a superset of the
/// path's required tags (§4.5). `.` and `..` are supplied separately by `readdir_common`.
pub fn readdir(fsys: &TagFilesystem, path: &Path) -> TagfsResult<Box<dyn Iterator<Item = FileEntry>>> {
    let (required_tags, own_tag) = match PathClass::classify(path, |t| fsys.registry.contains(t)) {
        PathClass::Root => (TagSet::new(), None),
        PathClass::TagDir { tag, all_tags } => {
            let mut required = all_tags;
            required.remove(&tag);
            (required, Some(tag))
        }
        PathClass::File { .. } => return Err(TagfsError::NotADirectory),
    };

    let mut tag_names: Vec<Tag> = fsys
        .registry
        .all_tags()
        .into_iter()
        .filter(|t| !required_tags.contains(t) && Some(t) != own_tag.as_ref())
        .collect();
    tag_names.sort();

    let mut entries: Vec<FileEntry> = Vec::with_capacity(tag_names.len());
    for tag in tag_names {
        let mtime = fsys
            .registry
            .snapshot(&tag)
            .map(|s| Utc.timestamp(s.st_mtime, s.st_mtime_nsec as u32))
            .unwrap_or_else(Utc::now);
        entries.push(FileEntry { name: tag, mtime });
    }

    let mut visible_tags = required_tags;
    if let Some(tag) = own_tag {
        visible_tags.insert(tag);
    }

    for dirent in std::fs::read_dir(fsys.settings.root())? {
        let dirent = dirent?;
        if dirent.file_type()?.is_dir() {
            continue;
        }
        let name = dirent.file_name().to_string_lossy().into_owned();
        let tags = tagstore::read_tags(&dirent.path(), fsys.settings.file_tags_xattr_name())?;
        if !visible_tags.is_subset(&tags) {
            continue;
        }
        let mtime = dirent
            .metadata()
            .and_then(|md| md.modified())
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now());
        entries.push(FileEntry { name, mtime });
    }

    Ok(Box::new(entries.into_iter()))
}
