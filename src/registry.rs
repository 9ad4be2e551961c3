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

//! The Tag Registry: the set of known tags and the frozen stat each was minted with at `mkdir`
//! time (§4.3). Backed by a single xattr on the mount's backing root, kept in sync with the
//! in-memory map on every mutation.

use crate::common::err::TagfsResult;
use crate::common::types::{validate_tag, Tag};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};

/// The stat a tag directory was minted with (§6: `{ st_atime, st_ctime, st_gid, st_mode,
/// st_mtime, st_nlink, st_size, st_uid }`). Frozen forever once created (§12): renaming a tag
/// carries the snapshot across, and nothing ever updates it in place.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct TagDirStat {
    pub st_atime: i64,
    pub st_atime_nsec: i64,
    pub st_ctime: i64,
    pub st_ctime_nsec: i64,
    pub st_mtime: i64,
    pub st_mtime_nsec: i64,
    pub st_gid: u32,
    pub st_uid: u32,
    pub st_mode: u32,
    pub st_nlink: u64,
    pub st_size: i64,
}

impl TagDirStat {
    /// Captures the snapshot from a throwaway directory's real metadata, the mechanism `mkdir`
    /// uses to mint a stat for a brand-new tag (§4.3).
    pub fn from_metadata(md: &std::fs::Metadata) -> Self {
        Self {
            st_atime: md.atime(),
            st_atime_nsec: md.atime_nsec(),
            st_ctime: md.ctime(),
            st_ctime_nsec: md.ctime_nsec(),
            st_mtime: md.mtime(),
            st_mtime_nsec: md.mtime_nsec(),
            st_gid: md.gid(),
            st_uid: md.uid(),
            st_mode: md.mode(),
            st_nlink: md.nlink(),
            st_size: md.size() as i64,
        }
    }
}

/// In-memory mirror of every known tag, persisted as JSON in the backing root's registry xattr.
/// Spec §5 requires every mutation to serialize a write to that xattr, so all mutating methods
/// take `&self` and lock internally rather than requiring `&mut self` up at the filesystem layer.
pub struct TagRegistry {
    root: PathBuf,
    xattr_name: &'static str,
    tags: RwLock<HashMap<Tag, TagDirStat>>,
}

impl TagRegistry {
    /// Reads and deserializes the registry xattr on `root`. A missing or empty xattr starts an
    /// empty registry rather than erroring, since a fresh backing directory has never had one set.
    pub fn load(root: impl AsRef<Path>, xattr_name: &'static str) -> TagfsResult<Self> {
        let root = root.as_ref().to_path_buf();
        let tags = match xattr::get(&root, xattr_name)? {
            Some(raw) if !raw.is_empty() => serde_json::from_slice(&raw)?,
            _ => HashMap::new(),
        };
        Ok(Self {
            root,
            xattr_name,
            tags: RwLock::new(tags),
        })
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.tags.read().contains_key(tag)
    }

    /// Whether every tag in `tags` is a registered tag (the subset-of-the-tag-universe check
    /// §7 requires before trusting a path's required tags).
    pub fn contains_all(&self, tags: &crate::common::types::TagSet) -> bool {
        let guard = self.tags.read();
        tags.iter().all(|t| guard.contains_key(t))
    }

    pub fn snapshot(&self, tag: &str) -> Option<TagDirStat> {
        self.tags.read().get(tag).cloned()
    }

    /// Every known tag, for readdir's "list tags not already required" enumeration.
    pub fn all_tags(&self) -> Vec<Tag> {
        self.tags.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.tags.read().len()
    }

    /// Adds or overwrites `tag`, then persists.
    pub fn insert(&self, tag: &str, stat: TagDirStat) -> TagfsResult<()> {
        validate_tag(tag)?;
        self.tags.write().insert(tag.to_string(), stat);
        self.persist()
    }

    /// Removes `tag`, then persists. Callers are responsible for confirming no file still bears
    /// the tag before calling this (§4.3) — the registry itself has no visibility into file tag
    /// sets.
    pub fn remove(&self, tag: &str) -> TagfsResult<()> {
        self.tags.write().remove(tag);
        self.persist()
    }

    /// Renames `old` to `new`, carrying the frozen stat snapshot across unchanged.
    pub fn rename(&self, old: &str, new: &str) -> TagfsResult<()> {
        validate_tag(new)?;
        let mut guard = self.tags.write();
        if let Some(stat) = guard.remove(old) {
            guard.insert(new.to_string(), stat);
        }
        drop(guard);
        self.persist()
    }

    fn persist(&self) -> TagfsResult<()> {
        let encoded = serde_json::to_vec(&*self.tags.read())?;
        xattr::set(&self.root, self.xattr_name, &encoded)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stat_for(dir: &Path) -> TagDirStat {
        TagDirStat::from_metadata(&std::fs::metadata(dir).unwrap())
    }

    #[test]
    fn insert_then_snapshot_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let registry = TagRegistry::load(dir.path(), "user.tagfs.tags").unwrap();
        let stat = stat_for(dir.path());
        registry.insert("red", stat.clone()).unwrap();
        assert!(registry.contains("red"));
        let snap = registry.snapshot("red").unwrap();
        assert_eq!(snap.st_uid, stat.st_uid);
        assert_eq!(snap.st_mtime, stat.st_mtime);
    }

    #[test]
    fn reload_sees_persisted_tags() {
        let dir = tempfile::tempdir().unwrap();
        {
            let registry = TagRegistry::load(dir.path(), "user.tagfs.tags").unwrap();
            registry.insert("red", stat_for(dir.path())).unwrap();
        }
        let reloaded = TagRegistry::load(dir.path(), "user.tagfs.tags").unwrap();
        assert!(reloaded.contains("red"));
        assert_eq!(reloaded.len(), 1);
    }

    #[test]
    fn remove_drops_tag_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let registry = TagRegistry::load(dir.path(), "user.tagfs.tags").unwrap();
        registry.insert("red", stat_for(dir.path())).unwrap();
        registry.remove("red").unwrap();
        assert!(!registry.contains("red"));

        let reloaded = TagRegistry::load(dir.path(), "user.tagfs.tags").unwrap();
        assert_eq!(reloaded.len(), 0);
    }

    #[test]
    fn rename_carries_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let registry = TagRegistry::load(dir.path(), "user.tagfs.tags").unwrap();
        let stat = stat_for(dir.path());
        registry.insert("red", stat.clone()).unwrap();
        registry.rename("red", "crimson").unwrap();

        assert!(!registry.contains("red"));
        let snap = registry.snapshot("crimson").unwrap();
        assert_eq!(snap.st_uid, stat.st_uid);
        assert_eq!(snap.st_mtime, stat.st_mtime);
    }

    #[test]
    fn insert_rejects_bad_tag() {
        let dir = tempfile::tempdir().unwrap();
        let registry = TagRegistry::load(dir.path(), "user.tagfs.tags").unwrap();
        let err = registry.insert("", stat_for(dir.path()));
        assert!(err.is_err());
    }
}
