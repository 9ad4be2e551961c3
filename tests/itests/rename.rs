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

use crate::common::{ls, names, TestMount};
use std::fs;
use std::os::unix::fs::MetadataExt;
use tagfs::common::constants::FILE_TAGS_XATTR;
use tagfs::tagstore;

/// P4 Rename preserves identity: after renaming a file across tag directories (without changing
/// its base name), the inode is unchanged and the tag set becomes
/// `(old_tags \ prefix(old)) ∪ prefix(new)`.
#[test]
fn rename_across_tags_preserves_inode_and_updates_tags() {
    let tm = TestMount::new();

    fs::create_dir(tm.path("red")).unwrap();
    fs::create_dir(tm.path("big")).unwrap();
    fs::File::create(tm.path("red/foo")).unwrap();

    let before_ino = fs::metadata(tm.path("red/foo")).unwrap().ino();

    fs::rename(tm.path("red/foo"), tm.path("big/foo")).unwrap();

    let after = fs::metadata(tm.path("big/foo")).unwrap();
    assert_eq!(before_ino, after.ino());

    let backing = tm.backing_root().join("foo");
    let tags = tagstore::read_tags(&backing, FILE_TAGS_XATTR).unwrap();
    assert_eq!(tags.len(), 1);
    assert!(tags.contains("big"));
    assert!(!tags.contains("red"));
}

/// Renaming into a tag directory a file already carries adds that tag alongside the ones it kept,
/// rather than replacing the whole set: `required_tags(new)` is a superset addition, not a
/// replacement, when `prefix(old)` is a subset of `prefix(new)`.
#[test]
fn rename_into_additional_tag_keeps_existing_tags() {
    let tm = TestMount::new();

    fs::create_dir(tm.path("red")).unwrap();
    fs::create_dir(tm.path("big")).unwrap();
    fs::File::create(tm.path("red/foo")).unwrap();

    fs::rename(tm.path("red/foo"), tm.path("red/big/foo")).unwrap();

    let backing = tm.backing_root().join("foo");
    let tags = tagstore::read_tags(&backing, FILE_TAGS_XATTR).unwrap();
    assert_eq!(tags.len(), 2);
    assert!(tags.contains("red"));
    assert!(tags.contains("big"));

    assert_eq!(ls(&tm.path("red")), names(&[".", "..", "big", "foo"]));
    assert_eq!(ls(&tm.path("red/big")), names(&[".", "..", "foo"]));
}

/// Renaming a tag directory renames the registry key, carrying every tagged file's visibility
/// along with it.
#[test]
fn renaming_a_tag_directory_renames_the_tag() {
    let tm = TestMount::new();

    fs::create_dir(tm.path("red")).unwrap();
    fs::File::create(tm.path("red/foo")).unwrap();

    fs::rename(tm.path("red"), tm.path("crimson")).unwrap();

    assert_eq!(ls(&tm.root()), names(&[".", "..", "crimson", "foo"]));
    assert_eq!(ls(&tm.path("crimson")), names(&[".", "..", "foo"]));
}
