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
use tagfs::common::constants::FILE_TAGS_XATTR;
use tagfs::tagstore;

/// Creating a file under a tag prefix stamps its tag set with exactly that prefix (the spec's
/// recommended contract for `create`).
#[test]
fn create_stamps_tag_set_with_path_prefix() {
    let tm = TestMount::new();

    fs::create_dir(tm.path("red")).unwrap();
    fs::create_dir(tm.path("big")).unwrap();
    fs::File::create(tm.path("red/big/foo")).unwrap();

    let backing = tm.backing_root().join("foo");
    let tags = tagstore::read_tags(&backing, FILE_TAGS_XATTR).unwrap();
    assert_eq!(tags.len(), 2);
    assert!(tags.contains("red"));
    assert!(tags.contains("big"));
}

/// A file created untagged (directly at the root) has an empty tag set and is visible only at
/// the root.
#[test]
fn file_created_untagged_has_empty_tag_set() {
    let tm = TestMount::new();

    fs::create_dir(tm.path("red")).unwrap();
    fs::File::create(tm.path("foo")).unwrap();

    let backing = tm.backing_root().join("foo");
    let tags = tagstore::read_tags(&backing, FILE_TAGS_XATTR).unwrap();
    assert!(tags.is_empty());

    assert_eq!(ls(&tm.root()), names(&[".", "..", "red", "foo"]));
    assert_eq!(ls(&tm.path("red")), names(&[".", ".."]));
}

/// P3 Tag round-trip: writing back a file's own tag set is a no-op observable through readdir.
#[test]
fn write_tags_read_tags_round_trips() {
    let tm = TestMount::new();

    fs::create_dir(tm.path("red")).unwrap();
    fs::create_dir(tm.path("big")).unwrap();
    fs::File::create(tm.path("red/big/foo")).unwrap();

    let backing = tm.backing_root().join("foo");
    let before = tagstore::read_tags(&backing, FILE_TAGS_XATTR).unwrap();
    tagstore::write_tags(&backing, FILE_TAGS_XATTR, &before).unwrap();
    let after = tagstore::read_tags(&backing, FILE_TAGS_XATTR).unwrap();

    assert_eq!(before, after);
    assert_eq!(ls(&tm.path("red/big")), names(&[".", "..", "foo"]));
}

/// A missing `user.tags` xattr reads as the empty set and is auto-initialized, so a file dropped
/// into the backing directory by something other than this filesystem still shows up untagged at
/// the root rather than failing to resolve.
#[test]
fn file_with_no_xattr_is_untagged() {
    let tm = TestMount::new();

    let backing = tm.backing_root().join("external");
    fs::File::create(&backing).unwrap();

    assert_eq!(ls(&tm.root()), names(&[".", "..", "external"]));
    let tags = tagstore::read_tags(&backing, FILE_TAGS_XATTR).unwrap();
    assert!(tags.is_empty());
}
