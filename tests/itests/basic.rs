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

/// Scenario 1 from the spec's concrete end-to-end walkthrough: a file visible under two tags is
/// listed from every prefix of those tags, in any order (P1 Visibility).
#[test]
fn readdir_sees_files_from_any_tag_prefix_order() {
    let tm = TestMount::new();

    fs::create_dir(tm.path("red")).unwrap();
    fs::create_dir(tm.path("big")).unwrap();
    fs::File::create(tm.path("red/foo")).unwrap();
    fs::File::create(tm.path("red/big/bar")).unwrap();

    assert_eq!(ls(&tm.root()), names(&[".", "..", "red", "big", "foo", "bar"]));
    assert_eq!(ls(&tm.path("red")), names(&[".", "..", "big", "bar"]));
    assert_eq!(ls(&tm.path("red/big")), names(&[".", "..", "bar"]));
    // order-independence: big/red sees the same file as red/big
    assert_eq!(ls(&tm.path("big/red")), names(&[".", "..", "bar"]));
}

/// Moving a file out of a tag directory removes it from that tag's listing and adds it to the
/// destination's, without disturbing an unrelated sibling.
#[test]
fn moving_a_file_between_tags_updates_visibility() {
    let tm = TestMount::new();

    fs::create_dir(tm.path("red")).unwrap();
    fs::create_dir(tm.path("big")).unwrap();
    fs::File::create(tm.path("red/foo")).unwrap();
    fs::File::create(tm.path("red/big/bar")).unwrap();

    fs::rename(tm.path("red/foo"), tm.path("big/foo")).unwrap();

    assert_eq!(ls(&tm.path("red")), names(&[".", "..", "big", "bar"]));
    assert_eq!(ls(&tm.path("big")), names(&[".", "..", "red", "foo", "bar"]));
}

/// Scenario 4: a hard link into a tag directory creates a second name for the same file, visible
/// at both the root and the tag directory, sharing one inode.
#[test]
fn hard_link_is_visible_under_both_names() {
    let tm = TestMount::new();

    fs::create_dir(tm.path("red")).unwrap();
    fs::File::create(tm.path("foo")).unwrap();
    fs::hard_link(tm.path("foo"), tm.path("red/foo")).unwrap();

    assert_eq!(ls(&tm.root()), names(&[".", "..", "red", "foo"]));
    assert_eq!(ls(&tm.path("red")), names(&[".", "..", "foo"]));

    let a = fs::metadata(tm.path("foo")).unwrap();
    let b = fs::metadata(tm.path("red/foo")).unwrap();
    assert_eq!(a.ino(), b.ino());
    assert_eq!(a.nlink(), 2);
}

/// P6 Dual-exclusion: a base name cannot simultaneously denote a tag and a file.
#[test]
fn base_name_cannot_be_both_tag_and_file() {
    let tm = TestMount::new();

    fs::create_dir(tm.path("red")).unwrap();
    let err = fs::File::create(tm.path("red")).unwrap_err();
    assert_eq!(err.raw_os_error(), Some(libc::EEXIST));

    fs::File::create(tm.path("foo")).unwrap();
    let err = fs::create_dir(tm.path("foo")).unwrap_err();
    assert_eq!(err.raw_os_error(), Some(libc::EEXIST));
}

/// Tag directories nest to arbitrary depth and each intermediate listing only shows tags not
/// already required along the path.
#[test]
fn tag_directory_listing_excludes_already_required_tags() {
    let tm = TestMount::new();

    fs::create_dir(tm.path("red")).unwrap();
    fs::create_dir(tm.path("big")).unwrap();
    fs::create_dir(tm.path("round")).unwrap();

    assert_eq!(ls(&tm.path("red")), names(&[".", "..", "big", "round"]));
    assert_eq!(ls(&tm.path("red/big")), names(&[".", "..", "round"]));
}
