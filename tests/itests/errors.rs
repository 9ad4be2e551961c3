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

use crate::common::TestMount;
use std::fs;
use std::io::Write;
use tagfs::common::constants::FILE_TAGS_XATTR;
use tagfs::common::settings::Settings;
use tagfs::registry::TagRegistry;
use tagfs::tagstore;

/// Scenario 2 / P5 rmdir refusal: removing a tag directory while a file still bears that tag
/// fails with ENOTEMPTY.
#[test]
fn rmdir_tag_still_in_use_fails_not_empty() {
    let tm = TestMount::new();

    fs::create_dir(tm.path("red")).unwrap();
    fs::File::create(tm.path("red/foo")).unwrap();

    let err = fs::remove_dir(tm.path("red")).unwrap_err();
    assert_eq!(err.raw_os_error(), Some(libc::ENOTEMPTY));
}

/// Once no file bears a tag any more, rmdir on it succeeds and the tag stops being offered by
/// readdir.
#[test]
fn rmdir_unused_tag_succeeds() {
    let tm = TestMount::new();

    fs::create_dir(tm.path("red")).unwrap();
    fs::File::create(tm.path("red/foo")).unwrap();
    fs::remove_file(tm.path("red/foo")).unwrap();

    fs::remove_dir(tm.path("red")).unwrap();
    assert!(!tm.path("red").exists());
}

/// Scenario 5: creating a file whose name collides with an existing tag fails with EEXIST.
#[test]
fn create_colliding_with_tag_name_fails_exists() {
    let tm = TestMount::new();

    fs::create_dir(tm.path("red")).unwrap();
    fs::File::create(tm.path("red/foo")).unwrap();

    let err = fs::File::create(tm.path("red/red")).unwrap_err();
    assert_eq!(err.raw_os_error(), Some(libc::EEXIST));
}

/// Scenario 6: `mkdir` over an existing tag name is implementation-chosen but uniform (see
/// DESIGN.md's Open Question decisions) — this system rejects with EEXIST rather than the
/// teacher's overwrite behavior.
#[test]
fn mkdir_over_existing_tag_rejects_exists() {
    let tm = TestMount::new();

    fs::create_dir(tm.path("red")).unwrap();
    let err = fs::create_dir(tm.path("red")).unwrap_err();
    assert_eq!(err.raw_os_error(), Some(libc::EEXIST));
}

/// unlink/truncate on a tag directory fails with EISDIR.
#[test]
fn unlink_on_tag_directory_fails_is_a_directory() {
    let tm = TestMount::new();

    fs::create_dir(tm.path("red")).unwrap();
    let err = fs::remove_file(tm.path("red")).unwrap_err();
    assert_eq!(err.raw_os_error(), Some(libc::EISDIR));
}

/// open on a tag directory fails with EPERM, not ENOENT or EISDIR, per the spec's error
/// taxonomy for file-only operations attempted on a tag branch.
#[test]
fn open_tag_directory_fails_permission_denied() {
    let tm = TestMount::new();

    fs::create_dir(tm.path("red")).unwrap();
    let err = fs::File::open(tm.path("red")).unwrap_err();
    assert_eq!(err.raw_os_error(), Some(libc::EPERM));
}

/// A path whose required tags aren't all registered fails with ENOENT, even when a backing file
/// of that base name happens to exist untagged.
#[test]
fn required_tag_not_registered_fails_no_such_entry() {
    let tm = TestMount::new();

    fs::File::create(tm.path("foo")).unwrap();
    let err = fs::metadata(tm.path("nonexistent-tag/foo")).unwrap_err();
    assert_eq!(err.raw_os_error(), Some(libc::ENOENT));
}

/// A file's base name is the sole identity key (invariant 4): `create` on a path whose base name
/// collides with an existing backing file that isn't visible at that path (different tag set)
/// must not clobber it. Regression test for a `create_new` vs `create(true)+truncate(true)` bug.
#[test]
fn create_does_not_clobber_invisibly_named_file() {
    let tm = TestMount::new();

    fs::create_dir(tm.path("blue")).unwrap();
    fs::create_dir(tm.path("red")).unwrap();
    {
        let mut f = fs::File::create(tm.path("blue/foo")).unwrap();
        f.write_all(b"original contents").unwrap();
    }

    // "foo" exists in the backing root tagged {blue}; it is not visible at /red/foo, so the
    // kernel's lookup reports ENOENT and dispatches create() here — which must refuse rather
    // than truncate the other file's contents and steal its name.
    let err = fs::File::create(tm.path("red/foo")).unwrap_err();
    assert_eq!(err.raw_os_error(), Some(libc::EEXIST));

    let contents = fs::read_to_string(tm.path("blue/foo")).unwrap();
    assert_eq!(contents, "original contents");

    let backing = tm.backing_root().join("foo");
    let tags = tagstore::read_tags(&backing, FILE_TAGS_XATTR).unwrap();
    assert_eq!(tags.len(), 1);
    assert!(tags.contains("blue"));
}

/// A tag name may not contain `,`, the File Tag Store's encoding delimiter (§4.4); `mkdir` on
/// such a name fails rather than minting a tag that can never round-trip through `user.tags`.
#[test]
fn mkdir_rejects_tag_name_with_comma() {
    let tm = TestMount::new();

    let err = fs::create_dir(tm.path("a,b")).unwrap_err();
    assert_eq!(err.raw_os_error(), Some(libc::EINVAL));
}

/// P2 Registry round-trip: after mkdir/rmdir, reloading the registry straight from the backing
/// root's xattr (as a fresh mount would on `init`) yields the identical set of known tags.
#[test]
fn registry_survives_reload_from_backing_root() {
    let tm = TestMount::new();

    fs::create_dir(tm.path("red")).unwrap();
    fs::create_dir(tm.path("big")).unwrap();
    fs::create_dir(tm.path("round")).unwrap();
    fs::remove_dir(tm.path("round")).unwrap();

    let settings = Settings::new(tm.backing_root()).unwrap();
    let reloaded = TagRegistry::load(settings.root(), settings.registry_xattr_name()).unwrap();

    assert!(reloaded.contains("red"));
    assert!(reloaded.contains("big"));
    assert!(!reloaded.contains("round"));
}
