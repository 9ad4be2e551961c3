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

//! The File Tag Store: each regular file's tag set lives in its own `user.tags` xattr, comma
//! separated (§4.4). There is no index; every operation touches exactly the one file it's asked
//! about.

use crate::common::err::TagfsResult;
use crate::common::types::TagSet;
use std::path::Path;

/// Reads `path`'s tag set. A missing xattr is treated as an empty set, and the xattr is
/// initialized to empty so subsequent reads don't need to special-case "never written" again. A
/// value that doesn't decode as UTF-8 is likewise treated as empty, rather than failing the whole
/// operation over one file's corrupt metadata.
pub fn read_tags(path: &Path, xattr_name: &str) -> TagfsResult<TagSet> {
    match xattr::get(path, xattr_name)? {
        Some(raw) => Ok(decode(&raw)),
        None => {
            xattr::set(path, xattr_name, b"")?;
            Ok(TagSet::new())
        }
    }
}

/// Writes `tags` to `path`'s xattr, replacing whatever was there before.
pub fn write_tags(path: &Path, xattr_name: &str, tags: &TagSet) -> TagfsResult<()> {
    let encoded = encode(tags);
    xattr::set(path, xattr_name, encoded.as_bytes())?;
    Ok(())
}

fn decode(raw: &[u8]) -> TagSet {
    let s = String::from_utf8_lossy(raw);
    if s.is_empty() {
        TagSet::new()
    } else {
        s.split(',').map(|t| t.to_string()).collect()
    }
}

fn encode(tags: &TagSet) -> String {
    tags.iter().cloned().collect::<Vec<_>>().join(",")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;

    const XATTR: &str = "user.tags";

    fn touch(dir: &Path, name: &str) -> std::path::PathBuf {
        let path = dir.join(name);
        File::create(&path).unwrap();
        path
    }

    #[test]
    fn missing_xattr_reads_as_empty_and_initializes() {
        let dir = tempfile::tempdir().unwrap();
        let path = touch(dir.path(), "a");
        let tags = read_tags(&path, XATTR).unwrap();
        assert!(tags.is_empty());
        assert_eq!(xattr::get(&path, XATTR).unwrap(), Some(vec![]));
    }

    #[test]
    fn write_then_read_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = touch(dir.path(), "a");
        let mut tags = TagSet::new();
        tags.insert("red".to_string());
        tags.insert("big".to_string());
        write_tags(&path, XATTR, &tags).unwrap();

        let read_back = read_tags(&path, XATTR).unwrap();
        assert_eq!(read_back, tags);
    }

    #[test]
    fn write_replaces_prior_value() {
        let dir = tempfile::tempdir().unwrap();
        let path = touch(dir.path(), "a");

        let mut first = TagSet::new();
        first.insert("red".to_string());
        write_tags(&path, XATTR, &first).unwrap();

        let mut second = TagSet::new();
        second.insert("blue".to_string());
        write_tags(&path, XATTR, &second).unwrap();

        assert_eq!(read_tags(&path, XATTR).unwrap(), second);
    }
}
