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

use crate::common::err::{TagfsError, TagfsResult};
use std::collections::BTreeSet;
use std::path::{Component, Path};

/// A flat string tag. Equality is bytewise; a tag may not be empty or contain a path separator.
pub type Tag = String;

/// An unordered, duplicate-free collection of tags. `BTreeSet` gives iteration a stable order for
/// free, which keeps "order unspecified but stable within one write" trivial to satisfy.
pub type TagSet = BTreeSet<Tag>;

pub fn validate_tag(tag: &str) -> TagfsResult<()> {
    if tag.is_empty()
        || tag == "."
        || tag == ".."
        || tag.contains(std::path::MAIN_SEPARATOR)
        || tag.contains(',')
    {
        return Err(TagfsError::BadTag(tag.to_string()));
    }
    Ok(())
}

/// Splits a synthetic path into its components: split on `/`, drop the leading empty component
/// from the root, drop a trailing slash.
pub fn path_components(path: &Path) -> Vec<String> {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(os) => Some(os.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect()
}

/// The result of classifying a synthetic path against the Tag Registry (the `{ Root, TagDir, File
/// }` tagged variant recommended over the teacher's dual-closure dispatch).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathClass {
    Root,
    /// `all_tags` is every path component, including `tag` itself.
    TagDir { tag: Tag, all_tags: TagSet },
    /// `required_tags` is every component except the last.
    File { name: String, required_tags: TagSet },
}

impl PathClass {
    /// Classify `path` using `is_tag`, a predicate answering "is this base name a known tag?".
    /// Generic over the predicate so classification has no direct storage dependency on the Tag
    /// Registry.
    pub fn classify<F>(path: &Path, is_tag: F) -> Self
    where
        F: Fn(&str) -> bool,
    {
        let comps = path_components(path);
        let name = match comps.last() {
            Some(n) => n.clone(),
            None => return PathClass::Root,
        };

        if is_tag(&name) {
            let all_tags: TagSet = comps.into_iter().collect();
            PathClass::TagDir {
                tag: name,
                all_tags,
            }
        } else {
            let required_tags: TagSet = comps[..comps.len() - 1].iter().cloned().collect();
            PathClass::File {
                name,
                required_tags,
            }
        }
    }

    /// `prefix_tags(p)`: every component except the last, treating the last as a file name
    /// regardless of whether it happens to also be a tag.
    pub fn prefix_tags(path: &Path) -> TagSet {
        let comps = path_components(path);
        if comps.is_empty() {
            return TagSet::new();
        }
        comps[..comps.len() - 1].iter().cloned().collect()
    }

    /// `name(p)`: the last path component, if any.
    pub fn name(path: &Path) -> Option<String> {
        path_components(path).last().cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn registry(tags: &[&str]) -> impl Fn(&str) -> bool + '_ {
        move |t| tags.contains(&t)
    }

    #[test]
    fn root_path_classifies_as_root() {
        assert_eq!(
            PathClass::classify(Path::new("/"), registry(&["red"])),
            PathClass::Root
        );
    }

    #[test]
    fn known_tag_classifies_as_tagdir() {
        let class = PathClass::classify(Path::new("/red/big"), registry(&["red", "big"]));
        match class {
            PathClass::TagDir { tag, all_tags } => {
                assert_eq!(tag, "big");
                assert_eq!(
                    all_tags,
                    vec!["red".to_string(), "big".to_string()]
                        .into_iter()
                        .collect::<TagSet>()
                );
            }
            other => panic!("expected TagDir, got {:?}", other),
        }
    }

    #[test]
    fn unknown_name_classifies_as_file() {
        let class = PathClass::classify(Path::new("/red/foo"), registry(&["red"]));
        match class {
            PathClass::File {
                name,
                required_tags,
            } => {
                assert_eq!(name, "foo");
                assert_eq!(
                    required_tags,
                    vec!["red".to_string()].into_iter().collect::<TagSet>()
                );
            }
            other => panic!("expected File, got {:?}", other),
        }
    }

    #[test]
    fn prefix_tags_order_independence() {
        let a = PathClass::prefix_tags(&PathBuf::from("/red/big/foo"));
        let b = PathClass::prefix_tags(&PathBuf::from("/big/red/foo"));
        assert_eq!(a, b);
    }

    #[test]
    fn validate_tag_rejects_empty_and_separators() {
        assert!(validate_tag("red").is_ok());
        assert!(validate_tag("").is_err());
        assert!(validate_tag("a/b").is_err());
        assert!(validate_tag(".").is_err());
        assert!(validate_tag("..").is_err());
    }

    #[test]
    fn validate_tag_rejects_comma() {
        // `,` is the File Tag Store's encoding delimiter (tagstore.rs); a tag containing one
        // would round-trip as two spurious tags after being written through `user.tags`.
        assert!(validate_tag("a,b").is_err());
    }
}
