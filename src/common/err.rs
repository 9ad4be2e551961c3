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

use fuse_sys::err::FuseErrno;
use nix::errno::Errno;
use nix::errno::Errno::{EEXIST, EINVAL, EIO, EISDIR, ENOENT, ENOSYS, ENOTDIR, ENOTEMPTY, EPERM};
use std::error::Error;
use std::io::ErrorKind;

pub type TagfsResult<T> = Result<T, TagfsError>;

/// The core's own error type. Each variant already knows which `Errno` it maps to (see §7 of the
/// design), so converting to a `FuseErrno` is a single field read rather than a second match.
pub enum TagfsError {
    /// Path's required tags aren't a subset of the tag universe, or no file/tag exists.
    NoSuchEntry,
    /// Creating a file/tag whose name collides with the other kind.
    Exists,
    /// File-only op attempted on a tag directory.
    PermissionDenied,
    /// unlink/truncate applied to a tag directory.
    IsADirectory,
    /// backing rmdir invoked on a file path.
    NotADirectory,
    /// rmdir of a tag directory that's still in use.
    NotEmpty,
    /// op with no tag-branch meaning.
    NotSupported,
    /// A tag string failed validation (empty, or contains a path separator).
    BadTag(String),
    /// The registry xattr on the backing root couldn't be decoded.
    RegistryDecode(String),
    IOError(std::io::Error),
    Other(Box<dyn Error>),
}

impl TagfsError {
    fn errno(&self) -> Errno {
        match self {
            TagfsError::NoSuchEntry => ENOENT,
            TagfsError::Exists => EEXIST,
            TagfsError::PermissionDenied => EPERM,
            TagfsError::IsADirectory => EISDIR,
            TagfsError::NotADirectory => ENOTDIR,
            TagfsError::NotEmpty => ENOTEMPTY,
            TagfsError::NotSupported => ENOSYS,
            TagfsError::BadTag(_) => EINVAL,
            TagfsError::RegistryDecode(_) => EIO,
            TagfsError::IOError(e) => map_io_err(e),
            TagfsError::Other(_) => EIO,
        }
    }
}

fn map_io_err(e: &std::io::Error) -> Errno {
    match e.kind() {
        ErrorKind::NotFound => ENOENT,
        ErrorKind::PermissionDenied => EPERM,
        ErrorKind::AlreadyExists => EEXIST,
        ErrorKind::InvalidData => EIO,
        _ => Errno::from_i32(e.raw_os_error().unwrap_or(EIO as i32)),
    }
}

impl From<std::io::Error> for TagfsError {
    fn from(e: std::io::Error) -> Self {
        TagfsError::IOError(e)
    }
}

impl From<Box<dyn Error>> for TagfsError {
    fn from(e: Box<dyn Error>) -> Self {
        TagfsError::Other(e)
    }
}

impl From<serde_json::Error> for TagfsError {
    fn from(e: serde_json::Error) -> Self {
        TagfsError::RegistryDecode(e.to_string())
    }
}

impl From<nix::Error> for TagfsError {
    fn from(e: nix::Error) -> Self {
        match e.as_errno() {
            Some(errno) => TagfsError::IOError(std::io::Error::from_raw_os_error(errno as i32)),
            None => TagfsError::Other(Box::new(e)),
        }
    }
}

impl Error for TagfsError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            TagfsError::IOError(e) => Some(e),
            TagfsError::Other(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

impl std::fmt::Display for TagfsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> Result<(), std::fmt::Error> {
        match self {
            TagfsError::NoSuchEntry => write!(f, "no such tag or file"),
            TagfsError::Exists => write!(f, "name already exists as a tag or file"),
            TagfsError::PermissionDenied => write!(f, "operation not permitted on a tag directory"),
            TagfsError::IsADirectory => write!(f, "is a tag directory"),
            TagfsError::NotADirectory => write!(f, "not a directory"),
            TagfsError::NotEmpty => write!(f, "tag still in use by one or more files"),
            TagfsError::NotSupported => write!(f, "operation not supported"),
            TagfsError::BadTag(tag) => write!(f, "invalid tag: {:?}", tag),
            TagfsError::RegistryDecode(msg) => write!(f, "couldn't decode tag registry: {}", msg),
            TagfsError::IOError(e) => write!(f, "IO error: {}", e),
            TagfsError::Other(e) => write!(f, "error: {}", e),
        }
    }
}

impl std::fmt::Debug for TagfsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> Result<(), std::fmt::Error> {
        std::fmt::Display::fmt(self, f)
    }
}

impl From<TagfsError> for FuseErrno {
    fn from(e: TagfsError) -> Self {
        let errno = e.errno();
        Self {
            errno,
            original: Some(Box::new(e)),
        }
    }
}
