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

use crate::common::constants::DEVICE_ID;
use crate::registry::TagDirStat;
use fuse_sys::conf::{FuseConfig, MountConfig};
use fuse_sys::{stat, timespec, O_RDWR, O_WRONLY};
use libc::mode_t;
use log::{debug, info};
use std::convert::TryInto;
use std::ffi::CString;
use std::fs::{Metadata, OpenOptions};
use std::os::raw::{c_char, c_void};
use std::os::unix::fs::MetadataExt;
use std::path::Path;

const UTIL_TAG: &str = "util";

struct Stat {
    device: u64,
    inode: u64,
    mode: mode_t,
    nlink: u64,
    uid: u32,
    gid: u32,
    size: i64,
    atime: timespec,
    mtime: timespec,
    ctime: timespec,
    #[cfg(target_os = "macos")]
    birthtime: timespec,
}

impl From<Stat> for stat {
    fn from(s: Stat) -> Self {
        #[cfg(target_os = "linux")]
        return stat {
            st_dev: s.device,
            st_ino: s.inode,
            st_nlink: s.nlink,
            st_mode: s.mode,
            st_uid: s.uid,
            st_gid: s.gid,
            __pad0: 0,
            st_rdev: 0,
            st_size: s.size,
            st_blksize: 4096,
            st_blocks: 8,
            st_atim: s.atime,
            st_mtim: s.mtime,
            st_ctim: s.ctime,
            __glibc_reserved: [0; 3],
        };

        #[cfg(target_os = "macos")]
        return stat {
            st_dev: s.device as i32,
            st_mode: s.mode as u16,
            st_nlink: s.nlink as u16,
            st_ino: s.inode,
            st_uid: s.uid,
            st_gid: s.gid,
            st_rdev: 0,
            st_atimespec: s.atime,
            st_mtimespec: s.mtime,
            st_ctimespec: s.ctime,
            st_birthtimespec: s.birthtime,
            st_size: s.size,
            st_blocks: 8,
            st_blksize: 0,
            st_flags: 0,
            st_gen: 0,
            st_lspare: 0,
            st_qspare: [0; 2],
        };
    }
}

/// Builds the `stat` for a regular file, symlink, or the backing root itself — always a direct
/// passthrough of the backing filesystem's own attributes (getattr's Root and File branches,
/// §4.5).
pub fn stat_from_metadata(md: &Metadata) -> stat {
    Stat {
        device: md.dev(),
        inode: md.ino(),
        mode: md.mode() as mode_t,
        nlink: md.nlink(),
        uid: md.uid(),
        gid: md.gid(),
        size: md.size() as i64,
        atime: timespec {
            tv_sec: md.atime(),
            tv_nsec: md.atime_nsec(),
        },
        mtime: timespec {
            tv_sec: md.mtime(),
            tv_nsec: md.mtime_nsec(),
        },
        ctime: timespec {
            tv_sec: md.ctime(),
            tv_nsec: md.ctime_nsec(),
        },
        #[cfg(target_os = "macos")]
        birthtime: timespec {
            tv_sec: md.ctime(),
            tv_nsec: md.ctime_nsec(),
        },
    }
    .into()
}

/// Builds the `stat` for a tag directory from its frozen Tag Registry snapshot (getattr's Tag
/// branch, §4.5). The device/inode are synthetic since a tag directory has no backing inode.
pub fn stat_from_tagdir(s: &TagDirStat) -> stat {
    Stat {
        device: DEVICE_ID,
        inode: 1,
        mode: s.st_mode as mode_t,
        nlink: s.st_nlink,
        uid: s.st_uid,
        gid: s.st_gid,
        size: s.st_size,
        atime: timespec {
            tv_sec: s.st_atime,
            tv_nsec: s.st_atime_nsec,
        },
        mtime: timespec {
            tv_sec: s.st_mtime,
            tv_nsec: s.st_mtime_nsec,
        },
        ctime: timespec {
            tv_sec: s.st_ctime,
            tv_nsec: s.st_ctime_nsec,
        },
        #[cfg(target_os = "macos")]
        birthtime: timespec {
            tv_sec: s.st_mtime,
            tv_nsec: s.st_mtime_nsec,
        },
    }
    .into()
}

fn make_fs_name<P: AsRef<Path>>(root: P) -> String {
    format!("{}:{}", crate::common::constants::APP_NAME, root.as_ref().display())
}

/// Mount-level options (spec §6): foreground, single-threaded, `allow_other` so other users can
/// see the mount, and a non-empty mountpoint is permitted since the backing directory itself is
/// the mountpoint's source of truth.
pub fn make_mount_config<P: AsRef<Path>>(root: P) -> MountConfig {
    let mut mount_conf = MountConfig::default();
    mount_conf.fsname = Some(make_fs_name(&root));
    mount_conf.subtype = Some(crate::common::constants::APP_NAME.to_string());
    mount_conf.default_permissions = Some(true);
    mount_conf.allow_other = Some(true);
    mount_conf.nonempty = Some(true);
    mount_conf
}

/// FUSE-level options. Attribute/entry caching is disabled, since tags can be added or removed by
/// any xattr-aware tool at any time, not just through the mount.
pub fn make_fuse_config() -> FuseConfig {
    let mut fuse_conf = FuseConfig::default();
    fuse_conf.attr_timeout = Some(0);
    fuse_conf.entry_timeout = Some(0);
    fuse_conf.hard_remove = Some(true);
    fuse_conf.kernel_cache = Some(false);
    fuse_conf
}

pub fn open_opts_from_mode(opts: &mut OpenOptions, mode: i32) -> &OpenOptions {
    // O_RDONLY is 0, so we start from "read only" and widen based on the other bits
    let mut fopts = opts.read(true).write(false);

    let mode = mode as u32;
    if mode & O_RDWR > 0 {
        fopts = fopts.read(true).write(true)
    } else if mode & O_WRONLY > 0 {
        fopts = fopts.read(false).write(true)
    }
    fopts
}

pub fn truncate(path: &Path, offset: i64) -> std::io::Result<()> {
    let c_path = CString::new(path.to_string_lossy().to_string()).unwrap();
    let err;
    unsafe { err = libc::truncate(c_path.as_ptr(), offset) }
    if err == -1 {
        Err(std::io::Error::last_os_error())
    } else {
        Ok(())
    }
}

pub fn getxattr(path: &Path, name: &str, position: u32) -> std::io::Result<Vec<u8>> {
    info!(
        target: UTIL_TAG,
        "getxattr {} on {:?}, position {}", name, path, position
    );

    let c_path = CString::new(path.to_string_lossy().to_string()).unwrap();
    let c_name = CString::new(name).unwrap();
    let desired_size: isize;

    #[cfg(target_os = "linux")]
    unsafe {
        desired_size = libc::getxattr(
            c_path.as_ptr(),
            c_name.as_ptr() as *const c_char,
            std::ptr::null_mut(),
            0,
        )
        .try_into()
        .unwrap();
    }
    #[cfg(target_os = "macos")]
    unsafe {
        desired_size = libc::getxattr(
            c_path.as_ptr(),
            c_name.as_ptr() as *const c_char,
            std::ptr::null_mut(),
            0,
            position,
            0,
        )
    }

    if desired_size == -1 {
        return Err(std::io::Error::last_os_error());
    }

    let mut value: Vec<u8> = Vec::new();
    value.resize(desired_size as usize, 0);
    let read_size: isize;

    #[cfg(target_os = "linux")]
    unsafe {
        read_size = libc::getxattr(
            c_path.as_ptr(),
            c_name.as_ptr() as *const c_char,
            value.as_mut_ptr() as *mut c_void,
            desired_size.try_into().unwrap(),
        )
    }
    #[cfg(target_os = "macos")]
    unsafe {
        read_size = libc::getxattr(
            c_path.as_ptr(),
            c_name.as_ptr() as *const c_char,
            value.as_mut_ptr() as *mut c_void,
            desired_size.try_into().unwrap(),
            position,
            0,
        )
    }

    if read_size == -1 {
        Err(std::io::Error::last_os_error())
    } else {
        Ok(value)
    }
}

pub fn setxattr(
    path: &Path,
    name: &str,
    value: &[u8],
    _position: u32,
    flags: i32,
) -> std::io::Result<()> {
    info!(
        target: UTIL_TAG,
        "setxattr {} on {:?}, flags {}", name, path, flags
    );

    let c_path = CString::new(path.to_string_lossy().to_string())?;
    let c_name = CString::new(name)?;
    let err;

    #[cfg(target_os = "linux")]
    unsafe {
        err = libc::setxattr(
            c_path.as_ptr(),
            c_name.as_ptr() as *const c_char,
            value.as_ptr() as *const c_void,
            value.len(),
            flags,
        );
    }
    #[cfg(target_os = "macos")]
    unsafe {
        err = libc::setxattr(
            c_path.as_ptr(),
            c_name.as_ptr(),
            value.as_ptr() as *const c_void,
            value.len(),
            _position,
            0,
        );
    }

    if err == -1 {
        Err(std::io::Error::last_os_error())
    } else {
        Ok(())
    }
}

pub fn listxattr(path: &Path, options: i32) -> std::io::Result<Vec<String>> {
    info!(
        target: UTIL_TAG,
        "listxattr on {:?}, options {}", path, options
    );
    let c_path = CString::new(path.to_string_lossy().to_string())?;
    let err_or_size;

    #[cfg(target_os = "linux")]
    unsafe {
        err_or_size = libc::listxattr(c_path.as_ptr(), std::ptr::null_mut(), 0);
    }
    #[cfg(target_os = "macos")]
    unsafe {
        err_or_size = libc::listxattr(c_path.as_ptr(), std::ptr::null_mut(), 0, options);
    }

    if err_or_size == -1 {
        return Err(std::io::Error::last_os_error());
    }

    let mut buf: Vec<u8> = vec![0; err_or_size as usize];
    let err_or_size;

    #[cfg(target_os = "linux")]
    unsafe {
        err_or_size = libc::listxattr(c_path.as_ptr(), buf.as_mut_ptr() as *mut i8, buf.len());
    }
    #[cfg(target_os = "macos")]
    unsafe {
        err_or_size = libc::listxattr(
            c_path.as_ptr(),
            buf.as_mut_ptr() as *mut i8,
            buf.len(),
            options,
        );
    }

    if err_or_size == -1 {
        return Err(std::io::Error::last_os_error());
    }

    debug!(target: UTIL_TAG, "Fetched xattr buffer {:?}", buf);
    let mut attrs = vec![];
    for chunk in buf.split(|c| c == &0u8) {
        if chunk.is_empty() {
            continue;
        }
        let name = String::from_utf8_lossy(chunk).to_string();
        attrs.push(name);
    }
    debug!(
        target: UTIL_TAG,
        "Fetched xattrs resulted in parsed attrs {:?}", attrs
    );

    Ok(attrs)
}

pub fn removexattr(path: &Path, name: &str, options: i32) -> std::io::Result<()> {
    info!(
        target: UTIL_TAG,
        "removexattr {} on {:?}, options {}", name, path, options
    );
    let c_path = CString::new(path.to_string_lossy().to_string())?;
    let c_name = CString::new(name)?;
    let err;

    #[cfg(target_os = "linux")]
    unsafe {
        err = libc::removexattr(c_path.as_ptr(), c_name.as_ptr());
    }
    #[cfg(target_os = "macos")]
    unsafe {
        err = libc::removexattr(c_path.as_ptr(), c_name.as_ptr(), options);
    }

    if err == -1 {
        Err(std::io::Error::last_os_error())
    } else {
        Ok(())
    }
}
