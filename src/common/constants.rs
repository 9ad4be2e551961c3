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

pub const VERSION: (&str, &str, &str) = (
    env!("CARGO_PKG_VERSION_MAJOR"),
    env!("CARGO_PKG_VERSION_MINOR"),
    env!("CARGO_PKG_VERSION_PATCH"),
);
pub const ENV_PREFIX: &str = "TAGFS";
pub const APP_NAME: &str = "tagfs";
pub const AUTHOR: &str = "Andrew Moffat";

/// xattr on each regular file in the backing root holding its comma-separated tag set.
pub const FILE_TAGS_XATTR: &str = "user.tags";

/// xattr on the backing root holding the serialized Tag Registry.
pub const REGISTRY_XATTR: &str = "user.tagfs.tags";

/// Hidden state directory (relative to the backing root) holding the logger's output and the
/// scratch directories `mkdir` mints fresh stats from. Never enumerated as a File Entry.
pub const STATE_DIR_NAME: &str = ".tagfs";

/// Directory (relative to the backing root) where the rotating logger writes its files.
pub const LOG_DIR_NAME: &str = ".tagfs/log";

pub const DEFAULT_CONFIG_TOML: &str = r###"
log_level = "warn"
"###;

// https://github.com/torvalds/linux/blob/master/Documentation/admin-guide/devices.txt
// 60-63 LOCAL/EXPERIMENTAL USE
pub const DEVICE_ID: u64 = 63;
