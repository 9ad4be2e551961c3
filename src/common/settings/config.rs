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
use crate::common::constants;
use serde::{Deserialize, Serialize};

/// Configuration for the single mount this process manages. There is no per-collection registry
/// here, unlike the teacher's `Mount`/`Symbols` split, since a `tagfs` process only ever serves one
/// backing root.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Config {
    pub log_level: String,
}

/// Builds `Config` from the compiled-in default TOML, overridable by `TAGFS_*` environment
/// variables, the same layering the teacher's `build()` does.
pub fn build() -> Result<Config, ::config::ConfigError> {
    let mut merged_config = config::Config::new();
    merged_config
        .merge(config::File::from_str(
            constants::DEFAULT_CONFIG_TOML,
            config::FileFormat::Toml,
        ))?
        .merge(config::Environment::with_prefix(constants::ENV_PREFIX))?;

    merged_config.try_into()
}
