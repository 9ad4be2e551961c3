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

#![warn(
    clippy::all,
    clippy::restriction,
    clippy::pedantic,
    clippy::nursery,
    clippy::cargo
)]
#![allow(
    clippy::expect_used,
    clippy::multiple_crate_versions,
    clippy::implicit_return,
    clippy::missing_docs_in_private_items,
    clippy::missing_inline_in_public_items,
    clippy::shadow_reuse,
    clippy::similar_names,
    clippy::single_match_else,
    clippy::wildcard_enum_match_arm
)]

use clap::{App, Arg};
use log::info;
use std::error::Error;
use std::path::PathBuf;
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tagfs::common::settings::Settings;
use tagfs::registry::TagRegistry;
use tagfs::{common, fuse, TagFilesystem};

const TAG: &str = "main";

fn run() -> Result<(), Box<dyn Error>> {
    let version_str = common::version_str();
    let app = App::new("tagfs")
        .version(&*version_str)
        .author(common::constants::AUTHOR)
        .about("A tag-based filesystem")
        .settings(&[clap::AppSettings::ArgRequiredElseHelp])
        .arg(
            Arg::with_name("verbosity")
                .short("v")
                .multiple(true)
                .help("Sets the level of verbosity"),
        )
        .arg(
            Arg::with_name("root")
                .required(true)
                .help("The backing directory to mount as a tag filesystem"),
        );
    let matches = app.get_matches();

    let root: PathBuf = matches
        .value_of("root")
        .expect("root is a required argument")
        .into();

    let settings = Arc::new(Settings::new(&root)?);

    std::fs::create_dir_all(settings.log_dir())?;
    let rotating_log = common::log::RotatingLogger::new(
        settings.log_dir(),
        "%Y-%m-%d-%H.log".to_string(),
        6,
        100,
    )?;
    let mut log_outputs: Vec<fern::Output> = vec![From::<Box<dyn log::Log>>::from(Box::new(
        rotating_log,
    ))];
    log_outputs.push(std::io::stdout().into());

    let level = match matches.occurrences_of("verbosity") {
        0 => settings.log_level(),
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    common::log::setup_logger(level, log_outputs)?;

    info!(target: TAG, "Loading tag registry from {}", root.display());
    let registry = Arc::new(TagRegistry::load(
        settings.root(),
        settings.registry_xattr_name(),
    )?);

    let ops = TagFilesystem::new(settings.clone(), registry);
    let fuse_conf = fuse::util::make_fuse_config();
    let mount_conf = fuse::util::make_mount_config(settings.root());

    let sigint = Arc::new(AtomicBool::new(false));
    signal_hook::flag::register(signal_hook::SIGINT, Arc::clone(&sigint))?;
    signal_hook::flag::register(signal_hook::SIGTERM, Arc::clone(&sigint))?;

    info!(target: TAG, "Mounting tagfs at {}", root.display());
    let _mount_handle = fuse_sys::mount(&root, ops, true, fuse_conf, mount_conf)?;

    while !sigint.load(Ordering::Relaxed) {
        thread::sleep(Duration::from_millis(100));
    }
    info!(target: TAG, "Got shutdown signal, unmounting {}", root.display());

    Ok(())
}

fn main() {
    if let Err(e) = run() {
        eprintln!("tagfs: {}", e);
        process::exit(1);
    }
}
