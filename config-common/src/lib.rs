// Copyright (c) Microsoft. All rights reserved.

#![deny(rust_2018_idioms)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]

pub mod error;

use crate::error::Error;

/// Reads the config file at `config_path`, then applies every `*.toml` file in `config_directory_path`
/// on top of it in lexical order.
///
/// A missing drop-in directory is not an error. A missing main file is.
pub fn read_config<TConfig>(
    config_path: &std::path::Path,
    config_directory_path: Option<&std::path::Path>,
) -> Result<TConfig, Error>
where
    TConfig: serde::de::DeserializeOwned,
{
    let base = read_toml(config_path)?;
    finish(base, config_directory_path)
}

/// Like [`read_config`], but a missing main file is treated as an empty table.
///
/// Used for the default config location, which operators are not required to create.
pub fn read_config_if_exists<TConfig>(
    config_path: &std::path::Path,
    config_directory_path: Option<&std::path::Path>,
) -> Result<TConfig, Error>
where
    TConfig: serde::de::DeserializeOwned,
{
    let base = match read_toml(config_path) {
        Ok(base) => base,
        Err(Error::ReadConfig(_, err))
            if err
                .downcast_ref::<std::io::Error>()
                .map_or(false, |err| err.kind() == std::io::ErrorKind::NotFound) =>
        {
            log::debug!(
                "config file {} does not exist; using defaults",
                config_path.display()
            );
            toml::Value::Table(toml::value::Table::new())
        }
        Err(err) => return Err(err),
    };

    finish(base, config_directory_path)
}

fn finish<TConfig>(
    mut config: toml::Value,
    config_directory_path: Option<&std::path::Path>,
) -> Result<TConfig, Error>
where
    TConfig: serde::de::DeserializeOwned,
{
    if let Some(config_directory_path) = config_directory_path {
        for patch_path in patch_paths(config_directory_path)? {
            log::debug!("applying config patch {}", patch_path.display());
            let patch = read_toml(&patch_path)?;
            merge_toml(&mut config, patch);
        }
    }

    config
        .try_into()
        .map_err(|err| Error::ParseConfig(None, Box::new(err)))
}

fn read_toml(path: &std::path::Path) -> Result<toml::Value, Error> {
    let contents = std::fs::read_to_string(path)
        .map_err(|err| Error::ReadConfig(Some(path.to_owned()), Box::new(err)))?;
    let value = toml::from_str(&contents)
        .map_err(|err| Error::ParseConfig(Some(path.to_owned()), Box::new(err)))?;
    Ok(value)
}

fn patch_paths(
    config_directory_path: &std::path::Path,
) -> Result<Vec<std::path::PathBuf>, Error> {
    let read_dir_err = |err: std::io::Error| {
        Error::ReadConfig(Some(config_directory_path.to_owned()), Box::new(err))
    };

    let entries = match std::fs::read_dir(config_directory_path) {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(vec![]),
        Err(err) => return Err(read_dir_err(err)),
    };

    let mut patch_paths = vec![];
    for entry in entries {
        let entry = entry.map_err(read_dir_err)?;
        if !entry.file_type().map_err(read_dir_err)?.is_file() {
            continue;
        }

        let path = entry.path();
        if path.extension().and_then(std::ffi::OsStr::to_str) == Some("toml") {
            patch_paths.push(path);
        }
    }
    patch_paths.sort();

    Ok(patch_paths)
}

/// Tables are merged key by key, arrays are concatenated, and anything else in `patch` replaces `base`.
fn merge_toml(base: &mut toml::Value, patch: toml::Value) {
    match (base, patch) {
        (toml::Value::Table(base), toml::Value::Table(patch)) => {
            for (key, value) in patch {
                match base.get_mut(&key) {
                    Some(existing) => merge_toml(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }

        (toml::Value::Array(base), toml::Value::Array(patch)) => base.extend(patch),

        (base, patch) => *base = patch,
    }
}
