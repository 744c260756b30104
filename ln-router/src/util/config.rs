// This file is Copyright its original authors, visible in version control
// history.
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::{fs, io};

use bitcoin::Network;
use log::LevelFilter;
use serde::Deserialize;

const DEFAULT_CONFIG_FILE: &str = "config.toml";
const CHANNEL_DB_FILE: &str = "channel_db.sqlite3";

/// The directory the routing database lives in when the embedding wallet
/// does not override it.
pub fn get_default_data_dir() -> Option<PathBuf> {
	if cfg!(target_os = "windows") {
		std::env::var_os("APPDATA").map(|dir| PathBuf::from(dir).join("ln-router"))
	} else {
		std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".ln-router"))
	}
}

fn get_default_config_path() -> Option<PathBuf> {
	get_default_data_dir().map(|data_dir| data_dir.join(DEFAULT_CONFIG_FILE))
}

/// Configuration for the routing core.
#[derive(Debug)]
pub struct Config {
	pub network: Network,
	pub storage_dir_path: Option<String>,
	pub log_level: LevelFilter,
}

impl Config {
	/// Path of the channel database file under the configured (or default)
	/// data directory.
	pub fn channel_db_path(&self) -> io::Result<PathBuf> {
		let dir = match &self.storage_dir_path {
			Some(dir) => PathBuf::from(dir),
			None => get_default_data_dir().ok_or_else(|| {
				io::Error::new(
					io::ErrorKind::NotFound,
					"No storage directory configured and no home directory available.",
				)
			})?,
		};
		Ok(dir.join(CHANNEL_DB_FILE))
	}
}

#[derive(Default)]
struct ConfigBuilder {
	network: Option<Network>,
	storage_dir_path: Option<String>,
	log_level: Option<String>,
}

impl ConfigBuilder {
	fn merge_toml(&mut self, toml: TomlConfig) {
		if let Some(node) = toml.node {
			self.network = node.network.or(self.network);
		}

		if let Some(storage) = toml.storage {
			self.storage_dir_path =
				storage.disk.and_then(|d| d.dir_path).or(self.storage_dir_path.clone());
		}

		if let Some(log) = toml.log {
			self.log_level = log.level.or(self.log_level.clone());
		}
	}

	fn build(self) -> io::Result<Config> {
		let network = self.network.ok_or_else(|| missing_field_err("network"))?;

		let log_level = self
			.log_level
			.as_ref()
			.map(|level_str| {
				LevelFilter::from_str(level_str).map_err(|e| {
					io::Error::new(
						io::ErrorKind::InvalidInput,
						format!("Invalid log level configured: {}", e),
					)
				})
			})
			.transpose()?
			.unwrap_or(LevelFilter::Debug);

		Ok(Config { network, storage_dir_path: self.storage_dir_path, log_level })
	}
}

/// Configuration loaded from a TOML file.
#[derive(Deserialize)]
pub struct TomlConfig {
	node: Option<NodeConfig>,
	storage: Option<StorageConfig>,
	log: Option<LogConfig>,
}

#[derive(Deserialize)]
struct NodeConfig {
	network: Option<Network>,
}

#[derive(Deserialize)]
struct StorageConfig {
	disk: Option<DiskConfig>,
}

#[derive(Deserialize)]
struct DiskConfig {
	dir_path: Option<String>,
}

#[derive(Deserialize)]
struct LogConfig {
	level: Option<String>,
}

/// Loads the configuration from `config_file`, falling back to
/// `<data-dir>/config.toml` when it exists.
pub fn load_config(config_file: Option<&Path>) -> io::Result<Config> {
	let mut builder = ConfigBuilder::default();

	let config_file = match config_file {
		Some(path) => Some(path.to_path_buf()),
		None => get_default_config_path().filter(|path| path.exists()),
	};

	if let Some(path) = config_file {
		let content = fs::read_to_string(&path).map_err(|e| {
			io::Error::new(e.kind(), format!("Failed to read config file '{:?}': {}", path, e))
		})?;
		let toml_config: TomlConfig = toml::from_str(&content).map_err(|e| {
			io::Error::new(
				io::ErrorKind::InvalidData,
				format!("Config file contains invalid TOML format: {}", e),
			)
		})?;

		builder.merge_toml(toml_config);
	}

	builder.build()
}

fn missing_field_err(field: &str) -> io::Error {
	io::Error::new(
		io::ErrorKind::InvalidInput,
		format!("Missing `{}`. Please provide it via the config file.", field),
	)
}
