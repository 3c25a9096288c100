//! Engine configuration
//!
//! The engine itself is configured once (intervals, concurrency caps). The
//! Ric fleet is configured externally and refreshed at runtime: each refresh
//! produces a new list of [`RicConfig`]s, which [`diff_ric_configs`] turns
//! into per-Ric ADDED/CHANGED/REMOVED updates for the engine to apply.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::{info, warn};
use url::Url;

/// Static configuration for one Ric.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RicConfig {
	/// Unique Ric identity.
	pub ric_id: String,
	/// Base URL of the Ric's A1 interface.
	pub base_url: Url,
	/// Elements managed by this Ric, used for policy routing lookups.
	#[serde(default)]
	pub managed_element_ids: Vec<String>,
	/// Optional controller the A1 traffic is routed through.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub controller_name: Option<String>,
}

/// A per-Ric configuration change produced by a refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RicConfigUpdate {
	/// A Ric id seen for the first time.
	Added(RicConfig),
	/// Static fields of a known Ric changed.
	Changed(RicConfig),
	/// A Ric id no longer present in the configuration.
	Removed(RicConfig),
}

/// Compute the per-Ric updates needed to go from `old` to `new`.
pub fn diff_ric_configs(old: &[RicConfig], new: &[RicConfig]) -> Vec<RicConfigUpdate> {
	let old_by_id: HashMap<&str, &RicConfig> =
		old.iter().map(|c| (c.ric_id.as_str(), c)).collect();
	let new_ids: HashMap<&str, &RicConfig> = new.iter().map(|c| (c.ric_id.as_str(), c)).collect();

	let mut updates = Vec::new();
	for config in new {
		match old_by_id.get(config.ric_id.as_str()) {
			None => updates.push(RicConfigUpdate::Added(config.clone())),
			Some(previous) if *previous != config => {
				updates.push(RicConfigUpdate::Changed(config.clone()));
			}
			Some(_) => {}
		}
	}
	for config in old {
		if !new_ids.contains_key(config.ric_id.as_str()) {
			updates.push(RicConfigUpdate::Removed(config.clone()));
		}
	}
	updates
}

/// Main engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
	/// Interval between endpoint supervision sweeps, in milliseconds.
	#[serde(default = "default_supervision_interval_ms")]
	pub ric_supervision_interval_ms: u64,

	/// Interval between service supervision sweeps, in milliseconds. Test
	/// configurations may set sub-second values.
	#[serde(default = "default_supervision_interval_ms")]
	pub service_supervision_interval_ms: u64,

	/// Maximum concurrent per-Ric checks in one supervision sweep.
	#[serde(default = "default_supervision_concurrency")]
	pub supervision_concurrency: usize,

	/// Maximum concurrent service callbacks in one notification fan-out.
	#[serde(default = "default_notification_concurrency")]
	pub notification_concurrency: usize,

	/// Rics known at startup. Refreshes replace this list via
	/// [`diff_ric_configs`].
	#[serde(default)]
	pub rics: Vec<RicConfig>,
}

fn default_supervision_interval_ms() -> u64 {
	60_000
}

fn default_supervision_concurrency() -> usize {
	50
}

fn default_notification_concurrency() -> usize {
	10
}

impl Default for EngineConfig {
	fn default() -> Self {
		Self {
			ric_supervision_interval_ms: default_supervision_interval_ms(),
			service_supervision_interval_ms: default_supervision_interval_ms(),
			supervision_concurrency: default_supervision_concurrency(),
			notification_concurrency: default_notification_concurrency(),
			rics: Vec::new(),
		}
	}
}

impl EngineConfig {
	/// Load configuration from a JSON file, falling back to defaults when
	/// the file does not exist.
	pub fn load_from(path: &Path) -> Result<Self> {
		if path.exists() {
			info!("Loading engine config from {:?}", path);
			let json = fs::read_to_string(path)?;
			Ok(serde_json::from_str(&json)?)
		} else {
			warn!("No engine config at {:?}, using defaults", path);
			Ok(Self::default())
		}
	}

	/// Save configuration to a JSON file.
	pub fn save(&self, path: &Path) -> Result<()> {
		if let Some(parent) = path.parent() {
			fs::create_dir_all(parent)?;
		}
		let json = serde_json::to_string_pretty(self)?;
		fs::write(path, json)?;
		info!("Saved engine config to {:?}", path);
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use pretty_assertions::assert_eq;

	fn ric_config(id: &str, port: u16) -> RicConfig {
		RicConfig {
			ric_id: id.to_string(),
			base_url: Url::parse(&format!("http://localhost:{port}")).unwrap(),
			managed_element_ids: Vec::new(),
			controller_name: None,
		}
	}

	#[test]
	fn test_diff_detects_added_changed_removed() {
		let old = vec![ric_config("ric1", 8081), ric_config("ric2", 8082)];
		let new = vec![ric_config("ric2", 9999), ric_config("ric3", 8083)];

		let updates = diff_ric_configs(&old, &new);
		assert_eq!(
			updates,
			vec![
				RicConfigUpdate::Changed(ric_config("ric2", 9999)),
				RicConfigUpdate::Added(ric_config("ric3", 8083)),
				RicConfigUpdate::Removed(ric_config("ric1", 8081)),
			]
		);
	}

	#[test]
	fn test_diff_of_identical_configs_is_empty() {
		let configs = vec![ric_config("ric1", 8081)];
		assert!(diff_ric_configs(&configs, &configs).is_empty());
	}

	#[test]
	fn test_config_roundtrip() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("engine.json");

		let mut config = EngineConfig::default();
		config.service_supervision_interval_ms = 500;
		config.rics.push(ric_config("ric1", 8081));
		config.save(&path).unwrap();

		let loaded = EngineConfig::load_from(&path).unwrap();
		assert_eq!(loaded.service_supervision_interval_ms, 500);
		assert_eq!(loaded.rics, config.rics);
	}

	#[test]
	fn test_missing_config_falls_back_to_defaults() {
		let dir = tempfile::tempdir().unwrap();
		let config = EngineConfig::load_from(&dir.path().join("absent.json")).unwrap();
		assert_eq!(config.ric_supervision_interval_ms, 60_000);
		assert_eq!(config.supervision_concurrency, 50);
		assert_eq!(config.notification_concurrency, 10);
	}
}
