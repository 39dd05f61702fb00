use std::time::Duration;

use serde::Deserialize;
use wl_runtime::{Error, Result};

/// Session-wide settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct SessionConfig {
	/// Upper bound on a single engine call, in milliseconds. `None` waits forever.
	pub call_timeout_ms: Option<u64>,
	/// Name of the session thread in diagnostics.
	pub thread_label: String,
	/// Queued-notification count above which [`crate::Session::run`] logs a warning.
	pub notification_backlog_warning: usize,
}

impl Default for SessionConfig {
	fn default() -> Self {
		Self::new()
	}
}

impl SessionConfig {
	pub fn new() -> Self {
		Self {
			call_timeout_ms: Some(30_000),
			thread_label: "session".to_string(),
			notification_backlog_warning: 256,
		}
	}

	/// Parses a JSON document. Missing fields keep their defaults.
	pub fn from_json(json: &str) -> Result<Self> {
		serde_json::from_str(json).map_err(|e| Error::InvalidArgument(format!("session config: {e}")))
	}

	pub fn call_timeout(&self) -> Option<Duration> {
		self.call_timeout_ms.map(Duration::from_millis)
	}
}
