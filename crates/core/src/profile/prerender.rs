use std::sync::Arc;

use serde_json::json;
use wl_runtime::{Error, ProxyCore, Result};

use crate::capabilities;

/// Warms up pages a user is likely to open next, sharing the profile's storage.
pub struct PrerenderController {
	core: Arc<ProxyCore>,
}

impl PrerenderController {
	pub(crate) fn new(core: Arc<ProxyCore>) -> Self {
		Self { core }
	}

	pub async fn schedule_prerender(&self, uri: &str) -> Result<()> {
		self.core.check_capability(capabilities::PRERENDER)?;
		if uri.trim().is_empty() {
			return Err(Error::InvalidArgument("prerender requires a non-empty URI".to_string()));
		}
		self.core
			.call_no_result("schedulePrerender", json!({ "uri": uri }))
			.await
	}
}
