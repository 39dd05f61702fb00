use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::json;
use wl_protocol::FindResult;
use wl_runtime::{Error, ProxyCore, Result};

use crate::callbacks::FindInPageCallback;

/// Find-in-page for one tab. Searching requires a callback to report results to.
pub struct FindInPageController {
	core: Arc<ProxyCore>,
	callback: Mutex<Option<Arc<dyn FindInPageCallback>>>,
}

impl FindInPageController {
	pub(crate) fn new(core: Arc<ProxyCore>) -> Self {
		Self {
			core,
			callback: Mutex::new(None),
		}
	}

	/// Starts or ends a find session.
	///
	/// Returns false if the engine refused to start one, for example because
	/// the tab is not visible. Passing `None` ends the session and clears the highlight.
	pub async fn set_find_in_page_callback(&self, callback: Option<Arc<dyn FindInPageCallback>>) -> Result<bool> {
		self.core.check_access()?;
		let enabled = callback.is_some();
		let accepted: bool = self
			.core
			.call("setFindInPageCallback", json!({ "enabled": enabled }))
			.await?;
		if accepted || !enabled {
			*self.callback.lock() = callback;
		}
		Ok(accepted)
	}

	/// Searches for `text`, moving forward or backward from the active match.
	pub async fn find(&self, text: &str, forward: bool) -> Result<()> {
		self.core.check_access()?;
		if self.callback.lock().is_none() {
			return Err(Error::InvalidState(
				"find requires a find-in-page callback".to_string(),
			));
		}
		self.core
			.call_no_result("find", json!({ "text": text, "forward": forward }))
			.await
	}

	pub(crate) fn handle_find_result(&self, result: &FindResult) {
		if let Some(callback) = self.current() {
			callback.on_find_result(result);
		}
	}

	pub(crate) fn handle_find_ended(&self) {
		if let Some(callback) = self.current() {
			callback.on_find_ended();
		}
	}

	pub(crate) fn clear(&self) {
		self.callback.lock().take();
	}

	fn current(&self) -> Option<Arc<dyn FindInPageCallback>> {
		self.callback.lock().clone()
	}
}
