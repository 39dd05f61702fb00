use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use wl_protocol::{Favicon, FaviconFetcherId, TabId};
use wl_runtime::{DestroyReason, ProxyContext, ProxyCore, Result};

use crate::callbacks::FaviconFetcherCallback;

/// Tracks the favicon of the page shown in one tab.
pub struct FaviconFetcher {
	id: FaviconFetcherId,
	tab: TabId,
	core: ProxyCore,
	favicon: Mutex<Option<Favicon>>,
	callback: Arc<dyn FaviconFetcherCallback>,
}

impl FaviconFetcher {
	pub(crate) fn new(
		id: FaviconFetcherId,
		tab: TabId,
		callback: Arc<dyn FaviconFetcherCallback>,
		context: &Arc<ProxyContext>,
	) -> Arc<Self> {
		Arc::new(Self {
			id,
			tab,
			core: ProxyCore::new(format!("FaviconFetcher({id})"), id.object_ref(), Arc::clone(context)),
			favicon: Mutex::new(None),
			callback,
		})
	}

	pub fn id(&self) -> FaviconFetcherId {
		self.id
	}

	pub fn tab_id(&self) -> TabId {
		self.tab
	}

	pub fn is_destroyed(&self) -> bool {
		self.core.is_destroyed()
	}

	/// The most recent favicon the engine reported, if any.
	pub fn favicon_for_display(&self) -> Result<Option<Favicon>> {
		self.core.check_access()?;
		Ok(self.favicon.lock().clone())
	}

	/// Asks the engine to stop fetching. The proxy is destroyed once the engine confirms.
	pub async fn destroy(&self) -> Result<()> {
		self.core.call_no_result("destroy", Value::Null).await
	}

	pub(crate) fn handle_favicon_changed(&self, favicon: Option<Favicon>) {
		*self.favicon.lock() = favicon.clone();
		self.callback.on_favicon_changed(favicon.as_ref());
	}

	#[track_caller]
	pub(crate) fn mark_destroyed(&self, reason: DestroyReason) -> bool {
		self.core.mark_destroyed(reason)
	}
}

impl std::fmt::Debug for FaviconFetcher {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("FaviconFetcher")
			.field("id", &self.id)
			.field("tab", &self.tab)
			.field("destroyed", &self.is_destroyed())
			.finish()
	}
}
