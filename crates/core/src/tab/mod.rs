//! Tab proxy and the controllers that live and die with it.

mod favicon;
mod find_in_page;
mod media_capture;

use std::collections::BTreeMap;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use serde_json::{Value, json};
use wl_protocol::{BrowserId, FaviconFetcherCreated, FaviconFetcherId, TabDescriptor, TabId};
use wl_runtime::{DestroyReason, Error, ObserverList, ProxyCore, Result};

pub use favicon::FaviconFetcher;
pub use find_in_page::FindInPageController;
pub use media_capture::MediaCaptureController;

use crate::browser::Browser;
use crate::callbacks::{FaviconFetcherCallback, NewTabCallback, TabCallback};
use crate::capabilities;
use crate::navigation::NavigationController;
use crate::session::{SessionCore, upgrade};

/// Upper bound on [`Tab::set_data`] payloads: the summed UTF-8 length of every key and value.
pub const MAX_TAB_DATA_BYTES: usize = 4096;

/// One tab of a [`Browser`].
///
/// A tab belongs to at most one browser at a time and may move between
/// browsers. Its [`NavigationController`], [`FindInPageController`] and
/// [`MediaCaptureController`] are created with it and share its lifetime.
pub struct Tab {
	id: TabId,
	guid: String,
	core: Arc<ProxyCore>,
	session: Weak<SessionCore>,
	browser: Mutex<Option<BrowserId>>,
	navigation_controller: Arc<NavigationController>,
	find_in_page: Arc<FindInPageController>,
	media_capture: Arc<MediaCaptureController>,
	favicon_fetchers: Mutex<Vec<FaviconFetcherId>>,
	callbacks: ObserverList<dyn TabCallback>,
	new_tab_callback: Mutex<Option<Arc<dyn NewTabCallback>>>,
}

impl Tab {
	pub(crate) fn new(descriptor: &TabDescriptor, session: &Arc<SessionCore>) -> Arc<Self> {
		let core = Arc::new(ProxyCore::new(
			format!("Tab({})", descriptor.id),
			descriptor.id.object_ref(),
			Arc::clone(session.context()),
		));
		Arc::new(Self {
			id: descriptor.id,
			guid: descriptor.guid.clone(),
			navigation_controller: Arc::new(NavigationController::new(descriptor.id, Arc::clone(&core))),
			find_in_page: Arc::new(FindInPageController::new(Arc::clone(&core))),
			media_capture: Arc::new(MediaCaptureController::new(Arc::clone(&core))),
			core,
			session: Arc::downgrade(session),
			browser: Mutex::new(None),
			favicon_fetchers: Mutex::new(Vec::new()),
			callbacks: ObserverList::new(),
			new_tab_callback: Mutex::new(None),
		})
	}

	pub fn id(&self) -> TabId {
		self.id
	}

	/// Identifier that survives restarts of the embedding application.
	pub fn guid(&self) -> &str {
		&self.guid
	}

	pub fn is_destroyed(&self) -> bool {
		self.core.is_destroyed()
	}

	/// The browser this tab currently belongs to.
	pub fn browser(&self) -> Result<Option<Arc<Browser>>> {
		self.core.check_access()?;
		let Some(id) = *self.browser.lock() else {
			return Ok(None);
		};
		Ok(upgrade(&self.session)?.browsers.lookup(&id))
	}

	pub fn navigation_controller(&self) -> &Arc<NavigationController> {
		&self.navigation_controller
	}

	pub fn find_in_page_controller(&self) -> &Arc<FindInPageController> {
		&self.find_in_page
	}

	pub fn media_capture_controller(&self) -> &Arc<MediaCaptureController> {
		&self.media_capture
	}

	pub fn register_tab_callback(&self, callback: Arc<dyn TabCallback>) -> Result<bool> {
		self.core.check_access()?;
		Ok(self.callbacks.add(callback))
	}

	pub fn unregister_tab_callback(&self, callback: &Arc<dyn TabCallback>) -> Result<bool> {
		self.core.check_access()?;
		Ok(self.callbacks.remove(callback))
	}

	/// Installs or clears the handler for tabs opened by page content.
	///
	/// The engine only creates such tabs while a handler is installed.
	pub async fn set_new_tab_callback(&self, callback: Option<Arc<dyn NewTabCallback>>) -> Result<()> {
		self.core.check_access()?;
		let enabled = callback.is_some();
		self.core
			.call_no_result("setNewTabsEnabled", json!({ "enabled": enabled }))
			.await?;
		*self.new_tab_callback.lock() = callback;
		Ok(())
	}

	/// Stores `data` with the tab, replacing what was there.
	///
	/// Fails with [`Error::InvalidArgument`] when the summed UTF-8 length of
	/// keys and values exceeds [`MAX_TAB_DATA_BYTES`].
	pub async fn set_data(&self, data: &BTreeMap<String, String>) -> Result<()> {
		self.core.check_capability(capabilities::TAB_DATA)?;
		let size = tab_data_size(data);
		if size > MAX_TAB_DATA_BYTES {
			return Err(Error::InvalidArgument(format!(
				"tab data is {size} bytes, the limit is {MAX_TAB_DATA_BYTES}"
			)));
		}
		self.core.call_no_result("setData", json!({ "data": data })).await
	}

	pub async fn get_data(&self) -> Result<BTreeMap<String, String>> {
		self.core.call_gated(capabilities::TAB_DATA, "getData", Value::Null).await
	}

	/// Runs before-unload handlers and closes the tab if they allow it.
	///
	/// Completion is reported through [`crate::TabListCallback::on_tab_removed`].
	pub async fn dispatch_before_unload_and_close(&self) -> Result<()> {
		self.core.call_no_result("dispatchBeforeUnloadAndClose", Value::Null).await
	}

	/// Dismisses transient UI such as a fullscreen video or an open select popup.
	///
	/// Returns true if something was dismissed.
	pub async fn dismiss_transient_ui(&self) -> Result<bool> {
		self.core.call("dismissTransientUi", Value::Null).await
	}

	pub async fn execute_script(&self, script: &str, use_separate_isolate: bool) -> Result<Value> {
		self.core
			.call(
				"executeScript",
				json!({ "script": script, "useSeparateIsolate": use_separate_isolate }),
			)
			.await
	}

	/// Starts tracking the favicon of whatever page this tab displays.
	pub async fn create_favicon_fetcher(
		&self,
		callback: Arc<dyn FaviconFetcherCallback>,
	) -> Result<Arc<FaviconFetcher>> {
		let created: FaviconFetcherCreated = self
			.core
			.call_gated(capabilities::FAVICON_FETCHER, "createFaviconFetcher", Value::Null)
			.await?;
		let session = upgrade(&self.session)?;
		let fetcher = FaviconFetcher::new(created.id, self.id, callback, session.context());
		session.register_favicon_fetcher(&fetcher)?;
		self.favicon_fetchers.lock().push(created.id);
		Ok(fetcher)
	}

	pub(crate) fn callbacks(&self) -> &ObserverList<dyn TabCallback> {
		&self.callbacks
	}

	pub(crate) fn new_tab_callback(&self) -> Option<Arc<dyn NewTabCallback>> {
		self.new_tab_callback.lock().clone()
	}

	pub(crate) fn browser_id(&self) -> Option<BrowserId> {
		*self.browser.lock()
	}

	pub(crate) fn set_browser(&self, browser: Option<BrowserId>) {
		*self.browser.lock() = browser;
	}

	pub(crate) fn forget_favicon_fetcher(&self, id: FaviconFetcherId) {
		self.favicon_fetchers.lock().retain(|f| *f != id);
	}

	pub(crate) fn take_favicon_fetchers(&self) -> Vec<FaviconFetcherId> {
		std::mem::take(&mut *self.favicon_fetchers.lock())
	}

	#[track_caller]
	pub(crate) fn mark_destroyed(&self, reason: DestroyReason) -> bool {
		let first = self.core.mark_destroyed(reason);
		if first {
			self.callbacks.clear();
			self.new_tab_callback.lock().take();
			self.find_in_page.clear();
			self.media_capture.clear();
		}
		first
	}
}

impl std::fmt::Debug for Tab {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Tab")
			.field("id", &self.id)
			.field("guid", &self.guid)
			.field("browser", &self.browser_id())
			.field("destroyed", &self.is_destroyed())
			.finish()
	}
}

fn tab_data_size(data: &BTreeMap<String, String>) -> usize {
	data.iter().map(|(k, v)| k.len() + v.len()).sum()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn data_size_counts_utf8_bytes_of_keys_and_values() {
		let mut data = BTreeMap::new();
		data.insert("k".to_string(), "v".repeat(10));
		data.insert("é".to_string(), String::new());
		assert_eq!(tab_data_size(&data), 1 + 10 + 2);
	}
}
