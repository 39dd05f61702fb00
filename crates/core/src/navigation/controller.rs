use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::{Value, json};
use wl_protocol::{NavigateParams, NavigationDescriptor, NavigationId, NavigationInfo, TabId};
use wl_runtime::{DestroyReason, Error, ObserverList, ProxyCore, Result};

use super::{Navigation, NavigationPhase};
use crate::callbacks::NavigationCallback;
use crate::capabilities;
use crate::session::SessionCore;

/// Starts navigations in one tab and reports their progress.
///
/// Created together with its tab and shares the tab's liveness.
pub struct NavigationController {
	tab: TabId,
	core: Arc<ProxyCore>,
	callbacks: ObserverList<dyn NavigationCallback>,
	in_flight: Mutex<Vec<NavigationId>>,
}

impl NavigationController {
	pub(crate) fn new(tab: TabId, core: Arc<ProxyCore>) -> Self {
		Self {
			tab,
			core,
			callbacks: ObserverList::new(),
			in_flight: Mutex::new(Vec::new()),
		}
	}

	pub fn tab_id(&self) -> TabId {
		self.tab
	}

	pub async fn navigate(&self, uri: &str, params: NavigateParams) -> Result<()> {
		self.core.check_access()?;
		if params.intent_processing_disabled {
			self.core.check_capability(capabilities::DISABLE_INTENT_PROCESSING)?;
		}
		if params.network_error_auto_reload_disabled {
			self.core
				.check_capability(capabilities::DISABLE_NETWORK_ERROR_AUTO_RELOAD)?;
		}
		if uri.trim().is_empty() {
			return Err(Error::InvalidArgument("navigate requires a non-empty URI".to_string()));
		}
		self.core
			.call_no_result("navigate", json!({ "uri": uri, "params": params }))
			.await
	}

	/// Fails with [`Error::InvalidState`] when there is no earlier history entry.
	pub async fn go_back(&self) -> Result<()> {
		if !self.can_go_back().await? {
			return Err(Error::InvalidState("no history entry to go back to".to_string()));
		}
		self.go_back_unchecked().await
	}

	/// Goes back without asking the engine first, for callers that already did.
	pub(crate) async fn go_back_unchecked(&self) -> Result<()> {
		self.core.call_no_result("goBack", Value::Null).await
	}

	/// Fails with [`Error::InvalidState`] when there is no later history entry.
	pub async fn go_forward(&self) -> Result<()> {
		if !self.can_go_forward().await? {
			return Err(Error::InvalidState("no history entry to go forward to".to_string()));
		}
		self.core.call_no_result("goForward", Value::Null).await
	}

	pub async fn can_go_back(&self) -> Result<bool> {
		self.core.call("canGoBack", Value::Null).await
	}

	pub async fn can_go_forward(&self) -> Result<bool> {
		self.core.call("canGoForward", Value::Null).await
	}

	/// Fails with [`Error::InvalidArgument`] when `index` is outside the history list.
	pub async fn go_to_index(&self, index: usize) -> Result<()> {
		self.check_index(index).await?;
		self.core.call_no_result("goToIndex", json!({ "index": index })).await
	}

	pub async fn reload(&self) -> Result<()> {
		self.core.call_no_result("reload", Value::Null).await
	}

	pub async fn stop(&self) -> Result<()> {
		self.core.call_no_result("stop", Value::Null).await
	}

	pub async fn navigation_list_size(&self) -> Result<usize> {
		self.core.call("getNavigationListSize", Value::Null).await
	}

	/// `None` when the history list is empty.
	pub async fn navigation_list_current_index(&self) -> Result<Option<usize>> {
		let index: i64 = self.core.call("getNavigationListCurrentIndex", Value::Null).await?;
		Ok(usize::try_from(index).ok())
	}

	pub async fn navigation_entry_display_uri(&self, index: usize) -> Result<String> {
		self.check_index(index).await?;
		self.core
			.call("getNavigationEntryDisplayUri", json!({ "index": index }))
			.await
	}

	pub async fn navigation_entry_title(&self, index: usize) -> Result<String> {
		self.check_index(index).await?;
		self.core
			.call("getNavigationEntryTitle", json!({ "index": index }))
			.await
	}

	pub fn register_navigation_callback(&self, callback: Arc<dyn NavigationCallback>) -> Result<bool> {
		self.core.check_access()?;
		Ok(self.callbacks.add(callback))
	}

	pub fn unregister_navigation_callback(&self, callback: &Arc<dyn NavigationCallback>) -> Result<bool> {
		self.core.check_access()?;
		Ok(self.callbacks.remove(callback))
	}

	/// Registers a fresh [`Navigation`] and announces it.
	pub(crate) fn handle_started(&self, session: &Arc<SessionCore>, descriptor: NavigationDescriptor) -> Result<()> {
		let id = descriptor.id;
		if session.navigations.contains(&id) {
			return Err(Error::Protocol(format!("navigation {id} started twice")));
		}
		let navigation = Navigation::new(self.tab, descriptor, session.context());
		session.navigations.register(id, Arc::clone(&navigation))?;
		self.in_flight.lock().push(id);
		self.callbacks.for_each(|cb| cb.on_navigation_started(&navigation));
		Ok(())
	}

	pub(crate) fn handle_redirected(&self, navigation: &Arc<Navigation>, info: NavigationInfo) -> Result<()> {
		navigation.advance(NavigationPhase::Redirected, info)?;
		self.callbacks.for_each(|cb| cb.on_navigation_redirected(navigation));
		Ok(())
	}

	/// Announces the terminal event, then destroys and unregisters the navigation.
	pub(crate) fn handle_finished(
		&self,
		session: &SessionCore,
		navigation: &Arc<Navigation>,
		phase: NavigationPhase,
		info: NavigationInfo,
	) -> Result<()> {
		navigation.advance(phase, info)?;
		match phase {
			NavigationPhase::Failed => self.callbacks.for_each(|cb| cb.on_navigation_failed(navigation)),
			_ => self.callbacks.for_each(|cb| cb.on_navigation_completed(navigation)),
		}
		navigation.mark_destroyed(DestroyReason::NavigationFinished);
		self.in_flight.lock().retain(|id| *id != navigation.id());
		session.navigations.unregister(&navigation.id())?;
		Ok(())
	}

	pub(crate) fn handle_load_state_changed(&self, is_loading: bool, should_show_loading_ui: bool) {
		self.callbacks
			.for_each(|cb| cb.on_load_state_changed(is_loading, should_show_loading_ui));
	}

	pub(crate) fn handle_load_progress_changed(&self, progress: f64) {
		let progress = progress.clamp(0.0, 1.0);
		self.callbacks.for_each(|cb| cb.on_load_progress_changed(progress));
	}

	pub(crate) fn handle_first_contentful_paint(&self) {
		self.callbacks.for_each(|cb| cb.on_first_contentful_paint());
	}

	/// Drops every unfinished navigation along with the tab.
	pub(crate) fn abandon_in_flight(&self, session: &SessionCore) {
		let ids = std::mem::take(&mut *self.in_flight.lock());
		for id in ids {
			if let Ok(navigation) = session.navigations.unregister(&id) {
				navigation.mark_destroyed(DestroyReason::OwnerDestroyed);
			}
		}
		self.callbacks.clear();
	}

	async fn check_index(&self, index: usize) -> Result<()> {
		let size = self.navigation_list_size().await?;
		if index >= size {
			return Err(Error::InvalidArgument(format!(
				"history index {index} is out of range for {size} entries"
			)));
		}
		Ok(())
	}
}
