//! Browser proxy: an ordered set of tabs, one of them active.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::{Value, json};
use wl_protocol::{BrowserId, FragmentId, TabDescriptor, TabId};
use wl_runtime::{DestroyReason, Error, ObserverList, ProxyCore, Result};

use crate::callbacks::TabListCallback;
use crate::event_bridge::EventBridge;
use crate::profile::Profile;
use crate::session::{SessionCore, upgrade};
use crate::tab::Tab;

#[derive(Default)]
struct TabList {
	ids: Vec<TabId>,
	active: Option<TabId>,
}

#[derive(Deserialize)]
struct FragmentCreated {
	id: FragmentId,
}

/// A window-like container of tabs bound to one [`Profile`].
///
/// Membership and the active tab change only when the engine reports the
/// change; requests such as [`Browser::set_active_tab`] return before the
/// state they ask for is visible.
pub struct Browser {
	id: BrowserId,
	core: ProxyCore,
	session: Weak<SessionCore>,
	profile: Arc<Profile>,
	tabs: Mutex<TabList>,
	list_callbacks: ObserverList<dyn TabListCallback>,
}

impl Browser {
	pub(crate) fn new(id: BrowserId, profile: Arc<Profile>, session: &Arc<SessionCore>) -> Arc<Self> {
		Arc::new(Self {
			id,
			core: ProxyCore::new(format!("Browser({id})"), id.object_ref(), Arc::clone(session.context())),
			session: Arc::downgrade(session),
			profile,
			tabs: Mutex::new(TabList::default()),
			list_callbacks: ObserverList::new(),
		})
	}

	pub fn id(&self) -> BrowserId {
		self.id
	}

	pub fn profile(&self) -> &Arc<Profile> {
		&self.profile
	}

	pub fn is_destroyed(&self) -> bool {
		self.core.is_destroyed()
	}

	/// Tabs in display order.
	pub fn tabs(&self) -> Result<Vec<Arc<Tab>>> {
		self.core.check_access()?;
		let session = upgrade(&self.session)?;
		let ids = self.tabs.lock().ids.clone();
		Ok(ids.iter().filter_map(|id| session.tabs.lookup(id)).collect())
	}

	pub fn active_tab(&self) -> Result<Option<Arc<Tab>>> {
		self.core.check_access()?;
		let Some(id) = self.tabs.lock().active else {
			return Ok(None);
		};
		Ok(upgrade(&self.session)?.tabs.lookup(&id))
	}

	/// Asks the engine to activate `tab`, which must belong to this browser.
	pub async fn set_active_tab(&self, tab: &Arc<Tab>) -> Result<()> {
		self.core.check_access()?;
		self.ensure_member(tab)?;
		self.core
			.call_no_result("setActiveTab", json!({ "tab": tab.id() }))
			.await
	}

	/// Creates a tab. It joins the browser once the engine reports it added.
	pub async fn create_tab(&self) -> Result<Arc<Tab>> {
		let descriptor: TabDescriptor = self.core.call("createTab", Value::Null).await?;
		upgrade(&self.session)?.tab_for(&descriptor)
	}

	/// Moves `tab` into this browser, removing it from its current one.
	pub async fn add_tab(&self, tab: &Arc<Tab>) -> Result<()> {
		self.core.check_access()?;
		if tab.is_destroyed() {
			return Err(Error::InvalidArgument(format!("tab {} is destroyed", tab.id())));
		}
		if self.contains(tab.id()) {
			return Ok(());
		}
		self.core
			.call_no_result("addTab", json!({ "tab": tab.id() }))
			.await
	}

	/// Destroys `tab`, which must belong to this browser, without running unload handlers.
	pub async fn destroy_tab(&self, tab: &Arc<Tab>) -> Result<()> {
		self.core.check_access()?;
		self.ensure_member(tab)?;
		self.core
			.call_no_result("destroyTab", json!({ "tab": tab.id() }))
			.await
	}

	/// Handles a back gesture. Returns true if it was consumed.
	///
	/// In order of preference: dismiss transient UI in the active tab, go
	/// back in its history, or close it and activate the tab before it.
	pub async fn try_navigate_back(&self) -> Result<bool> {
		self.core.check_access()?;
		let Some(active) = self.active_tab()? else {
			return Ok(false);
		};
		if active.dismiss_transient_ui().await? {
			return Ok(true);
		}
		let controller = active.navigation_controller();
		if controller.can_go_back().await? {
			controller.go_back_unchecked().await?;
			return Ok(true);
		}
		let Some(preceding) = self.preceding_tab(active.id())? else {
			return Ok(false);
		};
		active.dispatch_before_unload_and_close().await?;
		self.set_active_tab(&preceding).await?;
		Ok(true)
	}

	pub fn register_tab_list_callback(&self, callback: Arc<dyn TabListCallback>) -> Result<bool> {
		self.core.check_access()?;
		Ok(self.list_callbacks.add(callback))
	}

	pub fn unregister_tab_list_callback(&self, callback: &Arc<dyn TabListCallback>) -> Result<bool> {
		self.core.check_access()?;
		Ok(self.list_callbacks.remove(callback))
	}

	/// Creates the engine half of a hosted rendering surface for this browser.
	pub async fn create_fragment_event_bridge(&self) -> Result<EventBridge> {
		let FragmentCreated { id } = self.core.call("createFragment", Value::Null).await?;
		Ok(EventBridge::new(id, self.core.context()))
	}

	pub(crate) fn contains(&self, tab: TabId) -> bool {
		self.tabs.lock().ids.contains(&tab)
	}

	pub(crate) fn handle_tab_added(&self, tab: &Arc<Tab>) {
		{
			let mut tabs = self.tabs.lock();
			if tabs.ids.contains(&tab.id()) {
				tracing::debug!(browser = %self.id, tab = %tab.id(), "tab already a member");
				return;
			}
			tabs.ids.push(tab.id());
		}
		tab.set_browser(Some(self.id));
		self.list_callbacks.for_each(|cb| cb.on_tab_added(tab));
	}

	pub(crate) fn handle_tab_removed(&self, tab: &Arc<Tab>) {
		let was_active = {
			let mut tabs = self.tabs.lock();
			let Some(position) = tabs.ids.iter().position(|id| *id == tab.id()) else {
				tracing::warn!(browser = %self.id, tab = %tab.id(), "removal of a tab that is not a member");
				return;
			};
			tabs.ids.remove(position);
			let was_active = tabs.active == Some(tab.id());
			if was_active {
				tabs.active = None;
			}
			was_active
		};
		if tab.browser_id() == Some(self.id) {
			tab.set_browser(None);
		}
		if was_active {
			self.list_callbacks.for_each(|cb| cb.on_active_tab_changed(None));
		}
		self.list_callbacks.for_each(|cb| cb.on_tab_removed(tab));
	}

	pub(crate) fn handle_active_tab_changed(&self, tab: Option<&Arc<Tab>>) {
		{
			let mut tabs = self.tabs.lock();
			let next = tab.map(|t| t.id());
			if let Some(id) = next.filter(|id| !tabs.ids.contains(id)) {
				tracing::warn!(browser = %self.id, tab = %id, "activation of a tab that is not a member");
				return;
			}
			if tabs.active == next {
				return;
			}
			tabs.active = next;
		}
		self.list_callbacks.for_each(|cb| cb.on_active_tab_changed(tab));
	}

	pub(crate) fn handle_will_destroy(&self) {
		self.list_callbacks
			.for_each(|cb| cb.on_will_destroy_browser_and_all_tabs());
	}

	/// Empties the tab list, returning the former members.
	pub(crate) fn take_members(&self) -> Vec<TabId> {
		let mut tabs = self.tabs.lock();
		tabs.active = None;
		std::mem::take(&mut tabs.ids)
	}

	#[track_caller]
	pub(crate) fn mark_destroyed(&self, reason: DestroyReason) -> bool {
		self.core.mark_destroyed(reason)
	}

	pub(crate) fn clear_callbacks(&self) {
		self.list_callbacks.clear();
	}

	fn ensure_member(&self, tab: &Arc<Tab>) -> Result<()> {
		if self.contains(tab.id()) {
			Ok(())
		} else {
			Err(Error::InvalidState(format!(
				"tab {} does not belong to {}",
				tab.id(),
				self.core.label()
			)))
		}
	}

	fn preceding_tab(&self, tab: TabId) -> Result<Option<Arc<Tab>>> {
		let previous = {
			let tabs = self.tabs.lock();
			match tabs.ids.iter().position(|id| *id == tab) {
				Some(position) if position > 0 => Some(tabs.ids[position - 1]),
				_ => None,
			}
		};
		let Some(previous) = previous else {
			return Ok(None);
		};
		Ok(upgrade(&self.session)?.tabs.lookup(&previous))
	}
}

impl std::fmt::Debug for Browser {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let tabs = self.tabs.lock();
		f.debug_struct("Browser")
			.field("id", &self.id)
			.field("profile", self.profile.key())
			.field("tabs", &tabs.ids)
			.field("active", &tabs.active)
			.field("destroyed", &self.is_destroyed())
			.finish()
	}
}
