//! The session: one engine connection and the proxy graph built on it.
//!
//! A [`Session`] owns every registry. Proxies point back at it weakly, so
//! dropping the session tears the graph down without reference cycles.
//! Engine notifications enter through [`Session::dispatch`] (or
//! [`Session::run`] draining the loader's channel) and are routed to the
//! proxy they name. Notifications that name unknown objects, or arrive out
//! of order, are logged and dropped.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::mpsc;
use wl_protocol::{
	BrowserId, Favicon, FaviconFetcherId, NavigationId, Notification, ObjectKind, ObjectRef, ProfileDescriptor, ProfileId,
	TabDescriptor, TabId,
};
use wl_runtime::{
	Capability, DestroyReason, EngineLoader, Error, LoadedEngine, MIN_SUPPORTED_ENGINE_VERSION, ProxyContext,
	ProxyCore, ProxyRegistry, Result, ThreadChecker, VersionGate,
};

use crate::browser::Browser;
use crate::config::SessionConfig;
use crate::navigation::{Navigation, NavigationPhase};
use crate::profile::{CookieSubscription, Profile, ProfileKey, validate_profile_name};
use crate::tab::{FaviconFetcher, Tab};

/// Upgrades a proxy's back-reference, failing once the session is gone.
pub(crate) fn upgrade(session: &Weak<SessionCore>) -> Result<Arc<SessionCore>> {
	session
		.upgrade()
		.ok_or_else(|| Error::InvalidState("session closed".to_string()))
}

/// Upper bound on favicon updates held for fetchers whose creation reply is still pending.
const MAX_EARLY_FAVICONS: usize = 64;

#[derive(Deserialize)]
struct BrowserCreated {
	id: BrowserId,
}

/// Registries and the engine root proxy.
pub(crate) struct SessionCore {
	engine: ProxyCore,
	pub(crate) browsers: ProxyRegistry<BrowserId, Browser>,
	pub(crate) tabs: ProxyRegistry<TabId, Tab>,
	pub(crate) navigations: ProxyRegistry<NavigationId, Navigation>,
	pub(crate) profiles: ProxyRegistry<ProfileKey, Profile>,
	pub(crate) favicon_fetchers: ProxyRegistry<FaviconFetcherId, FaviconFetcher>,
	/// Latest `FaviconChanged` per fetcher that arrived before the fetcher was registered.
	early_favicons: Mutex<HashMap<FaviconFetcherId, Option<Favicon>>>,
}

impl SessionCore {
	pub(crate) fn context(&self) -> &Arc<ProxyContext> {
		self.engine.context()
	}

	/// The single proxy for `descriptor`, created on first mention.
	pub(crate) fn tab_for(self: &Arc<Self>, descriptor: &TabDescriptor) -> Result<Arc<Tab>> {
		let (tab, created) = self
			.tabs
			.get_or_register_with(descriptor.id, || Ok(Tab::new(descriptor, self)))?;
		if created {
			tracing::debug!(tab = %descriptor.id, guid = %descriptor.guid, "tab proxy created");
		}
		Ok(tab)
	}

	/// Registers a freshly created fetcher and replays any favicon the engine
	/// reported before the creation reply was handled.
	pub(crate) fn register_favicon_fetcher(&self, fetcher: &Arc<FaviconFetcher>) -> Result<()> {
		self.favicon_fetchers.register(fetcher.id(), Arc::clone(fetcher))?;
		let early = self.early_favicons.lock().remove(&fetcher.id());
		if let Some(favicon) = early {
			tracing::debug!(fetcher = %fetcher.id(), "replaying favicon reported before registration");
			fetcher.handle_favicon_changed(favicon);
		}
		Ok(())
	}

	pub(crate) fn profile_for(self: &Arc<Self>, descriptor: &ProfileDescriptor) -> Result<Arc<Profile>> {
		validate_profile_name(&descriptor.name, descriptor.incognito)?;
		let key = ProfileKey::new(descriptor.name.clone(), descriptor.incognito);
		let (profile, created) = self
			.profiles
			.get_or_register_with(key, || Ok(Profile::new(descriptor, self)))?;
		if created {
			tracing::debug!(profile = %profile.key(), id = %descriptor.id, "profile proxy created");
		}
		Ok(profile)
	}

	/// Live browsers created with the profile `id`.
	pub(crate) fn live_browsers_of(&self, id: ProfileId) -> Vec<Arc<Browser>> {
		self.browsers
			.values()
			.into_iter()
			.filter(|b| b.profile().id() == id && !b.is_destroyed())
			.collect()
	}

	fn profile_by_id(&self, id: ProfileId) -> Option<Arc<Profile>> {
		self.profiles.find(|p| p.id() == id)
	}

	fn tab_or_warn(&self, id: TabId, event: &str) -> Option<Arc<Tab>> {
		let tab = self.tabs.lookup(&id);
		if tab.is_none() {
			tracing::warn!(tab = %id, event, "notification for unknown tab dropped");
		}
		tab
	}

	fn browser_or_warn(&self, id: BrowserId, event: &str) -> Option<Arc<Browser>> {
		let browser = self.browsers.lookup(&id);
		if browser.is_none() {
			tracing::warn!(browser = %id, event, "notification for unknown browser dropped");
		}
		browser
	}

	/// The navigation and the tab it runs in.
	fn navigation_or_warn(&self, id: NavigationId, event: &str) -> Option<(Arc<Navigation>, Arc<Tab>)> {
		let Some(navigation) = self.navigations.lookup(&id) else {
			tracing::warn!(navigation = %id, event, "notification for unknown navigation dropped");
			return None;
		};
		let tab = self.tab_or_warn(navigation.tab_id(), event)?;
		Some((navigation, tab))
	}

	async fn route(self: &Arc<Self>, notification: Notification) -> Result<()> {
		let event = notification.name();
		match notification {
			Notification::TabAdded { browser, tab } => {
				let Some(browser) = self.browser_or_warn(browser, event) else {
					return Ok(());
				};
				let tab = self.tab_for(&tab)?;
				if let Some(previous) = tab.browser_id().filter(|id| *id != browser.id()) {
					if let Some(previous) = self.browsers.lookup(&previous) {
						previous.handle_tab_removed(&tab);
					}
				}
				browser.handle_tab_added(&tab);
			}
			Notification::TabRemoved { browser, tab } => {
				if let (Some(browser), Some(tab)) = (self.browser_or_warn(browser, event), self.tab_or_warn(tab, event)) {
					browser.handle_tab_removed(&tab);
				}
			}
			Notification::ActiveTabChanged { browser, tab } => {
				let Some(browser) = self.browser_or_warn(browser, event) else {
					return Ok(());
				};
				match tab {
					Some(id) => {
						if let Some(tab) = self.tab_or_warn(id, event) {
							browser.handle_active_tab_changed(Some(&tab));
						}
					}
					None => browser.handle_active_tab_changed(None),
				}
			}
			Notification::WillDestroyBrowserAndAllTabs { browser } => {
				if let Some(browser) = self.browser_or_warn(browser, event) {
					browser.handle_will_destroy();
				}
			}
			Notification::ObjectDestroyed { object } => self.handle_object_destroyed(object).await?,

			Notification::VisibleUriChanged { tab, uri } => {
				if let Some(tab) = self.tab_or_warn(tab, event) {
					tab.callbacks().for_each(|cb| cb.on_visible_uri_changed(&uri));
				}
			}
			Notification::TitleUpdated { tab, title } => {
				if let Some(tab) = self.tab_or_warn(tab, event) {
					tab.callbacks().for_each(|cb| cb.on_title_updated(&title));
				}
			}
			Notification::RenderProcessGone { tab, reason } => {
				if let Some(tab) = self.tab_or_warn(tab, event) {
					tab.callbacks().for_each(|cb| cb.on_render_process_gone(reason));
				}
			}
			Notification::TabModalStateChanged { tab, showing } => {
				if let Some(tab) = self.tab_or_warn(tab, event) {
					tab.callbacks().for_each(|cb| cb.on_tab_modal_state_changed(showing));
				}
			}
			Notification::BackgroundColorChanged { tab, color } => {
				if let Some(tab) = self.tab_or_warn(tab, event) {
					tab.callbacks().for_each(|cb| cb.on_background_color_changed(color));
				}
			}
			Notification::NewTab { opener, tab, kind } => {
				let Some(opener) = self.tab_or_warn(opener, event) else {
					return Ok(());
				};
				let tab = self.tab_for(&tab)?;
				match opener.new_tab_callback() {
					Some(callback) => callback.on_new_tab(&tab, kind),
					None => tracing::warn!(opener = %opener.id(), tab = %tab.id(), "new tab without a handler"),
				}
			}

			Notification::NavigationStarted { tab, navigation } => {
				if let Some(tab) = self.tab_or_warn(tab, event) {
					tab.navigation_controller().handle_started(self, navigation)?;
				}
			}
			Notification::NavigationRedirected { navigation, info } => {
				if let Some((navigation, tab)) = self.navigation_or_warn(navigation, event) {
					tab.navigation_controller().handle_redirected(&navigation, info)?;
				}
			}
			Notification::NavigationCompleted { navigation, info } => {
				if let Some((navigation, tab)) = self.navigation_or_warn(navigation, event) {
					tab.navigation_controller()
						.handle_finished(self, &navigation, NavigationPhase::Completed, info)?;
				}
			}
			Notification::NavigationFailed { navigation, info } => {
				if let Some((navigation, tab)) = self.navigation_or_warn(navigation, event) {
					tab.navigation_controller()
						.handle_finished(self, &navigation, NavigationPhase::Failed, info)?;
				}
			}
			Notification::LoadStateChanged {
				tab,
				is_loading,
				should_show_loading_ui,
			} => {
				if let Some(tab) = self.tab_or_warn(tab, event) {
					tab.navigation_controller()
						.handle_load_state_changed(is_loading, should_show_loading_ui);
				}
			}
			Notification::LoadProgressChanged { tab, progress } => {
				if let Some(tab) = self.tab_or_warn(tab, event) {
					tab.navigation_controller().handle_load_progress_changed(progress);
				}
			}
			Notification::FirstContentfulPaint { tab } => {
				if let Some(tab) = self.tab_or_warn(tab, event) {
					tab.navigation_controller().handle_first_contentful_paint();
				}
			}

			Notification::FindResultAvailable { tab, result } => {
				if let Some(tab) = self.tab_or_warn(tab, event) {
					tab.find_in_page_controller().handle_find_result(&result);
				}
			}
			Notification::FindEnded { tab } => {
				if let Some(tab) = self.tab_or_warn(tab, event) {
					tab.find_in_page_controller().handle_find_ended();
				}
			}
			Notification::MediaCaptureRequested {
				tab,
				request,
				audio,
				video,
			} => {
				if let Some(tab) = self.tab_or_warn(tab, event) {
					tab.media_capture_controller()
						.handle_request(request, audio, video)
						.await?;
				}
			}
			Notification::MediaCaptureStateChanged { tab, audio, video } => {
				if let Some(tab) = self.tab_or_warn(tab, event) {
					tab.media_capture_controller().handle_state_changed(audio, video);
				}
			}
			Notification::FaviconChanged { fetcher, favicon } => match self.favicon_fetchers.lookup(&fetcher) {
				Some(fetcher) => fetcher.handle_favicon_changed(favicon),
				None => {
					let mut early = self.early_favicons.lock();
					if early.len() < MAX_EARLY_FAVICONS || early.contains_key(&fetcher) {
						tracing::debug!(%fetcher, "favicon for a fetcher not yet registered held back");
						early.insert(fetcher, favicon);
					} else {
						tracing::warn!(%fetcher, event, "notification for unknown favicon fetcher dropped");
					}
				}
			},

			Notification::CookieChanged {
				profile,
				subscription,
				cookie,
				cause,
			} => match self.profile_by_id(profile) {
				Some(profile) => {
					profile
						.cookie_manager()
						.handle_cookie_changed(CookieSubscription(subscription), &cookie, cause);
				}
				None => tracing::warn!(%profile, event, "notification for unknown profile dropped"),
			},
			Notification::ProfileDataDeleted { profile } => match self.profile_by_id(profile) {
				Some(profile) => {
					self.profiles.unregister(profile.key())?;
					profile.handle_data_deleted();
				}
				None => tracing::warn!(%profile, event, "notification for unknown profile dropped"),
			},
		}
		Ok(())
	}

	async fn handle_object_destroyed(self: &Arc<Self>, object: ObjectRef) -> Result<()> {
		match object.kind {
			ObjectKind::Browser => self.destroy_browser(BrowserId(object.id)).await?,
			ObjectKind::Tab => match self.tabs.lookup(&TabId(object.id)) {
				Some(tab) => self.destroy_tab(&tab, DestroyReason::EngineConfirmed, true)?,
				None => tracing::debug!(%object, "destroyed object has no proxy"),
			},
			ObjectKind::Navigation => match self.navigations.unregister(&NavigationId(object.id)) {
				Ok(navigation) => {
					navigation.mark_destroyed(DestroyReason::EngineConfirmed);
				}
				Err(_) => tracing::debug!(%object, "destroyed object has no proxy"),
			},
			ObjectKind::Profile => match self.profile_by_id(ProfileId(object.id)) {
				Some(profile) => {
					self.profiles.unregister(profile.key())?;
					profile.mark_destroyed(DestroyReason::EngineConfirmed);
				}
				None => tracing::debug!(%object, "destroyed object has no proxy"),
			},
			ObjectKind::FaviconFetcher => {
				let id = FaviconFetcherId(object.id);
				self.early_favicons.lock().remove(&id);
				match self.favicon_fetchers.unregister(&id) {
					Ok(fetcher) => {
						fetcher.mark_destroyed(DestroyReason::EngineConfirmed);
						if let Some(tab) = self.tabs.lookup(&fetcher.tab_id()) {
							tab.forget_favicon_fetcher(id);
						}
					}
					Err(_) => tracing::debug!(%object, "destroyed object has no proxy"),
				}
			}
			ObjectKind::Fragment | ObjectKind::Engine => {
				tracing::debug!(%object, "destruction needs no bookkeeping");
			}
		}
		Ok(())
	}

	/// Destroys `tab` with everything it owns, then tells its browser when `notify_browser`.
	fn destroy_tab(&self, tab: &Arc<Tab>, reason: DestroyReason, notify_browser: bool) -> Result<()> {
		tab.mark_destroyed(reason);
		self.tabs.unregister(&tab.id())?;
		tab.navigation_controller().abandon_in_flight(self);
		for id in tab.take_favicon_fetchers() {
			if let Ok(fetcher) = self.favicon_fetchers.unregister(&id) {
				fetcher.mark_destroyed(DestroyReason::OwnerDestroyed);
			}
		}
		if notify_browser {
			if let Some(browser) = tab.browser_id().and_then(|id| self.browsers.lookup(&id)) {
				browser.handle_tab_removed(tab);
			}
		}
		Ok(())
	}

	/// Destroys a browser and its tabs, then resumes any deletion its profile was waiting on.
	async fn destroy_browser(&self, id: BrowserId) -> Result<()> {
		let Some(browser) = self.browsers.lookup(&id) else {
			tracing::debug!(browser = %id, "destroyed browser has no proxy");
			return Ok(());
		};
		browser.mark_destroyed(DestroyReason::EngineConfirmed);
		self.browsers.unregister(&id)?;
		for tab in browser.take_members() {
			if let Some(tab) = self.tabs.lookup(&tab) {
				self.destroy_tab(&tab, DestroyReason::OwnerDestroyed, false)?;
			}
		}
		browser.clear_callbacks();
		browser.profile().handle_browser_destroyed(self).await
	}

	/// Marks every proxy destroyed and empties the registries.
	fn shutdown(&self) {
		let reason = DestroyReason::SessionClosed;
		for navigation in self.navigations.drain() {
			navigation.mark_destroyed(reason);
		}
		for fetcher in self.favicon_fetchers.drain() {
			fetcher.mark_destroyed(reason);
		}
		self.early_favicons.lock().clear();
		for tab in self.tabs.drain() {
			tab.mark_destroyed(reason);
		}
		for browser in self.browsers.drain() {
			browser.mark_destroyed(reason);
			browser.clear_callbacks();
		}
		for profile in self.profiles.drain() {
			profile.mark_destroyed(reason);
		}
		self.engine.mark_destroyed(reason);
	}
}

/// A connection to one engine and the proxies vended over it.
///
/// Confined to the thread that created it: every proxy operation and every
/// [`Session::dispatch`] must run there, otherwise it fails with
/// [`Error::ThreadViolation`]. Drive it on a current-thread runtime or a
/// `LocalSet`.
pub struct Session {
	core: Arc<SessionCore>,
	config: SessionConfig,
	notifications: Mutex<Option<mpsc::UnboundedReceiver<Notification>>>,
}

impl Session {
	/// Builds a session over an already loaded engine.
	///
	/// Fails with [`Error::UnsupportedCapability`] for engines older than
	/// [`MIN_SUPPORTED_ENGINE_VERSION`].
	pub fn new(engine: LoadedEngine, config: SessionConfig) -> Result<Self> {
		let LoadedEngine {
			transport,
			major_version,
			notifications,
		} = engine;
		if major_version < MIN_SUPPORTED_ENGINE_VERSION {
			return Err(Error::UnsupportedCapability {
				capability: "engine",
				required: MIN_SUPPORTED_ENGINE_VERSION,
				actual: major_version,
			});
		}
		let context = ProxyContext::new(
			transport,
			ThreadChecker::current(config.thread_label.as_str()),
			VersionGate::new(major_version),
		)
		.with_call_timeout(config.call_timeout());
		let core = Arc::new(SessionCore {
			engine: ProxyCore::new("Engine", ObjectRef::ENGINE, Arc::new(context)),
			browsers: ProxyRegistry::new("Browser"),
			tabs: ProxyRegistry::new("Tab"),
			navigations: ProxyRegistry::new("Navigation"),
			profiles: ProxyRegistry::new("Profile"),
			favicon_fetchers: ProxyRegistry::new("FaviconFetcher"),
			early_favicons: Mutex::new(HashMap::new()),
		});
		tracing::debug!(engine_version = major_version, thread = %config.thread_label, "session opened");
		Ok(Self {
			core,
			config,
			notifications: Mutex::new(notifications),
		})
	}

	/// Loads an engine through `loader` and opens a session on it.
	pub async fn connect(loader: &dyn EngineLoader, config: SessionConfig) -> Result<Self> {
		let engine = loader.load().await?;
		Self::new(engine, config)
	}

	pub fn config(&self) -> &SessionConfig {
		&self.config
	}

	/// Engine major version negotiated when the session opened.
	pub fn engine_version(&self) -> u32 {
		self.core.context().versions().session_version()
	}

	pub fn supports(&self, capability: Capability) -> bool {
		self.core.context().versions().supports(capability)
	}

	/// Returns the profile `name`, asking the engine for it on first use.
	///
	/// `name` must match `[A-Za-z0-9_]+`; it may be empty only for the
	/// default incognito profile.
	pub async fn profile(&self, name: &str, incognito: bool) -> Result<Arc<Profile>> {
		self.core.engine.check_access()?;
		validate_profile_name(name, incognito)?;
		if let Some(profile) = self.core.profiles.lookup(&ProfileKey::new(name, incognito)) {
			return Ok(profile);
		}
		let descriptor: ProfileDescriptor = self
			.core
			.engine
			.call("getProfile", json!({ "name": name, "incognito": incognito }))
			.await?;
		self.core.profile_for(&descriptor)
	}

	/// Returns the proxy for an engine-vended profile, creating it on first sight.
	pub fn profile_of(&self, descriptor: &ProfileDescriptor) -> Result<Arc<Profile>> {
		self.core.engine.check_access()?;
		self.core.profile_for(descriptor)
	}

	/// Creates a browser whose tabs store their data in `profile`.
	pub async fn create_browser(&self, profile: &Arc<Profile>) -> Result<Arc<Browser>> {
		self.core.engine.check_access()?;
		if profile.is_destroyed() {
			return Err(Error::InvalidArgument(format!("profile {} is destroyed", profile.key())));
		}
		let BrowserCreated { id } = self
			.core
			.engine
			.call("createBrowser", json!({ "profile": profile.id() }))
			.await?;
		let (browser, _) = self
			.core
			.browsers
			.get_or_register_with(id, || Ok(Browser::new(id, Arc::clone(profile), &self.core)))?;
		tracing::debug!(browser = %id, profile = %profile.key(), "browser created");
		Ok(browser)
	}

	pub fn browser(&self, id: BrowserId) -> Option<Arc<Browser>> {
		self.core.browsers.lookup(&id)
	}

	pub fn browsers(&self) -> Vec<Arc<Browser>> {
		self.core.browsers.values()
	}

	pub fn tab(&self, id: TabId) -> Option<Arc<Tab>> {
		self.core.tabs.lookup(&id)
	}

	pub fn navigation(&self, id: NavigationId) -> Option<Arc<Navigation>> {
		self.core.navigations.lookup(&id)
	}

	pub fn profiles(&self) -> Vec<Arc<Profile>> {
		self.core.profiles.values()
	}

	/// Applies one engine notification to the proxy graph.
	///
	/// Notifications naming unknown objects or breaking a navigation's
	/// lifecycle are logged and dropped. Errors are reserved for calls made
	/// off the session thread and for failed engine calls issued while
	/// handling the notification.
	pub async fn dispatch(&self, notification: Notification) -> Result<()> {
		self.core.context().thread().check("Session")?;
		let event = notification.name();
		tracing::debug!(event, "notification");
		match self.core.route(notification).await {
			Ok(()) => Ok(()),
			Err(err @ (Error::ThreadViolation { .. } | Error::RemoteTransportFailure(_))) => Err(err),
			Err(err) => {
				tracing::warn!(event, error = %err, "notification dropped");
				Ok(())
			}
		}
	}

	/// Dispatches notifications from the loader's channel until it closes.
	///
	/// Fails with [`Error::InvalidState`] when the engine provided no
	/// channel or another `run` already owns it.
	pub async fn run(&self) -> Result<()> {
		let mut rx = self
			.notifications
			.lock()
			.take()
			.ok_or_else(|| Error::InvalidState("no notification stream to run".to_string()))?;
		let threshold = self.config.notification_backlog_warning;
		while let Some(notification) = rx.recv().await {
			let backlog = rx.len();
			if threshold > 0 && backlog >= threshold {
				tracing::warn!(backlog, threshold, "notification backlog building up");
			}
			if let Err(err) = self.dispatch(notification).await {
				*self.notifications.lock() = Some(rx);
				return Err(err);
			}
		}
		tracing::debug!("notification stream closed");
		Ok(())
	}

	/// Destroys every proxy. Later calls through them fail with
	/// [`Error::UseAfterDestroy`].
	///
	/// Fails with [`Error::ThreadViolation`] off the session thread, leaving
	/// the graph untouched.
	pub fn close(&self) -> Result<()> {
		self.core.context().thread().check("Session")?;
		self.core.shutdown();
		Ok(())
	}
}

impl Drop for Session {
	fn drop(&mut self) {
		self.core.shutdown();
	}
}

impl std::fmt::Debug for Session {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Session")
			.field("engine_version", &self.engine_version())
			.field("browsers", &self.core.browsers.len())
			.field("tabs", &self.core.tabs.len())
			.field("profiles", &self.core.profiles.len())
			.finish()
	}
}
