//! Callback roles a client can register with proxies.
//!
//! Every method has a no-op default, so an implementation only overrides the
//! events it cares about. Callbacks run on the session thread while a
//! notification is being dispatched; they may register or unregister
//! callbacks (including themselves) but must not block.

use std::sync::Arc;

use wl_protocol::{CookieChangeCause, Favicon, FindResult, NewTabType, RenderProcessExit};

use crate::navigation::Navigation;
use crate::tab::Tab;

/// Per-tab page state changes.
pub trait TabCallback: Send + Sync {
	fn on_visible_uri_changed(&self, _uri: &str) {}
	fn on_title_updated(&self, _title: &str) {}
	fn on_render_process_gone(&self, _reason: RenderProcessExit) {}
	fn on_tab_modal_state_changed(&self, _showing: bool) {}
	fn on_background_color_changed(&self, _color: u32) {}
}

/// Membership and activation changes of a browser's tabs.
pub trait TabListCallback: Send + Sync {
	/// `None` when the browser no longer has an active tab.
	fn on_active_tab_changed(&self, _active: Option<&Arc<Tab>>) {}
	fn on_tab_added(&self, _tab: &Arc<Tab>) {}
	fn on_tab_removed(&self, _tab: &Arc<Tab>) {}
	/// Sent once before the engine tears down the browser and every tab in it.
	fn on_will_destroy_browser_and_all_tabs(&self) {}
}

/// Navigation progress within one tab.
///
/// The same [`Navigation`] is passed to every event of one attempt.
pub trait NavigationCallback: Send + Sync {
	fn on_navigation_started(&self, _navigation: &Arc<Navigation>) {}
	fn on_navigation_redirected(&self, _navigation: &Arc<Navigation>) {}
	/// The navigation is destroyed once every callback has returned.
	fn on_navigation_completed(&self, _navigation: &Arc<Navigation>) {}
	/// The navigation is destroyed once every callback has returned.
	fn on_navigation_failed(&self, _navigation: &Arc<Navigation>) {}
	fn on_load_state_changed(&self, _is_loading: bool, _should_show_loading_ui: bool) {}
	fn on_load_progress_changed(&self, _progress: f64) {}
	fn on_first_contentful_paint(&self) {}
}

/// Receives tabs that page content asked to open.
pub trait NewTabCallback: Send + Sync {
	/// `tab` is already registered when this runs.
	fn on_new_tab(&self, tab: &Arc<Tab>, kind: NewTabType);
}

impl<F> NewTabCallback for F
where
	F: Fn(&Arc<Tab>, NewTabType) + Send + Sync,
{
	fn on_new_tab(&self, tab: &Arc<Tab>, kind: NewTabType) {
		self(tab, kind)
	}
}

pub trait FindInPageCallback: Send + Sync {
	fn on_find_result(&self, _result: &FindResult) {}
	fn on_find_ended(&self) {}
}

pub trait MediaCaptureCallback: Send + Sync {
	/// Decides whether the page may capture. Denied unless overridden.
	fn on_media_capture_requested(&self, _audio: bool, _video: bool) -> bool {
		false
	}
	fn on_media_capture_state_changed(&self, _audio: bool, _video: bool) {}
}

pub trait FaviconFetcherCallback: Send + Sync {
	/// `None` when the page no longer has a favicon.
	fn on_favicon_changed(&self, _favicon: Option<&Favicon>) {}
}

impl<F> FaviconFetcherCallback for F
where
	F: Fn(Option<&Favicon>) + Send + Sync,
{
	fn on_favicon_changed(&self, favicon: Option<&Favicon>) {
		self(favicon)
	}
}

pub trait CookieChangedCallback: Send + Sync {
	fn on_cookie_changed(&self, cookie: &str, cause: CookieChangeCause);
}

impl<F> CookieChangedCallback for F
where
	F: Fn(&str, CookieChangeCause) + Send + Sync,
{
	fn on_cookie_changed(&self, cookie: &str, cause: CookieChangeCause) {
		self(cookie, cause)
	}
}

/// Runs once when a profile's on-disk data is gone.
pub type DataDeletedCallback = Box<dyn FnOnce() + Send + 'static>;
