//! Engine versions that introduced each gated API.

use wl_runtime::Capability;

pub const NAVIGATION_SET_REQUEST_HEADER: Capability = Capability::new("Navigation.setRequestHeader", 83);
pub const NAVIGATION_SET_USER_AGENT: Capability = Capability::new("Navigation.setUserAgentString", 84);
pub const TAB_DATA: Capability = Capability::new("Tab.setData", 85);
pub const FAVICON_FETCHER: Capability = Capability::new("Tab.createFaviconFetcher", 86);
pub const DISABLE_NETWORK_ERROR_AUTO_RELOAD: Capability =
	Capability::new("Navigation.disableNetworkErrorAutoReload", 86);
pub const MEDIA_CAPTURE: Capability = Capability::new("Tab.mediaCaptureController", 87);
pub const DISABLE_INTENT_PROCESSING: Capability = Capability::new("Navigation.disableIntentProcessing", 88);
pub const RESPONSE_COOKIES: Capability = Capability::new("CookieManager.getResponseCookies", 88);
pub const PRERENDER: Capability = Capability::new("PrerenderController.schedulePrerender", 89);
