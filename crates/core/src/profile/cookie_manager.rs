use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::json;
use wl_protocol::CookieChangeCause;
use wl_runtime::{Error, ProxyCore, Result};

use crate::callbacks::CookieChangedCallback;
use crate::capabilities;

/// Handle returned by [`CookieManager::add_cookie_changed_callback`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(transparent)]
pub struct CookieSubscription(pub u64);

impl fmt::Display for CookieSubscription {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "cookie-subscription:{}", self.0)
	}
}

#[derive(Deserialize)]
struct Subscribed {
	subscription: CookieSubscription,
}

/// Cookie access for one profile.
pub struct CookieManager {
	core: Arc<ProxyCore>,
	subscriptions: Mutex<HashMap<CookieSubscription, Arc<dyn CookieChangedCallback>>>,
}

impl CookieManager {
	pub(crate) fn new(core: Arc<ProxyCore>) -> Self {
		Self {
			core,
			subscriptions: Mutex::new(HashMap::new()),
		}
	}

	/// Sets a cookie for `uri`. `value` uses `Set-Cookie` syntax. Returns false if the engine rejected it.
	pub async fn set_cookie(&self, uri: &str, value: &str) -> Result<bool> {
		self.core.check_access()?;
		require_uri(uri)?;
		self.core
			.call("setCookie", json!({ "uri": uri, "value": value }))
			.await
	}

	/// Returns the `Cookie` header value that would be sent to `uri`.
	pub async fn get_cookie(&self, uri: &str) -> Result<String> {
		self.core.check_access()?;
		require_uri(uri)?;
		self.core.call("getCookie", json!({ "uri": uri })).await
	}

	/// Returns each cookie for `uri` in `Set-Cookie` syntax.
	pub async fn get_response_cookies(&self, uri: &str) -> Result<Vec<String>> {
		self.core.check_capability(capabilities::RESPONSE_COOKIES)?;
		require_uri(uri)?;
		self.core
			.call("getResponseCookies", json!({ "uri": uri }))
			.await
	}

	/// Watches cookies for `uri`, optionally only the one called `name`.
	pub async fn add_cookie_changed_callback(
		&self,
		uri: &str,
		name: Option<&str>,
		callback: Arc<dyn CookieChangedCallback>,
	) -> Result<CookieSubscription> {
		self.core.check_access()?;
		require_uri(uri)?;
		let Subscribed { subscription } = self
			.core
			.call("addCookieChangedCallback", json!({ "uri": uri, "name": name }))
			.await?;
		self.subscriptions.lock().insert(subscription, callback);
		Ok(subscription)
	}

	/// Returns false if `subscription` was not active.
	pub async fn remove_cookie_changed_callback(&self, subscription: CookieSubscription) -> Result<bool> {
		self.core.check_access()?;
		if self.subscriptions.lock().remove(&subscription).is_none() {
			return Ok(false);
		}
		self.core
			.call_no_result(
				"removeCookieChangedCallback",
				json!({ "subscription": subscription.0 }),
			)
			.await?;
		Ok(true)
	}

	pub(crate) fn handle_cookie_changed(&self, subscription: CookieSubscription, cookie: &str, cause: CookieChangeCause) {
		let callback = self.subscriptions.lock().get(&subscription).cloned();
		match callback {
			Some(callback) => callback.on_cookie_changed(cookie, cause),
			None => tracing::debug!(%subscription, "cookie change for removed subscription"),
		}
	}

	pub(crate) fn clear(&self) {
		self.subscriptions.lock().clear();
	}
}

fn require_uri(uri: &str) -> Result<()> {
	if uri.trim().is_empty() {
		return Err(Error::InvalidArgument("a cookie URI is required".to_string()));
	}
	Ok(())
}
