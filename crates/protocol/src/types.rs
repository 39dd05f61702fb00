//! Data carried by calls and notifications.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ids::{FaviconFetcherId, NavigationId, ProfileId, TabId};

/// Identity of a tab as vended by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TabDescriptor {
	pub id: TabId,
	/// Stable across restarts of the embedding application.
	pub guid: String,
}

/// Identity of a profile as vended by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileDescriptor {
	pub id: ProfileId,
	pub name: String,
	pub incognito: bool,
}

/// Engine-side state of a navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NavigationState {
	WaitingResponse,
	ReceivingBytes,
	Complete,
	Failed,
}

/// Snapshot of a navigation's observable properties at notification time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigationInfo {
	pub uri: String,
	#[serde(default)]
	pub redirect_chain: Vec<String>,
	#[serde(default)]
	pub http_status_code: i32,
	pub state: NavigationState,
	#[serde(default)]
	pub is_error_page: bool,
	#[serde(default)]
	pub is_download: bool,
	#[serde(default)]
	pub response_headers: BTreeMap<String, String>,
}

/// Sent with the first notification for a navigation attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigationDescriptor {
	pub id: NavigationId,
	/// Fixed for the whole attempt.
	pub is_same_document: bool,
	pub info: NavigationInfo,
}

/// Parameters for `NavigationController::navigate`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigateParams {
	/// Replace the current history entry instead of appending.
	#[serde(default)]
	pub should_replace_current_entry: bool,
	/// Skip the engine's intent-handling for this navigation.
	#[serde(default)]
	pub intent_processing_disabled: bool,
	/// Disable the network-error auto reload for this navigation.
	#[serde(default)]
	pub network_error_auto_reload_disabled: bool,
}

impl NavigateParams {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn replace_current_entry(mut self, replace: bool) -> Self {
		self.should_replace_current_entry = replace;
		self
	}

	pub fn disable_intent_processing(mut self) -> Self {
		self.intent_processing_disabled = true;
		self
	}

	pub fn disable_network_error_auto_reload(mut self) -> Self {
		self.network_error_auto_reload_disabled = true;
		self
	}
}

/// How a new tab requested by page content should be presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NewTabType {
	ForegroundTab,
	BackgroundTab,
	NewPopup,
	NewWindow,
}

/// Why the engine reported a renderer loss.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RenderProcessExit {
	Crashed,
	Killed,
	OutOfMemory,
}

/// Categories accepted by `Profile::clear_browsing_data`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BrowsingDataType {
	CookiesAndSiteData,
	Cache,
	SiteSettings,
}

/// Reason reported with a cookie change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CookieChangeCause {
	Inserted,
	Explicit,
	Unknown,
	Overwrite,
	Expired,
	Evicted,
	ExpiredOverwrite,
}

/// Outcome of a find-in-page pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FindResult {
	pub number_of_matches: u32,
	/// Zero-based index of the highlighted match, `-1` while none is active.
	pub active_match_index: i32,
	/// `false` while the engine is still counting matches.
	pub final_update: bool,
}

/// A favicon bitmap, base64 encoded on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Favicon {
	pub width: u32,
	pub height: u32,
	#[serde(with = "base64_bytes")]
	pub png: Vec<u8>,
}

/// Events a hosting UI container forwards to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum HostLifecycleEvent {
	Attach,
	Create,
	Start,
	Resume,
	Pause,
	Stop,
	Detach,
	Destroy,
}

impl HostLifecycleEvent {
	/// Engine method name the event is forwarded as.
	pub fn method(self) -> &'static str {
		match self {
			HostLifecycleEvent::Attach => "onAttach",
			HostLifecycleEvent::Create => "onCreate",
			HostLifecycleEvent::Start => "onStart",
			HostLifecycleEvent::Resume => "onResume",
			HostLifecycleEvent::Pause => "onPause",
			HostLifecycleEvent::Stop => "onStop",
			HostLifecycleEvent::Detach => "onDetach",
			HostLifecycleEvent::Destroy => "onDestroy",
		}
	}
}

/// Reply to `createFaviconFetcher`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FaviconFetcherCreated {
	pub id: FaviconFetcherId,
}

mod base64_bytes {
	use base64::Engine as _;
	use serde::{Deserialize, Deserializer, Serializer};

	pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
		serializer.serialize_str(&base64::engine::general_purpose::STANDARD.encode(bytes))
	}

	pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
		let s = String::deserialize(deserializer)?;
		base64::engine::general_purpose::STANDARD
			.decode(s.as_bytes())
			.map_err(serde::de::Error::custom)
	}
}
