//! Engine-originated notifications.
//!
//! The engine reports every state change as one variant of [`Notification`].
//! The set is closed: the client dispatches on the variant and never inspects
//! the runtime type of a callback target.

use serde::{Deserialize, Serialize};

use crate::ids::{BrowserId, FaviconFetcherId, NavigationId, ObjectRef, ProfileId, TabId};
use crate::types::{
	CookieChangeCause, Favicon, FindResult, NavigationDescriptor, NavigationInfo, NewTabType,
	RenderProcessExit, TabDescriptor,
};

/// One engine → client notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Notification {
	/// A tab joined `browser`, either newly created or moved from another browser.
	TabAdded { browser: BrowserId, tab: TabDescriptor },
	TabRemoved { browser: BrowserId, tab: TabId },
	/// `tab` is `None` when the browser no longer has an active tab.
	ActiveTabChanged {
		browser: BrowserId,
		tab: Option<TabId>,
	},
	WillDestroyBrowserAndAllTabs { browser: BrowserId },
	/// The engine finished tearing down `object`; its id may be reused afterwards.
	ObjectDestroyed { object: ObjectRef },

	VisibleUriChanged { tab: TabId, uri: String },
	TitleUpdated { tab: TabId, title: String },
	RenderProcessGone {
		tab: TabId,
		reason: RenderProcessExit,
	},
	TabModalStateChanged { tab: TabId, showing: bool },
	BackgroundColorChanged { tab: TabId, color: u32 },
	/// Page content in `opener` created `tab`.
	NewTab {
		opener: TabId,
		tab: TabDescriptor,
		kind: NewTabType,
	},

	NavigationStarted {
		tab: TabId,
		navigation: NavigationDescriptor,
	},
	NavigationRedirected {
		navigation: NavigationId,
		info: NavigationInfo,
	},
	NavigationCompleted {
		navigation: NavigationId,
		info: NavigationInfo,
	},
	NavigationFailed {
		navigation: NavigationId,
		info: NavigationInfo,
	},
	LoadStateChanged {
		tab: TabId,
		is_loading: bool,
		should_show_loading_ui: bool,
	},
	/// `progress` is in `[0.0, 1.0]`.
	LoadProgressChanged { tab: TabId, progress: f64 },
	FirstContentfulPaint { tab: TabId },

	FindResultAvailable { tab: TabId, result: FindResult },
	FindEnded { tab: TabId },

	/// Answered with `respondToMediaCaptureRequest` carrying the same `request`.
	MediaCaptureRequested {
		tab: TabId,
		request: u64,
		audio: bool,
		video: bool,
	},
	MediaCaptureStateChanged { tab: TabId, audio: bool, video: bool },

	FaviconChanged {
		fetcher: FaviconFetcherId,
		favicon: Option<Favicon>,
	},

	CookieChanged {
		profile: ProfileId,
		subscription: u64,
		cookie: String,
		cause: CookieChangeCause,
	},
	/// Deletion requested through `destroyAndDeleteDataFromDisk` finished.
	ProfileDataDeleted { profile: ProfileId },
}

impl Notification {
	/// Wire name of the variant, for logs.
	pub fn name(&self) -> &'static str {
		match self {
			Notification::TabAdded { .. } => "tabAdded",
			Notification::TabRemoved { .. } => "tabRemoved",
			Notification::ActiveTabChanged { .. } => "activeTabChanged",
			Notification::WillDestroyBrowserAndAllTabs { .. } => "willDestroyBrowserAndAllTabs",
			Notification::ObjectDestroyed { .. } => "objectDestroyed",
			Notification::VisibleUriChanged { .. } => "visibleUriChanged",
			Notification::TitleUpdated { .. } => "titleUpdated",
			Notification::RenderProcessGone { .. } => "renderProcessGone",
			Notification::TabModalStateChanged { .. } => "tabModalStateChanged",
			Notification::BackgroundColorChanged { .. } => "backgroundColorChanged",
			Notification::NewTab { .. } => "newTab",
			Notification::NavigationStarted { .. } => "navigationStarted",
			Notification::NavigationRedirected { .. } => "navigationRedirected",
			Notification::NavigationCompleted { .. } => "navigationCompleted",
			Notification::NavigationFailed { .. } => "navigationFailed",
			Notification::LoadStateChanged { .. } => "loadStateChanged",
			Notification::LoadProgressChanged { .. } => "loadProgressChanged",
			Notification::FirstContentfulPaint { .. } => "firstContentfulPaint",
			Notification::FindResultAvailable { .. } => "findResultAvailable",
			Notification::FindEnded { .. } => "findEnded",
			Notification::MediaCaptureRequested { .. } => "mediaCaptureRequested",
			Notification::MediaCaptureStateChanged { .. } => "mediaCaptureStateChanged",
			Notification::FaviconChanged { .. } => "faviconChanged",
			Notification::CookieChanged { .. } => "cookieChanged",
			Notification::ProfileDataDeleted { .. } => "profileDataDeleted",
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::ids::ObjectKind;
	use crate::types::NavigationState;
	use serde_json::json;

	#[test]
	fn notifications_are_tagged_by_event_name() {
		let n = Notification::ActiveTabChanged {
			browser: BrowserId(1),
			tab: Some(TabId(3)),
		};
		let value = serde_json::to_value(&n).unwrap();
		assert_eq!(value, json!({"event": "activeTabChanged", "browser": 1, "tab": 3}));
		assert_eq!(n.name(), "activeTabChanged");
	}

	#[test]
	fn field_names_are_camel_case() {
		let n: Notification = serde_json::from_value(json!({
			"event": "loadStateChanged",
			"tab": 2,
			"isLoading": true,
			"shouldShowLoadingUi": false
		}))
		.unwrap();
		assert_eq!(
			n,
			Notification::LoadStateChanged {
				tab: TabId(2),
				is_loading: true,
				should_show_loading_ui: false,
			}
		);
	}

	#[test]
	fn navigation_started_carries_descriptor() {
		let n: Notification = serde_json::from_value(json!({
			"event": "navigationStarted",
			"tab": 4,
			"navigation": {
				"id": 11,
				"isSameDocument": true,
				"info": {"uri": "https://example.com/#a", "state": "waitingResponse"}
			}
		}))
		.unwrap();
		match n {
			Notification::NavigationStarted { tab, navigation } => {
				assert_eq!(tab, TabId(4));
				assert_eq!(navigation.id, NavigationId(11));
				assert!(navigation.is_same_document);
				assert_eq!(navigation.info.state, NavigationState::WaitingResponse);
			}
			other => panic!("unexpected notification: {other:?}"),
		}
	}

	#[test]
	fn object_destroyed_names_kind_and_id() {
		let n: Notification = serde_json::from_value(json!({
			"event": "objectDestroyed",
			"object": {"kind": "tab", "id": 9}
		}))
		.unwrap();
		assert_eq!(
			n,
			Notification::ObjectDestroyed {
				object: ObjectRef::new(ObjectKind::Tab, 9)
			}
		);
	}

	#[test]
	fn unknown_event_is_rejected() {
		let res = serde_json::from_value::<Notification>(json!({"event": "teleported", "tab": 1}));
		assert!(res.is_err());
	}
}
