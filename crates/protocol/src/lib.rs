//! Wire types shared by the browser-engine client and the engine.
//!
//! Nothing here knows about proxies or sessions; this crate only describes
//! what crosses the transport:
//!
//! - [`ids`]: engine-assigned identifiers and untyped [`ObjectRef`]s
//! - [`notification`]: the closed set of engine → client notifications
//! - [`types`]: payload structs shared by calls and notifications

pub mod ids;
pub mod notification;
pub mod types;

pub use ids::{
	BrowserId, FaviconFetcherId, FragmentId, NavigationId, ObjectKind, ObjectRef, ProfileId, TabId,
};
pub use notification::Notification;
pub use types::{
	BrowsingDataType, CookieChangeCause, Favicon, FaviconFetcherCreated, FindResult,
	HostLifecycleEvent, NavigateParams, NavigationDescriptor, NavigationInfo, NavigationState,
	NewTabType, ProfileDescriptor, RenderProcessExit, TabDescriptor,
};
