//! wl: client-side object graph for an out-of-process browser engine.
//!
//! The engine owns the real browsers, tabs and navigations. This crate hands
//! out proxies for them, keeps exactly one proxy per engine object, and
//! applies the engine's notifications to that graph.
//!
//! # Examples
//!
//! ```ignore
//! use std::sync::Arc;
//!
//! use wl::{NavigateParams, NavigationCallback, Navigation, Session, SessionConfig};
//!
//! struct PrintLoads;
//!
//! impl NavigationCallback for PrintLoads {
//!     fn on_navigation_completed(&self, navigation: &Arc<Navigation>) {
//!         println!("loaded {}", navigation.uri().unwrap_or_default());
//!     }
//! }
//!
//! async fn open(loader: &dyn wl::EngineLoader) -> wl::Result<()> {
//!     let session = Session::connect(loader, SessionConfig::default()).await?;
//!     let profile = session.profile("default", false).await?;
//!     let browser = session.create_browser(&profile).await?;
//!     let tab = browser.create_tab().await?;
//!
//!     let controller = tab.navigation_controller();
//!     controller.register_navigation_callback(Arc::new(PrintLoads))?;
//!     controller.navigate("https://example.com/", NavigateParams::new()).await?;
//!
//!     session.run().await
//! }
//! ```
//!
//! # Threading
//!
//! A [`Session`] and every proxy it vends are confined to the thread that
//! created the session. Operations from any other thread fail with
//! [`Error::ThreadViolation`] before anything reaches the engine.

pub mod browser;
pub mod callbacks;
pub mod capabilities;
pub mod config;
pub mod event_bridge;
pub mod navigation;
pub mod profile;
pub mod session;
pub mod tab;

pub use browser::Browser;
pub use callbacks::{
	CookieChangedCallback, DataDeletedCallback, FaviconFetcherCallback, FindInPageCallback, MediaCaptureCallback,
	NavigationCallback, NewTabCallback, TabCallback, TabListCallback,
};
pub use config::SessionConfig;
pub use event_bridge::{EventBridge, LifecycleStage};
pub use navigation::{Navigation, NavigationController, NavigationPhase};
pub use profile::{CookieManager, CookieSubscription, PrerenderController, Profile, ProfileKey};
pub use session::Session;
pub use tab::{FaviconFetcher, FindInPageController, MAX_TAB_DATA_BYTES, MediaCaptureController, Tab};
pub use wl_protocol::{
	BrowserId, BrowsingDataType, CookieChangeCause, Favicon, FaviconFetcherId, FindResult, FragmentId,
	HostLifecycleEvent, NavigateParams, NavigationDescriptor, NavigationId, NavigationInfo, NavigationState,
	NewTabType, Notification, ObjectKind, ObjectRef, ProfileDescriptor, ProfileId, RenderProcessExit, TabDescriptor,
	TabId,
};
pub use wl_runtime::{
	Capability, Connection, DestroyReason, DestroyRecord, EngineLoader, EnginePeer, EngineTransport, Error,
	LoadedEngine, MIN_SUPPORTED_ENGINE_VERSION, Result, TransportError, TransportFuture,
};
