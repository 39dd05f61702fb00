//! The seam between proxies and whatever carries calls to the engine.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::mpsc;
use wl_protocol::{Notification, ObjectRef};

use crate::error::{Result, TransportError};

/// Boxed future returned by [`EngineTransport::call`].
pub type TransportFuture<'a> = Pin<Box<dyn Future<Output = std::result::Result<Value, TransportError>> + Send + 'a>>;

/// Carries one call to the engine and resolves with its result or failure.
///
/// Implementations know nothing about proxies, threads or versions; those
/// checks happen before a call is handed over.
pub trait EngineTransport: Send + Sync {
	fn call(&self, target: ObjectRef, method: &str, params: Value) -> TransportFuture<'_>;
}

/// An engine ready to accept calls.
pub struct LoadedEngine {
	pub transport: Arc<dyn EngineTransport>,
	/// Engine major version, negotiated once per session.
	pub major_version: u32,
	/// Engine → client notification stream, when the loader provides one.
	pub notifications: Option<mpsc::UnboundedReceiver<Notification>>,
}

impl LoadedEngine {
	pub fn new(transport: Arc<dyn EngineTransport>, major_version: u32) -> Self {
		Self {
			transport,
			major_version,
			notifications: None,
		}
	}

	pub fn with_notifications(mut self, rx: mpsc::UnboundedReceiver<Notification>) -> Self {
		self.notifications = Some(rx);
		self
	}
}

/// Locates, starts and version-checks an engine.
///
/// Installation and version-skew handling live entirely behind this trait.
pub trait EngineLoader: Send + Sync {
	fn load(&self) -> Pin<Box<dyn Future<Output = Result<LoadedEngine>> + Send + '_>>;
}
