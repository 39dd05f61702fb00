//! Client-side stand-ins for engine objects.
//!
//! Every proxy embeds a [`ProxyCore`]. The core owns the [`RemoteHandle`]
//! while the engine object is alive and a [`DestroyRecord`] afterwards, and
//! funnels every outbound call through the same sequence of checks:
//!
//! 1. the caller is on the session thread ([`Error::ThreadViolation`])
//! 2. the proxy is not destroyed ([`Error::UseAfterDestroy`])
//! 3. the negotiated engine version supports the call ([`Error::UnsupportedCapability`])
//!
//! Only then is the call handed to the transport.

use std::backtrace::Backtrace;
use std::fmt;
use std::panic::Location;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use wl_protocol::ObjectRef;

use crate::channel::Channel;
use crate::error::{Error, Result, TransportError};
use crate::thread::ThreadChecker;
use crate::transport::EngineTransport;
use crate::version::{Capability, VersionGate};

/// Session-wide plumbing shared by every proxy.
pub struct ProxyContext {
	transport: Arc<dyn EngineTransport>,
	thread: ThreadChecker,
	versions: VersionGate,
	call_timeout: Option<Duration>,
}

impl ProxyContext {
	pub fn new(transport: Arc<dyn EngineTransport>, thread: ThreadChecker, versions: VersionGate) -> Self {
		Self {
			transport,
			thread,
			versions,
			call_timeout: None,
		}
	}

	/// Fails calls that take longer than `timeout` with [`TransportError::Timeout`].
	pub fn with_call_timeout(mut self, timeout: Option<Duration>) -> Self {
		self.call_timeout = timeout;
		self
	}

	pub fn thread(&self) -> &ThreadChecker {
		&self.thread
	}

	pub fn versions(&self) -> &VersionGate {
		&self.versions
	}

	/// Hands a call to the transport. No checks are performed here.
	pub async fn call_engine(&self, target: ObjectRef, method: &str, params: Value) -> Result<Value> {
		tracing::debug!(%target, method, "engine call");
		let call = self.transport.call(target, method, params);
		let result = match self.call_timeout {
			Some(limit) => match tokio::time::timeout(limit, call).await {
				Ok(result) => result,
				Err(_) => Err(TransportError::Timeout(format!(
					"{target}.{method} did not complete within {}ms",
					limit.as_millis()
				))),
			},
			None => call.await,
		};
		result.map_err(|err| {
			tracing::error!(%target, method, error = %err, "engine call failed");
			Error::RemoteTransportFailure(err)
		})
	}
}

/// Exclusive ownership of one engine object reference.
///
/// Not `Clone`: a proxy holds its handle until the engine confirms
/// destruction, and the handle is dropped exactly once.
pub struct RemoteHandle {
	channel: Channel,
}

impl RemoteHandle {
	pub fn new(target: ObjectRef, context: Arc<ProxyContext>) -> Self {
		Self {
			channel: Channel::new(target, context),
		}
	}

	pub fn object_ref(&self) -> ObjectRef {
		self.channel.target()
	}
}

impl fmt::Debug for RemoteHandle {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_tuple("RemoteHandle").field(&self.object_ref()).finish()
	}
}

/// Why a proxy became unusable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DestroyReason {
	/// The engine reported the object destroyed.
	EngineConfirmed,
	/// The object was owned by another object that was destroyed.
	OwnerDestroyed,
	/// A navigation reached completion or failure.
	NavigationFinished,
	/// The session shut down.
	SessionClosed,
}

impl fmt::Display for DestroyReason {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(match self {
			DestroyReason::EngineConfirmed => "destroyed by engine",
			DestroyReason::OwnerDestroyed => "owner destroyed",
			DestroyReason::NavigationFinished => "navigation finished",
			DestroyReason::SessionClosed => "session closed",
		})
	}
}

/// Where and when a proxy was invalidated.
///
/// Attached to [`Error::UseAfterDestroy`] so a late caller can see who
/// destroyed the object out from under it.
#[derive(Debug)]
pub struct DestroyRecord {
	pub object: ObjectRef,
	pub reason: DestroyReason,
	/// Milliseconds since the Unix epoch.
	pub wall_time_ms: u128,
	pub location: &'static Location<'static>,
	pub backtrace: Backtrace,
}

impl fmt::Display for DestroyRecord {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(
			f,
			"{} ({}) at {} [wall time {}ms]",
			self.object, self.reason, self.location, self.wall_time_ms
		)
	}
}

/// Liveness of a proxy. `Destroyed` is terminal.
#[derive(Debug)]
pub enum ProxyState {
	Active(RemoteHandle),
	Destroyed(Arc<DestroyRecord>),
}

/// State and call path shared by every proxy type.
pub struct ProxyCore {
	label: String,
	object: ObjectRef,
	state: Mutex<ProxyState>,
	context: Arc<ProxyContext>,
}

impl ProxyCore {
	/// Creates an active core owning a fresh handle to `object`.
	///
	/// `label` identifies the proxy in diagnostics, e.g. `Tab(tab:3)`.
	pub fn new(label: impl Into<String>, object: ObjectRef, context: Arc<ProxyContext>) -> Self {
		let handle = RemoteHandle::new(object, Arc::clone(&context));
		Self {
			label: label.into(),
			object,
			state: Mutex::new(ProxyState::Active(handle)),
			context,
		}
	}

	pub fn label(&self) -> &str {
		&self.label
	}

	pub fn object_ref(&self) -> ObjectRef {
		self.object
	}

	pub fn context(&self) -> &Arc<ProxyContext> {
		&self.context
	}

	pub fn is_destroyed(&self) -> bool {
		matches!(*self.state.lock(), ProxyState::Destroyed(_))
	}

	pub fn destroy_record(&self) -> Option<Arc<DestroyRecord>> {
		match &*self.state.lock() {
			ProxyState::Destroyed(record) => Some(Arc::clone(record)),
			ProxyState::Active(_) => None,
		}
	}

	pub fn check_thread(&self) -> Result<()> {
		self.context.thread.check(&self.label)
	}

	/// Fails with [`Error::UseAfterDestroy`] once the proxy is destroyed.
	pub fn ensure_alive(&self) -> Result<()> {
		self.channel().map(|_| ())
	}

	/// Thread check followed by liveness check.
	pub fn check_access(&self) -> Result<()> {
		self.check_thread()?;
		self.ensure_alive()
	}

	/// Thread and liveness checks followed by the version gate.
	pub fn check_capability(&self, capability: Capability) -> Result<()> {
		self.check_access()?;
		self.context.versions.check(capability)
	}

	/// Calls `method` on the engine object.
	pub async fn call<P: Serialize, R: DeserializeOwned>(&self, method: &str, params: P) -> Result<R> {
		self.check_thread()?;
		let channel = self.channel()?;
		channel.send(method, params).await
	}

	/// Calls `method` and discards the result.
	pub async fn call_no_result<P: Serialize>(&self, method: &str, params: P) -> Result<()> {
		self.check_thread()?;
		let channel = self.channel()?;
		channel.send_no_result(method, params).await
	}

	/// Like [`ProxyCore::call`], but first requires `capability` from the engine.
	pub async fn call_gated<P: Serialize, R: DeserializeOwned>(
		&self,
		capability: Capability,
		method: &str,
		params: P,
	) -> Result<R> {
		self.check_thread()?;
		let channel = self.channel()?;
		self.context.versions.check(capability)?;
		channel.send(method, params).await
	}

	/// Moves the proxy to `Destroyed`, releasing its handle.
	///
	/// Returns `false` if the proxy was already destroyed; the first record wins.
	#[track_caller]
	pub fn mark_destroyed(&self, reason: DestroyReason) -> bool {
		let location = Location::caller();
		let mut state = self.state.lock();
		if matches!(*state, ProxyState::Destroyed(_)) {
			return false;
		}
		let record = DestroyRecord {
			object: self.object,
			reason,
			wall_time_ms: SystemTime::now()
				.duration_since(UNIX_EPOCH)
				.map(|d| d.as_millis())
				.unwrap_or_default(),
			location,
			backtrace: Backtrace::capture(),
		};
		let previous = std::mem::replace(&mut *state, ProxyState::Destroyed(Arc::new(record)));
		drop(state);
		drop(previous);
		tracing::debug!(proxy = %self.label, %reason, "proxy destroyed");
		true
	}

	fn channel(&self) -> Result<Channel> {
		match &*self.state.lock() {
			ProxyState::Active(handle) => Ok(handle.channel.clone()),
			ProxyState::Destroyed(record) => Err(Error::UseAfterDestroy {
				object: self.label.clone(),
				record: Arc::clone(record),
			}),
		}
	}
}

impl fmt::Debug for ProxyCore {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ProxyCore")
			.field("label", &self.label)
			.field("state", &*self.state.lock())
			.finish()
	}
}
