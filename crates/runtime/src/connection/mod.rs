//! In-process request/response connection to an engine.
//!
//! [`Connection`] implements [`EngineTransport`] over tokio channels. The
//! engine side is an [`EnginePeer`], which receives [`Request`]s and answers
//! with JSON messages. The connection correlates responses with pending calls
//! by id and forwards everything else as [`Notification`]s.
//!
//! # Message flow
//!
//! 1. A proxy calls [`EngineTransport::call`] with a target, method and params
//! 2. The connection assigns a sequential id and parks a oneshot sender under it
//! 3. The [`Request`] is queued for the peer
//! 4. The peer replies with a response message carrying the same id
//! 5. [`Connection::run`] resolves the parked sender, or forwards notifications
//!
//! No byte framing happens here; messages travel as `serde_json::Value`.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::task::{Context, Poll};
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use wl_protocol::{Notification, ObjectRef};

use crate::error::{Error, Result, TransportError};
use crate::transport::{EngineTransport, LoadedEngine, TransportFuture};

type CallResult = std::result::Result<Value, TransportError>;

/// Pending calls keyed by request id.
type CallbackMap = Arc<Mutex<HashMap<u32, oneshot::Sender<CallResult>>>>;

/// Timing information attached to every request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metadata {
	/// Milliseconds since the Unix epoch.
	#[serde(rename = "wallTime")]
	pub wall_time: i64,
}

impl Metadata {
	pub fn now() -> Self {
		Self {
			wall_time: SystemTime::now()
				.duration_since(UNIX_EPOCH)
				.map(|d| d.as_millis() as i64)
				.unwrap_or_default(),
		}
	}
}

/// A call on its way to the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
	pub id: u32,
	pub target: ObjectRef,
	pub method: String,
	pub params: Value,
	pub metadata: Metadata,
}

/// Reply to a [`Request`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
	pub id: u32,
	/// Mutually exclusive with `error`.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub result: Option<Value>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub error: Option<ErrorPayload>,
}

/// Engine-reported failure details.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorPayload {
	pub message: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub name: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub stack: Option<String>,
}

/// Anything the engine may send.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Message {
	/// Has an `id` field.
	Response(Response),
	/// Has an `event` field.
	Notification(Notification),
	/// Forward-compatible catch-all.
	Unknown(Value),
}

/// Removes the parked sender if a call future is dropped before its reply arrives.
struct CancelGuard {
	id: u32,
	callbacks: CallbackMap,
	completed: bool,
}

impl CancelGuard {
	fn new(id: u32, callbacks: CallbackMap) -> Self {
		Self {
			id,
			callbacks,
			completed: false,
		}
	}

	fn complete(&mut self) {
		self.completed = true;
	}
}

impl Drop for CancelGuard {
	fn drop(&mut self) {
		if self.completed {
			return;
		}
		if self.callbacks.lock().remove(&self.id).is_some() {
			tracing::debug!(id = self.id, "removed orphaned callback");
		}
	}
}

/// Resolves when the reply for one request arrives.
struct ResponseFuture {
	rx: oneshot::Receiver<CallResult>,
	guard: CancelGuard,
}

impl Future for ResponseFuture {
	type Output = CallResult;

	fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
		match Pin::new(&mut self.rx).poll(cx) {
			Poll::Ready(result) => {
				self.guard.complete();
				Poll::Ready(result.map_err(|_| TransportError::ChannelClosed).and_then(|r| r))
			}
			Poll::Pending => Poll::Pending,
		}
	}
}

/// Client end of an in-process engine connection.
pub struct Connection {
	last_id: AtomicU32,
	callbacks: CallbackMap,
	outbound_tx: mpsc::UnboundedSender<Request>,
	inbound_rx: Mutex<Option<mpsc::UnboundedReceiver<Value>>>,
	notification_tx: mpsc::UnboundedSender<Notification>,
}

/// Everything produced by [`Connection::pair`].
pub struct ConnectionParts {
	pub connection: Arc<Connection>,
	pub peer: EnginePeer,
	/// Notifications forwarded by [`Connection::run`].
	pub notifications: mpsc::UnboundedReceiver<Notification>,
}

impl ConnectionParts {
	/// Packages the client end as a [`LoadedEngine`], returning the connection and peer.
	pub fn into_loaded(self, major_version: u32) -> (LoadedEngine, Arc<Connection>, EnginePeer) {
		let engine = LoadedEngine::new(self.connection.clone(), major_version)
			.with_notifications(self.notifications);
		(engine, self.connection, self.peer)
	}
}

impl Connection {
	/// Creates a connected client/engine pair.
	pub fn pair() -> ConnectionParts {
		let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
		let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
		let (notification_tx, notifications) = mpsc::unbounded_channel();

		let connection = Arc::new(Self {
			last_id: AtomicU32::new(0),
			callbacks: Arc::new(Mutex::new(HashMap::new())),
			outbound_tx,
			inbound_rx: Mutex::new(Some(inbound_rx)),
			notification_tx,
		});
		let peer = EnginePeer {
			requests: outbound_rx,
			inbound_tx,
		};
		ConnectionParts {
			connection,
			peer,
			notifications,
		}
	}

	/// Sends one request and waits for its reply.
	pub async fn send_message(&self, target: ObjectRef, method: &str, params: Value) -> CallResult {
		let id = self.last_id.fetch_add(1, Ordering::SeqCst);
		tracing::debug!(id, %target, method, "sending request");

		let (tx, rx) = oneshot::channel();
		self.callbacks.lock().insert(id, tx);
		let guard = CancelGuard::new(id, Arc::clone(&self.callbacks));

		let request = Request {
			id,
			target,
			method: method.to_string(),
			params,
			metadata: Metadata::now(),
		};
		if self.outbound_tx.send(request).is_err() {
			tracing::error!("failed to queue request: engine end closed");
			return Err(TransportError::ChannelClosed);
		}

		ResponseFuture { rx, guard }.await
	}

	/// Runs the inbound loop until the peer goes away.
	///
	/// Pending calls fail with [`TransportError::ChannelClosed`] on exit.
	pub async fn run(self: Arc<Self>) -> Result<()> {
		let mut inbound = self
			.inbound_rx
			.lock()
			.take()
			.ok_or_else(|| Error::InvalidState("connection is already running".to_string()))?;

		while let Some(value) = inbound.recv().await {
			match serde_json::from_value::<Message>(value) {
				Ok(message) => {
					if let Err(e) = self.dispatch_internal(message) {
						tracing::error!(error = %e, "error dispatching message");
					}
				}
				Err(e) => tracing::error!(error = %e, "failed to parse message"),
			}
		}

		let pending: Vec<_> = self.callbacks.lock().drain().collect();
		for (id, callback) in pending {
			tracing::debug!(id, "failing pending call: engine end closed");
			let _ = callback.send(Err(TransportError::ChannelClosed));
		}
		Ok(())
	}

	#[cfg(test)]
	pub(crate) fn dispatch(&self, message: Message) -> Result<()> {
		self.dispatch_internal(message)
	}

	fn dispatch_internal(&self, message: Message) -> Result<()> {
		match message {
			Message::Response(response) => {
				let callback = self.callbacks.lock().remove(&response.id).ok_or_else(|| {
					Error::Protocol(format!("cannot find request to respond: id={}", response.id))
				})?;
				let result = match response.error {
					Some(payload) => Err(parse_engine_error(payload)),
					None => Ok(response.result.unwrap_or(Value::Null)),
				};
				let _ = callback.send(result);
				Ok(())
			}
			Message::Notification(notification) => {
				tracing::trace!(event = notification.name(), "forwarding notification");
				self.notification_tx
					.send(notification)
					.map_err(|_| Error::Protocol("notification receiver dropped".to_string()))
			}
			Message::Unknown(value) => {
				tracing::debug!(%value, "unknown message type (ignored)");
				Ok(())
			}
		}
	}
}

impl EngineTransport for Connection {
	fn call(&self, target: ObjectRef, method: &str, params: Value) -> TransportFuture<'_> {
		let method = method.to_string();
		Box::pin(async move { self.send_message(target, &method, params).await })
	}
}

fn parse_engine_error(payload: ErrorPayload) -> TransportError {
	TransportError::Remote {
		name: payload.name.unwrap_or_else(|| "Error".to_string()),
		message: payload.message,
		stack: payload.stack,
	}
}

/// Engine end of an in-process connection.
pub struct EnginePeer {
	requests: mpsc::UnboundedReceiver<Request>,
	inbound_tx: mpsc::UnboundedSender<Value>,
}

impl EnginePeer {
	/// Waits for the next request. `None` once the connection is dropped.
	pub async fn next_request(&mut self) -> Option<Request> {
		self.requests.recv().await
	}

	/// Returns a request that is already queued, without waiting.
	pub fn try_next_request(&mut self) -> Option<Request> {
		self.requests.try_recv().ok()
	}

	pub fn respond(&self, id: u32, result: Value) -> Result<()> {
		self.send(&Response {
			id,
			result: Some(result),
			error: None,
		})
	}

	pub fn fail(&self, id: u32, name: &str, message: &str) -> Result<()> {
		self.send(&Response {
			id,
			result: None,
			error: Some(ErrorPayload {
				message: message.to_string(),
				name: Some(name.to_string()),
				stack: None,
			}),
		})
	}

	pub fn notify(&self, notification: &Notification) -> Result<()> {
		self.send(notification)
	}

	/// Sends a raw JSON message, bypassing typed encoding.
	pub fn send_raw(&self, value: Value) -> Result<()> {
		self.inbound_tx.send(value).map_err(|_| TransportError::ChannelClosed.into())
	}

	fn send<T: Serialize>(&self, message: &T) -> Result<()> {
		self.send_raw(serde_json::to_value(message)?)
	}
}
