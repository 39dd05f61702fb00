//! Error types for the proxy runtime.
//!
//! Client-detectable misuse (wrong thread, dead proxy, unsupported capability,
//! bad argument, bad state) is reported before anything reaches the engine.
//! Everything that goes wrong on the far side of the transport is folded into
//! [`Error::RemoteTransportFailure`].

use std::sync::Arc;

use thiserror::Error;

use crate::proxy::DestroyRecord;

/// Result type alias for runtime operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by proxies, registries and the session.
#[derive(Debug, Error)]
pub enum Error {
	/// A proxy was touched from a thread other than the one it is confined to.
	#[error("{object} accessed from thread {actual}, but it is confined to thread {expected}")]
	ThreadViolation {
		object: String,
		expected: String,
		actual: String,
	},

	/// A proxy was used after the engine confirmed its destruction.
	#[error("{object} used after destruction, destroyed at: {record}")]
	UseAfterDestroy {
		object: String,
		record: Arc<DestroyRecord>,
	},

	/// The negotiated engine version is too old for the requested capability.
	#[error("{capability} requires engine version {required}, but the session negotiated {actual}")]
	UnsupportedCapability {
		capability: &'static str,
		required: u32,
		actual: u32,
	},

	/// Invalid argument provided to a method.
	#[error("Invalid argument: {0}")]
	InvalidArgument(String),

	/// The operation is not valid in the object's current state.
	#[error("Invalid state: {0}")]
	InvalidState(String),

	/// The transport or the engine failed to carry out a call.
	#[error("Remote transport failure: {0}")]
	RemoteTransportFailure(#[from] TransportError),

	/// An id was registered twice.
	#[error("{id} is already registered")]
	AlreadyRegistered { id: String },

	/// An id was unregistered without being registered.
	#[error("{id} is not registered")]
	NotRegistered { id: String },

	/// The engine sent something the client cannot reconcile with its object graph.
	#[error("Protocol error: {0}")]
	Protocol(String),
}

impl Error {
	/// Returns true for programming errors that callers are not expected to recover from.
	pub fn is_fatal(&self) -> bool {
		matches!(
			self,
			Error::ThreadViolation { .. }
				| Error::UseAfterDestroy { .. }
				| Error::AlreadyRegistered { .. }
				| Error::NotRegistered { .. }
		)
	}

	/// Returns true for errors a well-behaved caller can handle and retry around.
	pub fn is_recoverable(&self) -> bool {
		matches!(
			self,
			Error::UnsupportedCapability { .. } | Error::InvalidArgument(_) | Error::InvalidState(_)
		)
	}

	/// Returns the destruction record for [`Error::UseAfterDestroy`].
	pub fn destroy_record(&self) -> Option<&DestroyRecord> {
		match self {
			Error::UseAfterDestroy { record, .. } => Some(record),
			_ => None,
		}
	}
}

impl From<serde_json::Error> for Error {
	fn from(err: serde_json::Error) -> Self {
		Error::RemoteTransportFailure(TransportError::Json(err))
	}
}

/// Failures below the proxy layer.
#[derive(Debug, Error)]
pub enum TransportError {
	/// The channel to the engine is gone.
	#[error("Channel closed unexpectedly")]
	ChannelClosed,

	/// The engine rejected the call.
	#[error("{name}: {message}")]
	Remote {
		/// Error type name reported by the engine.
		name: String,
		message: String,
		/// Engine-side stack trace, if the engine sent one.
		stack: Option<String>,
	},

	/// A request or reply could not be (de)serialized.
	#[error("JSON error: {0}")]
	Json(#[from] serde_json::Error),

	/// The engine did not answer in time.
	#[error("Timeout: {0}")]
	Timeout(String),
}

impl TransportError {
	/// Returns the engine-reported error name for [`TransportError::Remote`].
	pub fn remote_name(&self) -> Option<&str> {
		match self {
			TransportError::Remote { name, .. } => Some(name),
			_ => None,
		}
	}
}
