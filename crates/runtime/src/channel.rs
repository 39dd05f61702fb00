//! Typed calls against one engine object.

use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use wl_protocol::ObjectRef;

use crate::error::Result;
use crate::proxy::ProxyContext;

/// Sends calls to a single engine object and decodes the replies.
///
/// A `Channel` performs no thread, liveness or version checks of its own;
/// proxies go through [`crate::ProxyCore`], which does.
#[derive(Clone)]
pub struct Channel {
	target: ObjectRef,
	context: Arc<ProxyContext>,
}

impl Channel {
	pub fn new(target: ObjectRef, context: Arc<ProxyContext>) -> Self {
		Self { target, context }
	}

	/// Sends `method` with `params` and decodes the result as `R`.
	pub async fn send<P: Serialize, R: DeserializeOwned>(&self, method: &str, params: P) -> Result<R> {
		let params = serde_json::to_value(params)?;
		let response = self.context.call_engine(self.target, method, params).await?;
		serde_json::from_value(response).map_err(Into::into)
	}

	/// Sends a call whose result is ignored.
	pub async fn send_no_result<P: Serialize>(&self, method: &str, params: P) -> Result<()> {
		let _: Value = self.send(method, params).await?;
		Ok(())
	}

	pub fn target(&self) -> ObjectRef {
		self.target
	}
}
