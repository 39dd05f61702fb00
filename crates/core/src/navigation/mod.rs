//! Navigation attempts and the per-tab controller that starts them.

mod controller;

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::{Value, json};
use wl_protocol::{NavigationDescriptor, NavigationId, NavigationInfo, NavigationState, TabId};
use wl_runtime::{DestroyReason, Error, ProxyContext, ProxyCore, Result};

pub use controller::NavigationController;

use crate::capabilities;

/// Client-side progress of a [`Navigation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationPhase {
	Started,
	Redirected,
	Completed,
	Failed,
}

impl NavigationPhase {
	pub fn is_terminal(self) -> bool {
		matches!(self, NavigationPhase::Completed | NavigationPhase::Failed)
	}
}

/// One navigation attempt, from start through any redirects to completion or failure.
///
/// The same instance is handed to every [`crate::NavigationCallback`] event
/// of the attempt. It is destroyed right after the completed or failed
/// callbacks return; keep what you need from it before then.
pub struct Navigation {
	id: NavigationId,
	tab: TabId,
	is_same_document: bool,
	core: ProxyCore,
	data: Mutex<NavigationData>,
}

struct NavigationData {
	phase: NavigationPhase,
	info: NavigationInfo,
}

impl Navigation {
	pub(crate) fn new(tab: TabId, descriptor: NavigationDescriptor, context: &Arc<ProxyContext>) -> Arc<Self> {
		Arc::new(Self {
			id: descriptor.id,
			tab,
			is_same_document: descriptor.is_same_document,
			core: ProxyCore::new(
				format!("Navigation({})", descriptor.id),
				descriptor.id.object_ref(),
				Arc::clone(context),
			),
			data: Mutex::new(NavigationData {
				phase: NavigationPhase::Started,
				info: descriptor.info,
			}),
		})
	}

	pub fn id(&self) -> NavigationId {
		self.id
	}

	pub fn tab_id(&self) -> TabId {
		self.tab
	}

	pub fn is_destroyed(&self) -> bool {
		self.core.is_destroyed()
	}

	pub fn phase(&self) -> Result<NavigationPhase> {
		self.read(|d| d.phase)
	}

	pub fn uri(&self) -> Result<String> {
		self.read(|d| d.info.uri.clone())
	}

	/// Every URI visited so far, the original request first.
	pub fn redirect_chain(&self) -> Result<Vec<String>> {
		self.read(|d| d.info.redirect_chain.clone())
	}

	/// Zero until response headers arrive.
	pub fn http_status_code(&self) -> Result<i32> {
		self.read(|d| d.info.http_status_code)
	}

	pub fn state(&self) -> Result<NavigationState> {
		self.read(|d| d.info.state)
	}

	pub fn is_same_document(&self) -> Result<bool> {
		self.core.check_access()?;
		Ok(self.is_same_document)
	}

	pub fn is_error_page(&self) -> Result<bool> {
		self.read(|d| d.info.is_error_page)
	}

	pub fn is_download(&self) -> Result<bool> {
		self.read(|d| d.info.is_download)
	}

	pub fn response_headers(&self) -> Result<BTreeMap<String, String>> {
		self.read(|d| d.info.response_headers.clone())
	}

	/// Adds or replaces a request header for this and any following redirect.
	pub async fn set_request_header(&self, name: &str, value: &str) -> Result<()> {
		self.core.check_capability(capabilities::NAVIGATION_SET_REQUEST_HEADER)?;
		self.ensure_mutable("setRequestHeader")?;
		validate_header_name(name)?;
		validate_header_value(value)?;
		self.core
			.call_no_result("setRequestHeader", json!({ "name": name, "value": value }))
			.await
	}

	pub async fn set_user_agent_string(&self, user_agent: &str) -> Result<()> {
		self.core.check_capability(capabilities::NAVIGATION_SET_USER_AGENT)?;
		self.ensure_mutable("setUserAgentString")?;
		validate_header_value(user_agent)?;
		self.core
			.call_no_result("setUserAgentString", json!({ "userAgent": user_agent }))
			.await
	}

	pub async fn disable_network_error_auto_reload(&self) -> Result<()> {
		self.core.check_capability(capabilities::DISABLE_NETWORK_ERROR_AUTO_RELOAD)?;
		self.ensure_mutable("disableNetworkErrorAutoReload")?;
		self.core.call_no_result("disableNetworkErrorAutoReload", Value::Null).await
	}

	pub async fn disable_intent_processing(&self) -> Result<()> {
		self.core.check_capability(capabilities::DISABLE_INTENT_PROCESSING)?;
		self.ensure_mutable("disableIntentProcessing")?;
		self.core.call_no_result("disableIntentProcessing", Value::Null).await
	}

	/// Moves to `phase` with a fresh snapshot. Fails for transitions the lifecycle does not allow.
	pub(crate) fn advance(&self, phase: NavigationPhase, info: NavigationInfo) -> Result<()> {
		let mut data = self.data.lock();
		let allowed = matches!(
			(data.phase, phase),
			(
				NavigationPhase::Started | NavigationPhase::Redirected,
				NavigationPhase::Redirected | NavigationPhase::Completed | NavigationPhase::Failed
			)
		);
		if !allowed {
			return Err(Error::Protocol(format!(
				"{} cannot move from {:?} to {phase:?}",
				self.core.label(),
				data.phase
			)));
		}
		data.phase = phase;
		data.info = info;
		Ok(())
	}

	#[track_caller]
	pub(crate) fn mark_destroyed(&self, reason: DestroyReason) -> bool {
		self.core.mark_destroyed(reason)
	}

	fn read<T>(&self, f: impl FnOnce(&NavigationData) -> T) -> Result<T> {
		self.core.check_access()?;
		Ok(f(&self.data.lock()))
	}

	fn ensure_mutable(&self, operation: &str) -> Result<()> {
		let phase = self.data.lock().phase;
		if phase.is_terminal() {
			return Err(Error::InvalidState(format!(
				"{operation} is only allowed before the navigation finishes, but {} is {phase:?}",
				self.core.label()
			)));
		}
		Ok(())
	}
}

impl std::fmt::Debug for Navigation {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let data = self.data.lock();
		f.debug_struct("Navigation")
			.field("id", &self.id)
			.field("tab", &self.tab)
			.field("phase", &data.phase)
			.field("uri", &data.info.uri)
			.finish()
	}
}

/// Header names are RFC 9110 tokens.
fn validate_header_name(name: &str) -> Result<()> {
	let is_tchar = |b: u8| b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b);
	if name.is_empty() || !name.bytes().all(is_tchar) {
		return Err(Error::InvalidArgument(format!("invalid header name: {name:?}")));
	}
	Ok(())
}

fn validate_header_value(value: &str) -> Result<()> {
	if value.bytes().any(|b| matches!(b, b'\r' | b'\n' | b'\0')) {
		return Err(Error::InvalidArgument(format!("invalid header value: {value:?}")));
	}
	Ok(())
}
