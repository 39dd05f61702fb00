//! Forwards host container lifecycle events to the engine's rendering surface.

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use wl_protocol::{FragmentId, HostLifecycleEvent};
use wl_runtime::{DestroyReason, Error, ProxyContext, ProxyCore, Result};

/// Where the hosted surface is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleStage {
	Initial,
	Attached,
	Created,
	Started,
	Resumed,
	Paused,
	Stopped,
	Detached,
	Destroyed,
}

impl LifecycleStage {
	/// Stage reached by forwarding `event` from `self`, if that is a legal move.
	fn after(self, event: HostLifecycleEvent) -> Option<LifecycleStage> {
		use HostLifecycleEvent as E;
		use LifecycleStage as S;
		match (self, event) {
			(S::Initial, E::Attach) => Some(S::Attached),
			(S::Attached, E::Create) => Some(S::Created),
			(S::Created | S::Stopped, E::Start) => Some(S::Started),
			(S::Started | S::Paused, E::Resume) => Some(S::Resumed),
			(S::Resumed, E::Pause) => Some(S::Paused),
			(S::Started | S::Paused, E::Stop) => Some(S::Stopped),
			(S::Attached | S::Created | S::Stopped, E::Detach) => Some(S::Detached),
			(S::Initial | S::Detached, E::Destroy) => Some(S::Destroyed),
			_ => None,
		}
	}

	/// Events that walk `self` down to [`LifecycleStage::Destroyed`].
	fn teardown_path(self) -> &'static [HostLifecycleEvent] {
		use HostLifecycleEvent as E;
		match self {
			LifecycleStage::Initial | LifecycleStage::Detached => &[E::Destroy],
			LifecycleStage::Attached | LifecycleStage::Created | LifecycleStage::Stopped => {
				&[E::Detach, E::Destroy]
			}
			LifecycleStage::Started | LifecycleStage::Paused => &[E::Stop, E::Detach, E::Destroy],
			LifecycleStage::Resumed => &[E::Pause, E::Stop, E::Detach, E::Destroy],
			LifecycleStage::Destroyed => &[],
		}
	}
}

/// Clears the in-flight marker when a forward finishes or its future is dropped.
struct InFlightGuard<'a>(&'a Mutex<BridgeState>);

impl Drop for InFlightGuard<'_> {
	fn drop(&mut self) {
		self.0.lock().in_flight = None;
	}
}

/// Relays `attach → create → start → resume → pause → stop → detach → destroy`
/// one-to-one to the engine.
///
/// `start` may follow `stop` and `resume` may follow `pause`. Any other
/// out-of-order event fails with [`Error::InvalidState`] and is not
/// forwarded.
pub struct EventBridge {
	id: FragmentId,
	core: ProxyCore,
	state: Mutex<BridgeState>,
}

struct BridgeState {
	stage: LifecycleStage,
	/// Event whose engine call has not returned yet.
	in_flight: Option<HostLifecycleEvent>,
}

impl EventBridge {
	pub(crate) fn new(id: FragmentId, context: &Arc<ProxyContext>) -> Self {
		Self {
			id,
			core: ProxyCore::new(format!("Fragment({id})"), id.object_ref(), Arc::clone(context)),
			state: Mutex::new(BridgeState {
				stage: LifecycleStage::Initial,
				in_flight: None,
			}),
		}
	}

	pub fn id(&self) -> FragmentId {
		self.id
	}

	pub fn stage(&self) -> LifecycleStage {
		self.state.lock().stage
	}

	pub async fn on_attach(&self) -> Result<()> {
		self.forward(HostLifecycleEvent::Attach).await
	}

	pub async fn on_create(&self) -> Result<()> {
		self.forward(HostLifecycleEvent::Create).await
	}

	pub async fn on_start(&self) -> Result<()> {
		self.forward(HostLifecycleEvent::Start).await
	}

	pub async fn on_resume(&self) -> Result<()> {
		self.forward(HostLifecycleEvent::Resume).await
	}

	pub async fn on_pause(&self) -> Result<()> {
		self.forward(HostLifecycleEvent::Pause).await
	}

	pub async fn on_stop(&self) -> Result<()> {
		self.forward(HostLifecycleEvent::Stop).await
	}

	pub async fn on_detach(&self) -> Result<()> {
		self.forward(HostLifecycleEvent::Detach).await
	}

	pub async fn on_destroy(&self) -> Result<()> {
		self.forward(HostLifecycleEvent::Destroy).await
	}

	/// Forwards every event still owed to the engine, in order, ending destroyed.
	///
	/// For hosts torn down abnormally. A no-op once destroyed.
	pub async fn teardown(&self) -> Result<()> {
		self.core.check_thread()?;
		for event in self.stage().teardown_path() {
			tracing::debug!(fragment = %self.id, event = event.method(), "synthesizing lifecycle event");
			self.forward(*event).await?;
		}
		Ok(())
	}

	/// Forwards one event. Out-of-order events fail without reaching the engine.
	///
	/// One event is in flight at a time; a second `forward` issued before
	/// the first returns fails with [`Error::InvalidState`].
	pub async fn forward(&self, event: HostLifecycleEvent) -> Result<()> {
		self.core.check_access()?;
		let next = {
			let mut state = self.state.lock();
			if let Some(pending) = state.in_flight {
				return Err(Error::InvalidState(format!(
					"{} cannot be forwarded to {} while {} is in flight",
					event.method(),
					self.core.label(),
					pending.method()
				)));
			}
			let current = state.stage;
			let next = current.after(event).ok_or_else(|| {
				Error::InvalidState(format!(
					"{} cannot be forwarded to {} while {current:?}",
					event.method(),
					self.core.label()
				))
			})?;
			state.in_flight = Some(event);
			next
		};

		let guard = InFlightGuard(&self.state);
		let result = self.core.call_no_result(event.method(), Value::Null).await;
		if result.is_ok() {
			self.state.lock().stage = next;
		}
		drop(guard);
		result?;
		if next == LifecycleStage::Destroyed {
			self.core.mark_destroyed(DestroyReason::EngineConfirmed);
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn visible_and_foreground_phases_can_be_reentered() {
		use HostLifecycleEvent as E;
		let mut stage = LifecycleStage::Initial;
		for event in [
			E::Attach,
			E::Create,
			E::Start,
			E::Resume,
			E::Pause,
			E::Resume,
			E::Pause,
			E::Stop,
			E::Start,
			E::Stop,
			E::Detach,
			E::Destroy,
		] {
			stage = stage
				.after(event)
				.unwrap_or_else(|| panic!("{event:?} rejected from {stage:?}"));
		}
		assert_eq!(stage, LifecycleStage::Destroyed);
	}

	#[test]
	fn skipping_ahead_is_rejected() {
		assert_eq!(LifecycleStage::Initial.after(HostLifecycleEvent::Start), None);
		assert_eq!(LifecycleStage::Created.after(HostLifecycleEvent::Resume), None);
		assert_eq!(LifecycleStage::Resumed.after(HostLifecycleEvent::Stop), None);
		assert_eq!(LifecycleStage::Destroyed.after(HostLifecycleEvent::Attach), None);
	}

	#[test]
	fn teardown_paths_end_destroyed() {
		for start in [
			LifecycleStage::Initial,
			LifecycleStage::Attached,
			LifecycleStage::Created,
			LifecycleStage::Started,
			LifecycleStage::Resumed,
			LifecycleStage::Paused,
			LifecycleStage::Stopped,
			LifecycleStage::Detached,
		] {
			let end = start
				.teardown_path()
				.iter()
				.try_fold(start, |stage, event| stage.after(*event));
			assert_eq!(end, Some(LifecycleStage::Destroyed), "from {start:?}");
		}
		assert!(LifecycleStage::Destroyed.teardown_path().is_empty());
	}
}
