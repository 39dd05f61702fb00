use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::{Value, json};
use wl_runtime::{ProxyCore, Result};

use crate::callbacks::MediaCaptureCallback;
use crate::capabilities;

/// Camera and microphone access for one tab.
///
/// Capture requests are denied while no callback is installed.
pub struct MediaCaptureController {
	core: Arc<ProxyCore>,
	callback: Mutex<Option<Arc<dyn MediaCaptureCallback>>>,
}

impl MediaCaptureController {
	pub(crate) fn new(core: Arc<ProxyCore>) -> Self {
		Self {
			core,
			callback: Mutex::new(None),
		}
	}

	pub fn set_media_capture_callback(&self, callback: Option<Arc<dyn MediaCaptureCallback>>) -> Result<()> {
		self.core.check_capability(capabilities::MEDIA_CAPTURE)?;
		*self.callback.lock() = callback;
		Ok(())
	}

	/// Stops every active capture stream in the tab.
	pub async fn stop_media_capturing(&self) -> Result<()> {
		self.core
			.call_gated::<_, Value>(capabilities::MEDIA_CAPTURE, "stopMediaCapturing", Value::Null)
			.await
			.map(|_| ())
	}

	/// Asks the callback and sends its decision back to the engine.
	pub(crate) async fn handle_request(&self, request: u64, audio: bool, video: bool) -> Result<()> {
		let callback = self.callback.lock().clone();
		let allow = match callback {
			Some(callback) => callback.on_media_capture_requested(audio, video),
			None => {
				tracing::debug!(request, "no media capture callback, denying");
				false
			}
		};
		self.core
			.call_no_result(
				"respondToMediaCaptureRequest",
				json!({ "request": request, "allow": allow }),
			)
			.await
	}

	pub(crate) fn handle_state_changed(&self, audio: bool, video: bool) {
		let callback = self.callback.lock().clone();
		if let Some(callback) = callback {
			callback.on_media_capture_state_changed(audio, video);
		}
	}

	pub(crate) fn clear(&self) {
		self.callback.lock().take();
	}
}
