// Integration tests for engine version gating and tab data limits.

mod support;

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::json;
use support::{FakeEngine, add_tab, browser_session, started};
use wl::{
	Error, LoadedEngine, MAX_TAB_DATA_BYTES, MIN_SUPPORTED_ENGINE_VERSION, NavigateParams, NavigationId, Session,
	SessionConfig, capabilities,
};

fn unsupported(err: &Error) -> (&'static str, u32, u32) {
	match err {
		Error::UnsupportedCapability {
			capability,
			required,
			actual,
		} => (*capability, *required, *actual),
		other => panic!("expected UnsupportedCapability, got {other}"),
	}
}

#[tokio::test]
async fn older_engines_reject_newer_calls_without_sending_them() {
	let (session, engine, browser) = browser_session(85).await;
	let tab = add_tab(&session, browser.id(), 1).await;
	session.dispatch(started(1, 5, "https://a.test/")).await.unwrap();
	let navigation = session.navigation(NavigationId(5)).unwrap();
	engine.clear();

	tab.set_data(&BTreeMap::from([("k".to_string(), "v".to_string())]))
		.await
		.expect("tab data arrived in 85");
	assert_eq!(engine.count("setData"), 1);
	engine.clear();

	let err = navigation.disable_intent_processing().await.unwrap_err();
	assert_eq!(unsupported(&err), ("Navigation.disableIntentProcessing", 88, 85));
	assert!(err.is_recoverable());

	let err = tab
		.navigation_controller()
		.navigate("https://b.test/", NavigateParams::new().disable_intent_processing())
		.await
		.unwrap_err();
	assert_eq!(unsupported(&err).1, 88);

	let err = tab.media_capture_controller().stop_media_capturing().await.unwrap_err();
	assert_eq!(unsupported(&err).1, 87);
	assert!(tab.media_capture_controller().set_media_capture_callback(None).is_err());
	let err = browser
		.profile()
		.cookie_manager()
		.get_response_cookies("https://a.test/")
		.await
		.unwrap_err();
	assert_eq!(unsupported(&err).1, 88);
	let err = browser
		.profile()
		.prerender_controller()
		.schedule_prerender("https://a.test/")
		.await
		.unwrap_err();
	assert_eq!(unsupported(&err).1, 89);

	assert_eq!(engine.total(), 0, "gated calls leaked: {:?}", engine.methods());
	assert!(!session.supports(capabilities::DISABLE_INTENT_PROCESSING));
	assert!(session.supports(capabilities::TAB_DATA));
}

#[tokio::test]
async fn newer_engines_accept_the_same_calls() {
	let (session, engine, browser) = browser_session(88).await;
	let tab = add_tab(&session, browser.id(), 1).await;
	session.dispatch(started(1, 5, "https://a.test/")).await.unwrap();
	let navigation = session.navigation(NavigationId(5)).unwrap();
	engine.clear();

	navigation.disable_intent_processing().await.unwrap();
	tab.navigation_controller()
		.navigate("https://b.test/", NavigateParams::new().disable_intent_processing())
		.await
		.unwrap();
	engine.reply_once("getResponseCookies", json!(["a=1; Path=/"]));
	let cookies = browser
		.profile()
		.cookie_manager()
		.get_response_cookies("https://a.test/")
		.await
		.unwrap();

	assert_eq!(cookies, ["a=1; Path=/"]);
	assert_eq!(
		engine.methods(),
		["disableIntentProcessing", "navigate", "getResponseCookies"]
	);
	assert_eq!(session.engine_version(), 88);
}

#[tokio::test]
async fn tab_data_is_capped_at_4096_bytes() {
	let (session, engine, browser) = browser_session(88).await;
	let tab = add_tab(&session, browser.id(), 1).await;
	engine.clear();

	let key = "key".to_string();
	let at_limit = BTreeMap::from([(key.clone(), "x".repeat(MAX_TAB_DATA_BYTES - key.len()))]);
	tab.set_data(&at_limit).await.unwrap();
	assert_eq!(engine.count("setData"), 1);

	let over = BTreeMap::from([(key.clone(), "x".repeat(MAX_TAB_DATA_BYTES - key.len() + 1))]);
	let err = tab.set_data(&over).await.unwrap_err();
	assert!(matches!(err, Error::InvalidArgument(_)), "{err}");
	assert_eq!(engine.count("setData"), 1);

	engine.reply_once("getData", json!({ "key": "value" }));
	let data = tab.get_data().await.unwrap();
	assert_eq!(data.get("key").map(String::as_str), Some("value"));
}

#[tokio::test]
async fn multibyte_tab_data_counts_bytes_not_chars() {
	let (session, engine, browser) = browser_session(88).await;
	let tab = add_tab(&session, browser.id(), 1).await;
	engine.clear();

	// 2049 two-byte chars: 4098 bytes, well under 4096 chars.
	let data = BTreeMap::from([(String::new(), "é".repeat(2049))]);
	assert!(matches!(tab.set_data(&data).await, Err(Error::InvalidArgument(_))));
	assert_eq!(engine.total(), 0);
}

#[test]
fn engines_below_the_floor_are_refused() {
	let engine: Arc<FakeEngine> = FakeEngine::new();
	let loaded = LoadedEngine::new(engine.clone(), MIN_SUPPORTED_ENGINE_VERSION - 1);
	let err = Session::new(loaded, SessionConfig::default()).unwrap_err();
	assert_eq!(unsupported(&err), ("engine", 83, 82));
	assert_eq!(engine.total(), 0);
}
