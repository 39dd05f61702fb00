// Integration tests for profile data deletion and cookie subscriptions.

mod support;

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use serde_json::json;
use support::{browser, destroyed, profile, session};
use wl::{BrowsingDataType, CookieChangeCause, CookieChangedCallback, DataDeletedCallback, Error, Notification};

fn counting(counter: &Arc<AtomicUsize>) -> Option<DataDeletedCallback> {
	let counter = Arc::clone(counter);
	Some(Box::new(move || {
		counter.fetch_add(1, Ordering::SeqCst);
	}))
}

#[tokio::test]
async fn immediate_deletion_refuses_while_a_browser_uses_the_profile() {
	let (session, engine) = session(88);
	let work = profile(&session, &engine, 3, "work").await;
	let _browser = browser(&session, &engine, &work, 1).await;
	engine.clear();

	let err = work.destroy_and_delete_data_from_disk(None).await.unwrap_err();
	assert!(matches!(err, Error::InvalidState(_)), "{err}");
	assert_eq!(engine.total(), 0);
	assert!(!work.is_destroyed());
}

#[tokio::test]
async fn immediate_deletion_completes_on_engine_report() {
	let (session, engine) = session(88);
	let work = profile(&session, &engine, 3, "work").await;
	let done = Arc::new(AtomicUsize::new(0));
	engine.clear();

	work.destroy_and_delete_data_from_disk(counting(&done)).await.unwrap();
	assert_eq!(engine.methods(), ["destroyAndDeleteDataFromDisk"]);
	assert_eq!(engine.last().unwrap().target, work.id().object_ref());
	assert_eq!(done.load(Ordering::SeqCst), 0);

	session
		.dispatch(Notification::ProfileDataDeleted { profile: work.id() })
		.await
		.unwrap();
	assert_eq!(done.load(Ordering::SeqCst), 1);
	assert!(work.is_destroyed());

	engine.reply_once("getProfile", json!({ "id": 4, "name": "work", "incognito": false }));
	let fresh = session.profile("work", false).await.unwrap();
	assert!(!Arc::ptr_eq(&work, &fresh));
}

#[tokio::test]
async fn deferred_deletion_waits_for_the_last_browser() {
	let (session, engine) = session(88);
	let work = profile(&session, &engine, 3, "work").await;
	let first = browser(&session, &engine, &work, 1).await;
	let second = browser(&session, &engine, &work, 2).await;
	let done = Arc::new(AtomicUsize::new(0));
	engine.clear();

	work.destroy_and_delete_data_from_disk_soon(counting(&done)).await.unwrap();
	work.destroy_and_delete_data_from_disk_soon(counting(&done)).await.unwrap();
	assert_eq!(engine.total(), 0, "deletion must wait for browsers");

	session.dispatch(destroyed(first.id().object_ref())).await.unwrap();
	assert_eq!(engine.total(), 0, "one browser still uses the profile");

	session.dispatch(destroyed(second.id().object_ref())).await.unwrap();
	assert_eq!(engine.count("destroyAndDeleteDataFromDisk"), 1);

	work.destroy_and_delete_data_from_disk_soon(None).await.unwrap();
	assert_eq!(engine.count("destroyAndDeleteDataFromDisk"), 1, "one request in flight at a time");

	session
		.dispatch(Notification::ProfileDataDeleted { profile: work.id() })
		.await
		.unwrap();
	assert_eq!(done.load(Ordering::SeqCst), 2, "every queued callback runs once");
	assert!(work.is_destroyed());
	assert!(session.profiles().is_empty());
}

#[tokio::test]
async fn failed_deletion_request_can_be_retried() {
	let (session, engine) = session(88);
	let work = profile(&session, &engine, 3, "work").await;
	let done = Arc::new(AtomicUsize::new(0));
	engine.clear();

	engine.fail_once("destroyAndDeleteDataFromDisk", "IoError", "disk busy");
	let err = work
		.destroy_and_delete_data_from_disk(counting(&done))
		.await
		.unwrap_err();
	assert!(matches!(err, Error::RemoteTransportFailure(_)), "{err}");

	work.destroy_and_delete_data_from_disk(None).await.unwrap();
	session
		.dispatch(Notification::ProfileDataDeleted { profile: work.id() })
		.await
		.unwrap();
	assert_eq!(done.load(Ordering::SeqCst), 1, "callback from the failed attempt survives");
	assert_eq!(engine.count("destroyAndDeleteDataFromDisk"), 2);
}

#[tokio::test]
async fn cookie_changes_reach_their_subscription() {
	let (session, engine) = session(88);
	let work = profile(&session, &engine, 3, "work").await;
	let cookies = work.cookie_manager();

	let seen: Arc<Mutex<Vec<(String, CookieChangeCause)>>> = Arc::default();
	let sink = Arc::clone(&seen);
	let callback: Arc<dyn CookieChangedCallback> = Arc::new(move |cookie: &str, cause: CookieChangeCause| {
		sink.lock().push((cookie.to_string(), cause));
	});
	engine.reply_once("addCookieChangedCallback", json!({ "subscription": 17 }));
	let subscription = cookies
		.add_cookie_changed_callback("https://a.test/", Some("sid"), callback)
		.await
		.unwrap();
	assert_eq!(subscription.0, 17);
	assert_eq!(engine.last().unwrap().params, json!({ "uri": "https://a.test/", "name": "sid" }));

	let change = |subscription| Notification::CookieChanged {
		profile: work.id(),
		subscription,
		cookie: "sid=1".to_string(),
		cause: CookieChangeCause::Inserted,
	};
	session.dispatch(change(17)).await.unwrap();
	session.dispatch(change(18)).await.unwrap();
	assert_eq!(*seen.lock(), [("sid=1".to_string(), CookieChangeCause::Inserted)]);

	assert!(cookies.remove_cookie_changed_callback(subscription).await.unwrap());
	assert!(!cookies.remove_cookie_changed_callback(subscription).await.unwrap());
	assert_eq!(engine.count("removeCookieChangedCallback"), 1);
	session.dispatch(change(17)).await.unwrap();
	assert_eq!(seen.lock().len(), 1);
}

#[tokio::test]
async fn cookie_and_storage_calls_validate_arguments() {
	let (session, engine) = session(88);
	let work = profile(&session, &engine, 3, "work").await;
	engine.clear();

	assert!(matches!(
		work.cookie_manager().get_cookie("").await,
		Err(Error::InvalidArgument(_))
	));
	assert!(matches!(
		work.clear_browsing_data(&[BrowsingDataType::Cache], 10, 5).await,
		Err(Error::InvalidArgument(_))
	));
	assert_eq!(engine.total(), 0);

	engine.reply_once("setCookie", json!(true));
	assert!(work.cookie_manager().set_cookie("https://a.test/", "a=1").await.unwrap());
	work.clear_browsing_data(&[BrowsingDataType::CookiesAndSiteData], 0, 100)
		.await
		.unwrap();
	work.set_download_directory(Path::new("/tmp/downloads")).await.unwrap();
	assert_eq!(
		engine.calls()[1].params,
		json!({ "types": ["cookiesAndSiteData"], "fromMillis": 0, "toMillis": 100 })
	);
	assert_eq!(engine.last().unwrap().params, json!({ "directory": "/tmp/downloads" }));
}
