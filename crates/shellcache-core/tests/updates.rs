mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{controller, html, installed, url, MockNetwork, Route};
use shellcache_core::{
    CacheError, CacheStorage, ClientMessage, ControllerEvent, MemoryStorage, MessageReply,
    RefreshOutcome, Request, Response,
};

fn tags(events: &[ControllerEvent]) -> Vec<&'static str> {
    events.iter().map(ControllerEvent::tag).collect()
}

#[tokio::test(start_paused = true)]
async fn test_background_refresh_runs_at_most_once_per_interval() {
    let network = MockNetwork::serving_app();
    let controller = controller(Arc::new(MemoryStorage::new()), network.clone());
    installed(&controller, &network).await;

    for _ in 0..3 {
        controller
            .handle_fetch(&Request::navigate(url("./")))
            .await
            .unwrap();
    }
    controller
        .handle_fetch(&Request::navigate(url("./index.html")))
        .await
        .unwrap();
    controller.wait_background().await;
    assert_eq!(network.call_count(), 1);

    tokio::time::advance(Duration::from_secs(30)).await;
    controller
        .handle_fetch(&Request::navigate(url("./index.html")))
        .await
        .unwrap();
    controller.wait_background().await;
    assert_eq!(network.call_count(), 2);
    assert_eq!(network.calls_to("./index.html"), 1);
    assert!(network.calls().iter().all(common::bypasses_cache));
}

#[tokio::test]
async fn test_background_refresh_announces_changed_page() {
    let network = MockNetwork::serving_app();
    let storage = MemoryStorage::new();
    let controller = controller(Arc::new(storage.clone()), network.clone());
    let version = installed(&controller, &network).await;
    let mut session = controller.clients().connect().await;
    network.serve("./", html("<h1>home v2</h1>"));

    let outcome = controller
        .handle_fetch(&Request::navigate(url("./")))
        .await
        .unwrap();
    // The stale copy is served; the refresh happens afterwards
    assert_eq!(outcome.response().unwrap().text(), "<h1>home</h1>");
    controller.wait_background().await;

    let events = session.drain();
    assert!(matches!(
        events.as_slice(),
        [ControllerEvent::UpdateAvailable { url: Some(changed), .. }] if *changed == url("./").to_string()
    ));
    let store = storage.open(&version).await.unwrap();
    let entry = store.get(url("./").as_str()).await.unwrap().unwrap();
    assert_eq!(entry.response.text(), "<h1>home v2</h1>");
}

#[tokio::test]
async fn test_background_refresh_outcomes() {
    let network = MockNetwork::serving_app();
    let controller = controller(Arc::new(MemoryStorage::new()), network.clone());
    let key = url("./").to_string();

    assert_eq!(
        controller.background_refresh(&key).await,
        RefreshOutcome::NoActiveCache
    );

    let settings = shellcache_core::ControllerConfig {
        refresh_interval_secs: 0,
        ..common::config()
    }
    .settings()
    .unwrap();
    let controller = common::controller_with(
        settings,
        Arc::new(MemoryStorage::new()),
        network.clone(),
    );
    installed(&controller, &network).await;

    assert_eq!(
        controller.background_refresh(&key).await,
        RefreshOutcome::Unchanged
    );
    assert_eq!(
        controller
            .background_refresh(url("./unknown").as_str())
            .await,
        RefreshOutcome::Failed("Unexpected HTTP status 404".to_string())
    );
    network.route("./", Route::Fail);
    assert!(matches!(
        controller.background_refresh(&key).await,
        RefreshOutcome::Failed(_)
    ));
}

#[tokio::test]
async fn test_update_check_without_changes_reports_no_updates_once() {
    let network = MockNetwork::serving_app();
    let controller = controller(Arc::new(MemoryStorage::new()), network.clone());
    installed(&controller, &network).await;
    let mut session = controller.clients().connect().await;

    let report = controller.check_for_updates().await.unwrap();
    assert_eq!(report.checked, 4);
    assert!(!report.has_updates());
    assert!(report.skipped.is_empty());
    assert_eq!(network.call_count(), 4);

    let events = session.drain();
    assert_eq!(tags(&events), vec!["UPDATE_CHECK_STARTED", "NO_UPDATES"]);
}

#[tokio::test]
async fn test_update_check_with_changes_reports_update_available() {
    let network = MockNetwork::serving_app();
    let storage = MemoryStorage::new();
    let controller = controller(Arc::new(storage.clone()), network.clone());
    let version = installed(&controller, &network).await;
    let mut session = controller.clients().connect().await;
    network.serve("./app.js", Response::new(200, "console.log('v2')"));

    let reply = controller.handle_message(ClientMessage::CheckUpdates).await;
    assert_eq!(reply, None);

    let events = session.drain();
    assert_eq!(tags(&events), vec!["UPDATE_CHECK_STARTED", "UPDATE_AVAILABLE"]);
    assert!(matches!(
        events[1],
        ControllerEvent::UpdateAvailable { url: None, .. }
    ));

    let store = storage.open(&version).await.unwrap();
    let entry = store.get(url("./app.js").as_str()).await.unwrap().unwrap();
    assert_eq!(entry.response.text(), "console.log('v2')");
}

#[tokio::test]
async fn test_update_check_skips_unreachable_resource() {
    let network = MockNetwork::serving_app();
    let controller = controller(Arc::new(MemoryStorage::new()), network.clone());
    installed(&controller, &network).await;
    let mut session = controller.clients().connect().await;
    network.route("./styles.css", Route::Fail);
    network.serve("./index.html", html("<h1>index v2</h1>"));

    let report = controller.check_for_updates().await.unwrap();
    assert_eq!(report.skipped, vec![url("./styles.css").to_string()]);
    assert_eq!(report.updated, vec![url("./index.html").to_string()]);
    assert_eq!(
        tags(&session.drain()),
        vec!["UPDATE_CHECK_STARTED", "UPDATE_AVAILABLE"]
    );
}

#[tokio::test(start_paused = true)]
async fn test_update_check_skips_stalled_resource() {
    let network = MockNetwork::serving_app();
    let controller = controller(Arc::new(MemoryStorage::new()), network.clone());
    installed(&controller, &network).await;
    let mut session = controller.clients().connect().await;
    network.route("./app.js", Route::Hang);

    let report = tokio::time::timeout(Duration::from_secs(60), controller.check_for_updates())
        .await
        .expect("check finishes despite a stalled resource")
        .unwrap();
    assert_eq!(report.skipped, vec![url("./app.js").to_string()]);
    assert!(!report.has_updates());
    assert_eq!(
        tags(&session.drain()),
        vec!["UPDATE_CHECK_STARTED", "NO_UPDATES"]
    );
}

#[tokio::test(start_paused = true)]
async fn test_cache_hit_is_not_delayed_by_stalled_refresh() {
    let network = MockNetwork::serving_app();
    let controller = controller(Arc::new(MemoryStorage::new()), network.clone());
    installed(&controller, &network).await;
    let mut session = controller.clients().connect().await;
    network.route("./", Route::Hang);

    let outcome = tokio::time::timeout(
        Duration::from_millis(10),
        controller.handle_fetch(&Request::navigate(url("./"))),
    )
    .await
    .expect("cached page answered without waiting for the refresh")
    .unwrap();
    assert_eq!(outcome.source(), Some(shellcache_core::ResponseSource::Cache));
    assert_eq!(outcome.response().unwrap().text(), "<h1>home</h1>");

    // The refresh itself gives up at the network deadline
    tokio::time::timeout(Duration::from_secs(60), controller.wait_background())
        .await
        .expect("background refresh gives up");
    assert_eq!(network.calls_to("./"), 1);
    assert!(session.drain().is_empty());
}

#[tokio::test]
async fn test_update_check_without_active_cache_fails() {
    let network = MockNetwork::serving_app();
    let controller = controller(Arc::new(MemoryStorage::new()), network.clone());
    let mut session = controller.clients().connect().await;

    let result = controller.check_for_updates().await;
    assert!(matches!(result, Err(CacheError::NoActiveCache)));
    assert_eq!(network.call_count(), 0);
    assert_eq!(
        tags(&session.drain()),
        vec!["UPDATE_CHECK_STARTED", "UPDATE_CHECK_FAILED"]
    );
}

#[tokio::test]
async fn test_check_updates_message_without_active_cache() {
    let network = MockNetwork::serving_app();
    let controller = controller(Arc::new(MemoryStorage::new()), network);
    let mut session = controller.clients().connect().await;

    let reply = controller.handle_message(ClientMessage::CheckUpdates).await;
    assert_eq!(reply, None);
    assert_eq!(
        tags(&session.drain()),
        vec!["UPDATE_CHECK_STARTED", "UPDATE_CHECK_FAILED"]
    );
}

#[tokio::test]
async fn test_cache_name_message() {
    let network = MockNetwork::serving_app();
    let controller = controller(Arc::new(MemoryStorage::new()), network.clone());

    assert_eq!(
        controller.handle_message(ClientMessage::GetCacheName).await,
        Some(MessageReply::CacheName {
            cache_name: None,
            exists: false,
            ready: false,
        })
    );

    let version = installed(&controller, &network).await;
    assert_eq!(
        controller.handle_message(ClientMessage::GetCacheName).await,
        Some(MessageReply::CacheName {
            cache_name: Some(version),
            exists: true,
            ready: true,
        })
    );
}

#[tokio::test]
async fn test_cache_stats_message() {
    let network = MockNetwork::serving_app();
    let controller = controller(Arc::new(MemoryStorage::new()), network.clone());
    let version = installed(&controller, &network).await;

    let Some(MessageReply::CacheStats {
        cache_name,
        count,
        urls,
    }) = controller.handle_message(ClientMessage::GetCacheStats).await
    else {
        panic!("expected cache stats reply");
    };
    assert_eq!(cache_name, Some(version));
    assert_eq!(count, 5);
    assert!(urls.contains(&url("./styles.css").to_string()));
}

#[tokio::test]
async fn test_skip_waiting_message_activates() {
    let network = MockNetwork::serving_app();
    let controller = controller(Arc::new(MemoryStorage::new()), network);
    let mut session = controller.clients().connect().await;

    let report = controller.handle_install().await;
    assert_eq!(controller.current_version().await, None);

    let reply = controller.handle_message(ClientMessage::SkipWaiting).await;
    assert_eq!(reply, None);
    assert_eq!(controller.current_version().await, Some(report.version));
    assert_eq!(tags(&session.drain()), vec!["SW_ACTIVATED"]);
}

#[tokio::test]
async fn test_language_change_is_informational() {
    let network = MockNetwork::serving_app();
    let controller = controller(Arc::new(MemoryStorage::new()), network.clone());
    let mut session = controller.clients().connect().await;

    let reply = controller
        .handle_message(ClientMessage::LanguageChanged {
            language: "ar".to_string(),
        })
        .await;
    assert_eq!(reply, None);
    assert!(session.drain().is_empty());
    assert_eq!(network.call_count(), 0);
}

#[tokio::test]
async fn test_disconnected_sessions_are_not_notified() {
    let network = MockNetwork::serving_app();
    let controller = controller(Arc::new(MemoryStorage::new()), network.clone());
    installed(&controller, &network).await;
    let mut kept = controller.clients().connect().await;
    let dropped = controller.clients().connect().await;
    drop(dropped);

    controller.check_for_updates().await.unwrap();
    assert_eq!(kept.drain().len(), 2);
    assert_eq!(controller.clients().connected().await, 1);
}
