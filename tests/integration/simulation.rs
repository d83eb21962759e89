//! Operator session simulation.
//!
//! Replays a stream of trade events through the full pipeline while an
//! operator drives the console API: reads the feed, selects an account,
//! searches, configures a wallet and buys.

use alloy::primitives::U256;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tower::ServiceExt;

use friendterm::console::{build_router, ConsoleState};
use friendterm::engine::enricher::AccountEnricher;
use friendterm::engine::feed::LiveFeed;
use friendterm::engine::holdings::HoldingsBook;
use friendterm::engine::notices::NoticeBoard;
use friendterm::engine::orchestrator::TransactionOrchestrator;
use friendterm::engine::poller::SelectedAccountPoller;
use friendterm::engine::queue::DedupQueue;
use friendterm::engine::run_ingest;
use friendterm::engine::search::SearchController;

use crate::mock_services::*;

async fn call(app: &Router, req: Request<Body>) -> (StatusCode, serde_json::Value) {
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let body = axum::body::to_bytes(resp.into_body(), 1_000_000).await.unwrap();
    let json = if body.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&body).unwrap()
    };
    (status, json)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post(uri: &str, body: String) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body))
        .unwrap()
}

#[tokio::test(start_paused = true)]
async fn test_operator_session() {
    let api = MockFriendtech::new();
    let chain = MockChain::new(addr(0xee), U256::from(500u64));
    let feed = LiveFeed::shared(20);
    let notices = Arc::new(NoticeBoard::default());
    let queue = DedupQueue::spawn(AccountEnricher::new(
        api.clone(),
        MockFollowers::with(&[("user3", 77)]),
        feed.clone(),
    ));

    let state = Arc::new(ConsoleState {
        feed,
        queue: queue.clone(),
        poller: Mutex::new(SelectedAccountPoller::new(api.clone(), Duration::from_secs(3))),
        search: SearchController::new(api.clone(), Duration::from_millis(300)),
        orchestrator: TransactionOrchestrator::new(Duration::from_secs(5), notices.clone()),
        notices,
        holdings: HoldingsBook::new(api.clone()),
        connector: Arc::new(MockConnector { chain: chain.clone() }),
        started_at: Utc::now(),
    });
    let app = build_router(state.clone());

    // -- Ingest a burst with repeats and market noise ---------------------

    let (tx, rx) = mpsc::channel(64);
    let ingest = tokio::spawn(run_ingest(rx, queue.clone()));
    for event in [
        creation(addr(1)),
        market_buy(addr(9), addr(1), 2),
        creation(addr(2)),
        creation(addr(2)),
        creation(addr(3)),
    ] {
        tx.send(event).await.unwrap();
    }
    drop(tx);
    let summary = ingest.await.unwrap();
    assert_eq!(summary.events_seen, 5);
    assert_eq!(summary.creations, 4);

    tokio::time::sleep(Duration::from_millis(100)).await;

    let (status, feed) = call(&app, get("/api/feed")).await;
    assert_eq!(status, StatusCode::OK);
    let feed = feed.as_array().unwrap().clone();
    assert_eq!(feed.len(), 3);
    assert_eq!(feed[0]["handle"], "user3");
    assert_eq!(feed[0]["followers"], 77);

    // -- Select the newest account and let the poller run -----------------

    let subject = addr(3);
    let (status, _) = call(&app, post("/api/selected", format!(r#"{{"address":"{subject}"}}"#))).await;
    assert_eq!(status, StatusCode::OK);
    tokio::time::sleep(Duration::from_millis(6_100)).await;
    assert_eq!(api.state_calls_for(subject), 3);

    let (_, selected) = call(&app, get("/api/selected")).await;
    assert_eq!(selected["state"]["share_supply"], 7);

    // -- Search ----------------------------------------------------------

    let (status, results) = call(&app, get("/api/search?q=user3")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(results["results"][0]["handle"], "user3");

    // -- Wallet and trade ------------------------------------------------

    let (status, _) = call(&app, post("/api/wallet", r#"{"private_key":"0xgood"}"#.to_string())).await;
    assert_eq!(status, StatusCode::OK);

    let (status, receipt) = call(
        &app,
        post("/api/buy", format!(r#"{{"subject":"{subject}","quantity":2}}"#)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(receipt["quantity"], 2);
    assert_eq!(receipt["value_wei"], "1000");

    tokio::time::sleep(Duration::from_secs(6)).await;
    let (_, notices) = call(&app, get("/api/notices")).await;
    assert_eq!(notices.as_array().unwrap().last().unwrap()["level"], "success");

    // -- Counters --------------------------------------------------------

    let (_, stats) = call(&app, get("/api/stats")).await;
    assert_eq!(stats["queue"]["processed"], 3);
    assert_eq!(stats["queue"]["coalesced"], 1);
    assert_eq!(stats["search_requests"], 1);
    assert!(stats["signer"].is_string());

    state.poller.lock().await.stop();
    queue.shutdown();
}
