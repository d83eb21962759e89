//! Trading through the console state: wallet, orchestrator, settlement refresh.

use alloy::primitives::{Address, U256};
use chrono::Utc;
use secrecy::SecretString;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use friendterm::chain::SignerConnector;
use friendterm::console::ConsoleState;
use friendterm::engine::feed::LiveFeed;
use friendterm::engine::holdings::HoldingsBook;
use friendterm::engine::notices::NoticeBoard;
use friendterm::engine::orchestrator::TransactionOrchestrator;
use friendterm::engine::poller::SelectedAccountPoller;
use friendterm::engine::queue::DedupQueue;
use friendterm::engine::enricher::AccountEnricher;
use friendterm::engine::search::SearchController;
use friendterm::types::{Direction, Holding, NoticeLevel, TradeError};

use crate::mock_services::*;

const SETTLE: Duration = Duration::from_secs(5);

struct Harness {
    state: Arc<ConsoleState>,
    api: Arc<MockFriendtech>,
    chain: Arc<MockChain>,
}

fn harness() -> Harness {
    let api = MockFriendtech::new();
    let signer = addr(0xee);
    let chain = MockChain::new(signer, U256::from(1_000_000u64));
    let feed = LiveFeed::shared(20);
    let notices = Arc::new(NoticeBoard::default());

    let state = Arc::new(ConsoleState {
        queue: DedupQueue::spawn(AccountEnricher::new(api.clone(), MockFollowers::with(&[]), feed.clone())),
        feed,
        poller: Mutex::new(SelectedAccountPoller::new(api.clone(), Duration::from_secs(60))),
        search: SearchController::new(api.clone(), Duration::from_millis(300)),
        orchestrator: TransactionOrchestrator::new(SETTLE, notices.clone()),
        notices,
        holdings: HoldingsBook::new(api.clone()),
        connector: Arc::new(MockConnector { chain: chain.clone() }),
        started_at: Utc::now(),
    });

    Harness { state, api, chain }
}

async fn configure(h: &Harness) -> Address {
    let chain = h
        .state
        .connector
        .connect(&SecretString::new("0xgood".to_string()))
        .await
        .unwrap();
    h.state.orchestrator.configure(chain).await
}

async fn buy(h: &Harness, subject: Address, quantity: u64) -> Result<friendterm::types::TradeReceipt, TradeError> {
    let state = h.state.clone();
    h.state
        .orchestrator
        .buy_shares(subject, quantity, move || async move {
            state.refresh_after_trade().await;
        })
        .await
}

#[tokio::test(start_paused = true)]
async fn test_buy_refreshes_holdings_and_selection_after_settle() {
    let h = harness();
    let signer = configure(&h).await;
    let subject = addr(7);
    h.api.set_holdings(vec![Holding {
        subject,
        display_name: "User 7".into(),
        handle: "user7".into(),
        avatar_url: String::new(),
        balance: 3,
    }]);

    h.state.poller.lock().await.select(Some(subject)).await;
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(h.api.state_calls_for(subject), 1);

    let receipt = buy(&h, subject, 3).await.unwrap();
    assert_eq!(receipt.direction, Direction::Buy);
    assert_eq!(receipt.value_wei, U256::from(3_000_000u64));
    assert_eq!(h.chain.submitted()[0].value, U256::from(3_000_000u64));
    assert_eq!(h.state.orchestrator.signer_address().await, Some(signer));

    // Nothing refreshes before the settle delay.
    tokio::time::sleep(SETTLE - Duration::from_millis(100)).await;
    assert_eq!(h.api.holdings_calls(), 0);
    assert!(h.state.holdings.snapshot().await.is_empty());

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(h.api.holdings_calls(), 1);
    assert_eq!(h.state.holdings.snapshot().await[0].balance, 3);
    assert_eq!(h.api.state_calls_for(subject), 2);

    let notices = h.state.notices.recent();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].level, NoticeLevel::Success);
}

#[tokio::test(start_paused = true)]
async fn test_quote_failure_never_submits() {
    let h = harness();
    configure(&h).await;
    h.chain.fail_at(FailAt::Quote);

    let err = buy(&h, addr(7), 1).await.unwrap_err();
    tokio::time::sleep(SETTLE * 2).await;

    assert!(matches!(err, TradeError::Quote { .. }));
    assert!(h.chain.submitted().is_empty());
    assert_eq!(h.api.holdings_calls(), 0);
    assert_eq!(h.state.notices.recent()[0].level, NoticeLevel::Error);
}

#[tokio::test(start_paused = true)]
async fn test_submission_and_confirmation_failures_never_refresh() {
    for stage in [FailAt::Submit, FailAt::Confirm, FailAt::Revert] {
        let h = harness();
        configure(&h).await;
        h.chain.fail_at(stage);

        let err = buy(&h, addr(7), 1).await.unwrap_err();
        tokio::time::sleep(SETTLE * 2).await;

        match stage {
            FailAt::Submit => assert!(matches!(err, TradeError::Submission { .. })),
            _ => assert!(matches!(err, TradeError::Confirmation { .. }), "{stage:?}"),
        }
        assert_eq!(h.api.holdings_calls(), 0, "{stage:?}");
        let notices = h.state.notices.recent();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].level, NoticeLevel::Error);
        assert!(notices[0].description.contains(&addr(7).to_string()));
    }
}

#[tokio::test(start_paused = true)]
async fn test_sell_skips_quote() {
    let h = harness();
    configure(&h).await;

    let state = h.state.clone();
    h.state
        .orchestrator
        .sell_shares(addr(7), 2, move || async move {
            state.refresh_after_trade().await;
        })
        .await
        .unwrap();

    assert_eq!(h.chain.quotes(), 0);
    let order = &h.chain.submitted()[0];
    assert_eq!(order.direction, Direction::Sell);
    assert!(order.value.is_zero());
}

#[tokio::test]
async fn test_trading_requires_wallet() {
    let h = harness();
    let err = buy(&h, addr(7), 1).await.unwrap_err();
    assert!(matches!(err, TradeError::NotConfigured { subject, .. } if subject == addr(7)));
    assert_eq!(h.chain.quotes(), 0);

    let rejected = h
        .state
        .connector
        .connect(&SecretString::new("0xbad".to_string()))
        .await;
    assert!(rejected.is_err());
}
