mod common;

use binance_markets::core::kernel::event_type;
use binance_markets::{
    AccountDataSource, Endpoints, ExchangeError, MarketConnector, MarketOptions, SpotMarket,
    UserDataStreamConfig,
};
use common::{
    count_requests, eventually, init_tracing, mount_listen_key, MockStreamServer, LISTEN_KEY,
};
use serde_json::json;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const LISTEN_KEY_PATH: &str = "/api/v3/userDataStream";

fn spot(rest: &MockServer, stream: &MockStreamServer, keepalive: Duration) -> SpotMarket {
    let options = MarketOptions::new("A", "B")
        .endpoints(Endpoints::new(rest.uri(), stream.url()))
        .stream_config(UserDataStreamConfig::default().keepalive_interval(keepalive));
    SpotMarket::new(options).unwrap()
}

#[tokio::test]
async fn test_open_connects_to_listen_key_url_and_forwards_messages() {
    init_tracing();
    let rest = MockServer::start().await;
    mount_listen_key(&rest, LISTEN_KEY_PATH).await;
    let stream_host = MockStreamServer::start().await;
    let market = spot(&rest, &stream_host, Duration::from_secs(60));

    let stream = market.init_account_data().await.unwrap();
    assert_eq!(stream.url(), format!("{}/ws/{}", stream_host.url(), LISTEN_KEY));
    assert!(stream.is_connected());
    assert_eq!(stream_host.paths(), vec![format!("/ws/{}", LISTEN_KEY)]);

    let mut events = market.get_user_data_stream().unwrap().subscribe();
    stream_host.push(r#"{"e":"outboundAccountPosition","E":1564034571105}"#);
    let message = tokio::time::timeout(Duration::from_secs(5), events.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(event_type(&message).as_deref(), Some("outboundAccountPosition"));

    market.delete_account_data().await.unwrap();
}

#[tokio::test]
async fn test_second_init_is_rejected_and_delete_ends_the_stream() {
    let rest = MockServer::start().await;
    mount_listen_key(&rest, LISTEN_KEY_PATH).await;
    let stream_host = MockStreamServer::start().await;
    let market = spot(&rest, &stream_host, Duration::from_secs(60));

    assert!(matches!(
        market.get_user_data_stream(),
        Err(ExchangeError::AccountDataNotInitialized)
    ));

    let stream = market.init_account_data().await.unwrap();
    assert!(matches!(
        market.init_account_data().await,
        Err(ExchangeError::AlreadyInitialized)
    ));
    assert_eq!(count_requests(&rest, "POST", LISTEN_KEY_PATH).await, 1);

    market.delete_account_data().await.unwrap();
    assert!(!stream.is_connected());
    assert!(matches!(
        market.get_user_data_stream(),
        Err(ExchangeError::StreamNotReady)
    ));
    assert_eq!(count_requests(&rest, "DELETE", LISTEN_KEY_PATH).await, 1);

    // already closed: no second revoke
    market.delete_account_data().await.unwrap();
    assert_eq!(count_requests(&rest, "DELETE", LISTEN_KEY_PATH).await, 1);
}

#[tokio::test]
async fn test_remote_close_cancels_keepalive_and_allows_reinit() {
    init_tracing();
    let rest = MockServer::start().await;
    mount_listen_key(&rest, LISTEN_KEY_PATH).await;
    let stream_host = MockStreamServer::start().await;
    let market = spot(&rest, &stream_host, Duration::from_millis(30));

    market.init_account_data().await.unwrap();
    let (rest_ref, market_ref) = (&rest, &market);
    assert!(
        eventually(Duration::from_secs(5), || async move {
            count_requests(rest_ref, "PUT", LISTEN_KEY_PATH).await >= 2
        })
        .await
    );

    stream_host.close_all();
    assert!(
        eventually(Duration::from_secs(5), || async move {
            !market_ref.market().is_stream_open()
        })
        .await
    );
    assert!(
        eventually(Duration::from_secs(5), || async move {
            count_requests(rest_ref, "DELETE", LISTEN_KEY_PATH).await == 1
        })
        .await
    );

    let keepalives = count_requests(&rest, "PUT", LISTEN_KEY_PATH).await;
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(count_requests(&rest, "PUT", LISTEN_KEY_PATH).await, keepalives);
    assert!(matches!(
        market.get_user_data_stream(),
        Err(ExchangeError::StreamNotReady)
    ));

    let stream = market.init_account_data().await.unwrap();
    assert!(stream.is_connected());
    assert_eq!(stream_host.paths().len(), 2);
    market.delete_account_data().await.unwrap();
}

#[tokio::test]
async fn test_keepalive_failure_is_reported_but_keeps_the_session() {
    let rest = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(LISTEN_KEY_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "listenKey": LISTEN_KEY })))
        .mount(&rest)
        .await;
    Mock::given(method("PUT"))
        .and(path(LISTEN_KEY_PATH))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(json!({"code": -1125, "msg": "This listenKey does not exist."})),
        )
        .mount(&rest)
        .await;
    Mock::given(method("DELETE"))
        .and(path(LISTEN_KEY_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&rest)
        .await;
    let stream_host = MockStreamServer::start().await;
    let market = spot(&rest, &stream_host, Duration::from_millis(30));

    let reported = Arc::new(Mutex::new(Vec::new()));
    let sink = reported.clone();
    market.market().on_error(move |error| {
        sink.lock().unwrap().push(error.to_string());
    });

    market.init_account_data().await.unwrap();
    let reported_ref = &reported;
    assert!(
        eventually(Duration::from_secs(5), || async move {
            reported_ref.lock().unwrap().len() >= 2
        })
        .await
    );
    assert!(market.market().is_stream_open());
    assert!(market.get_user_data_stream().unwrap().is_connected());
    assert!(reported.lock().unwrap()[0].contains("This listenKey does not exist."));

    market.delete_account_data().await.unwrap();
}

#[tokio::test]
async fn test_delete_during_open_is_queued_not_dropped() {
    let rest = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(LISTEN_KEY_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "listenKey": LISTEN_KEY }))
                .set_delay(Duration::from_millis(300)),
        )
        .mount(&rest)
        .await;
    Mock::given(method("PUT"))
        .and(path(LISTEN_KEY_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&rest)
        .await;
    Mock::given(method("DELETE"))
        .and(path(LISTEN_KEY_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&rest)
        .await;
    let stream_host = MockStreamServer::start().await;
    let market = spot(&rest, &stream_host, Duration::from_millis(30));

    let (opened, deleted) = tokio::join!(market.init_account_data(), async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        market.delete_account_data().await
    });
    let stream = opened.unwrap();
    deleted.unwrap();

    assert!(!stream.is_connected());
    assert!(!market.market().is_stream_open());
    assert!(matches!(
        market.get_user_data_stream(),
        Err(ExchangeError::StreamNotReady)
    ));
    assert_eq!(count_requests(&rest, "DELETE", LISTEN_KEY_PATH).await, 1);

    let keepalives = count_requests(&rest, "PUT", LISTEN_KEY_PATH).await;
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(count_requests(&rest, "PUT", LISTEN_KEY_PATH).await, keepalives);
}

#[tokio::test]
async fn test_failed_listen_key_creation_leaves_session_uninitialized() {
    let rest = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(LISTEN_KEY_PATH))
        .respond_with(ResponseTemplate::new(500).set_body_string("oops"))
        .mount(&rest)
        .await;
    let stream_host = MockStreamServer::start().await;
    let market = spot(&rest, &stream_host, Duration::from_secs(60));

    assert!(matches!(
        market.init_account_data().await,
        Err(ExchangeError::ApiError { status: 500, .. })
    ));
    assert!(stream_host.paths().is_empty());
    assert!(matches!(
        market.get_user_data_stream(),
        Err(ExchangeError::AccountDataNotInitialized)
    ));
}

#[tokio::test]
async fn test_unreachable_stream_host_revokes_the_new_key() {
    let rest = MockServer::start().await;
    mount_listen_key(&rest, LISTEN_KEY_PATH).await;
    let options = MarketOptions::new("A", "B")
        .endpoints(Endpoints::new(rest.uri(), "ws://127.0.0.1:1"));
    let market = SpotMarket::new(options).unwrap();

    let err = market.init_account_data().await.unwrap_err();
    assert!(err.is_transport());
    assert_eq!(count_requests(&rest, "DELETE", LISTEN_KEY_PATH).await, 1);
    assert!(!market.market().is_stream_open());
}

#[tokio::test]
async fn test_removing_the_account_closes_the_stream() {
    let rest = MockServer::start().await;
    mount_listen_key(&rest, LISTEN_KEY_PATH).await;
    let stream_host = MockStreamServer::start().await;
    let market = spot(&rest, &stream_host, Duration::from_secs(60));

    let stream = market.init_account_data().await.unwrap();
    market.set_account(None).await;

    assert!(!stream.is_connected());
    assert!(!market.market().is_authorized());
    // the key is revoked while the credentials still exist
    assert_eq!(count_requests(&rest, "DELETE", LISTEN_KEY_PATH).await, 1);
    assert!(matches!(
        market.get_user_data_stream(),
        Err(ExchangeError::NotAuthorized)
    ));
}
