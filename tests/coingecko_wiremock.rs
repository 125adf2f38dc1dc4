mod support;

use anyhow::Result;
use support::{code, coingecko, mount_json, stepping_clock, COINGECKO_PATH};
use walletbook::rates::{ApiErrorKind, PairId};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn coingecko_fetch_rates_hits_mock_server() -> Result<()> {
    let server = MockServer::start().await;
    let source = coingecko(&server, stepping_clock())
        .with_symbols(vec![code("BTC"), code("ETH")]);

    let body = r#"{"bitcoin": {"usd": 60000.0}, "ethereum": {"usd": 3000.5}}"#;
    Mock::given(method("GET"))
        .and(path(COINGECKO_PATH))
        .and(query_param("ids", "bitcoin,ethereum"))
        .and(query_param("vs_currencies", "usd"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "application/json"))
        .mount(&server)
        .await;

    let rates = source.fetch_rates().await?;

    assert_eq!(rates.len(), 2);
    let btc = &rates[&"BTC_USD".parse::<PairId>()?];
    assert_eq!(btc.rate, 60000.0);
    assert_eq!(btc.source, "CoinGecko");
    assert_eq!(rates[&"ETH_USD".parse::<PairId>()?].rate, 3000.5);

    Ok(())
}

#[tokio::test]
async fn coingecko_skips_assets_missing_from_response() -> Result<()> {
    let server = MockServer::start().await;
    let source = coingecko(&server, stepping_clock());

    mount_json(
        &server,
        COINGECKO_PATH,
        200,
        r#"{"bitcoin": {"usd": 60000}, "solana": {}}"#,
    )
    .await;

    let rates = source.fetch_rates().await?;
    let pairs: Vec<String> = rates.keys().map(|p| p.to_string()).collect();
    assert_eq!(pairs, vec!["BTC_USD"]);

    Ok(())
}

#[tokio::test]
async fn coingecko_ignores_non_positive_prices() -> Result<()> {
    let server = MockServer::start().await;
    let source = coingecko(&server, stepping_clock());

    mount_json(
        &server,
        COINGECKO_PATH,
        200,
        r#"{"bitcoin": {"usd": 0}, "ethereum": {"usd": -3}, "solana": {"usd": 150.25}}"#,
    )
    .await;

    let rates = source.fetch_rates().await?;
    assert_eq!(rates.len(), 1);
    assert_eq!(rates[&"SOL_USD".parse::<PairId>()?].rate, 150.25);

    Ok(())
}

#[tokio::test]
async fn coingecko_status_error_is_reported() -> Result<()> {
    let server = MockServer::start().await;
    let source = coingecko(&server, stepping_clock());

    mount_json(&server, COINGECKO_PATH, 429, r#"{"status": "rate limited"}"#).await;

    let err = source.fetch_rates().await.unwrap_err();
    assert_eq!(err.provider, "coingecko");
    match err.kind {
        ApiErrorKind::Status { status, body } => {
            assert_eq!(status, 429);
            assert!(body.contains("rate limited"));
        }
        other => panic!("expected status error, got {other:?}"),
    }

    Ok(())
}

#[tokio::test]
async fn coingecko_malformed_body_is_reported() -> Result<()> {
    let server = MockServer::start().await;
    let source = coingecko(&server, stepping_clock());

    mount_json(&server, COINGECKO_PATH, 200, "<html>oops</html>").await;

    let err = source.fetch_rates().await.unwrap_err();
    assert!(matches!(err.kind, ApiErrorKind::Malformed(_)));

    Ok(())
}

#[tokio::test]
async fn coingecko_unknown_symbols_skip_http() -> Result<()> {
    let server = MockServer::start().await;
    let source = coingecko(&server, stepping_clock()).with_symbols(vec![code("ZZZ")]);

    let rates = source.fetch_rates().await?;
    assert!(rates.is_empty());

    let requests = server.received_requests().await.unwrap_or_default();
    assert!(requests.is_empty(), "expected no HTTP requests");

    Ok(())
}

#[tokio::test]
async fn coingecko_network_failure_is_reported() -> Result<()> {
    let source = walletbook::rates::providers::CoinGeckoSource::new(code("USD"))
        .with_endpoint("http://127.0.0.1:9/api/v3/simple/price");

    let err = source.fetch_rates().await.unwrap_err();
    assert!(matches!(err.kind, ApiErrorKind::Network(_)));

    Ok(())
}
