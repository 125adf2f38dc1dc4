mod support;

use anyhow::Result;
use support::{code, exchange_rate, mount_json, stepping_clock, EXCHANGE_RATE_PATH};
use walletbook::rates::{ApiErrorKind, PairId};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn exchange_rate_inverts_into_symbol_base_pairs() -> Result<()> {
    let server = MockServer::start().await;
    let source = exchange_rate(&server, stepping_clock());

    let body = r#"{
        "base": "USD",
        "date": "2024-05-01",
        "rates": {"EUR": 0.8, "GBP": 0.5, "RUB": 100.0}
    }"#;
    Mock::given(method("GET"))
        .and(path(EXCHANGE_RATE_PATH))
        .and(query_param("base", "USD"))
        .and(query_param("symbols", "EUR,GBP,RUB"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "application/json"))
        .mount(&server)
        .await;

    let rates = source.fetch_rates().await?;

    assert_eq!(rates.len(), 3);
    assert_eq!(rates[&"EUR_USD".parse::<PairId>()?].rate, 1.25);
    assert_eq!(rates[&"GBP_USD".parse::<PairId>()?].rate, 2.0);
    assert_eq!(rates[&"RUB_USD".parse::<PairId>()?].rate, 0.01);
    assert_eq!(rates[&"EUR_USD".parse::<PairId>()?].source, "ExchangeRate");

    Ok(())
}

#[tokio::test]
async fn exchange_rate_missing_rates_field_fails_fast() -> Result<()> {
    let server = MockServer::start().await;
    let source = exchange_rate(&server, stepping_clock());

    mount_json(
        &server,
        EXCHANGE_RATE_PATH,
        200,
        r#"{"success": false, "error": {"code": 101, "type": "missing_access_key"}}"#,
    )
    .await;

    let err = source.fetch_rates().await.unwrap_err();
    assert_eq!(err.provider, "exchangerate");
    match &err.kind {
        ApiErrorKind::Malformed(detail) => assert!(detail.contains("missing_access_key")),
        other => panic!("expected malformed error, got {other:?}"),
    }

    Ok(())
}

#[tokio::test]
async fn exchange_rate_skips_missing_symbols() -> Result<()> {
    let server = MockServer::start().await;
    let source = exchange_rate(&server, stepping_clock())
        .with_symbols(vec![code("EUR"), code("JPY")]);

    mount_json(&server, EXCHANGE_RATE_PATH, 200, r#"{"rates": {"EUR": 0.8}}"#).await;

    let rates = source.fetch_rates().await?;
    let pairs: Vec<String> = rates.keys().map(|p| p.to_string()).collect();
    assert_eq!(pairs, vec!["EUR_USD"]);

    Ok(())
}

#[tokio::test]
async fn exchange_rate_server_error_is_reported() -> Result<()> {
    let server = MockServer::start().await;
    let source = exchange_rate(&server, stepping_clock());

    mount_json(&server, EXCHANGE_RATE_PATH, 503, "unavailable").await;

    let err = source.fetch_rates().await.unwrap_err();
    assert!(matches!(err.kind, ApiErrorKind::Status { status: 503, .. }));
    assert!(err.to_string().starts_with("exchangerate request failed"));

    Ok(())
}
