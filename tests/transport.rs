use perp_bridge::core::types::Config;
use perp_bridge::handlers::extended::ExtendedFactory;
use perp_bridge::handlers::grvt::GrvtFactory;
use perp_bridge::transport::{oneshot, stream};
use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const STARK_KEY: &str = "0x1ef15c18599971b7beced415a40f0c7deacfd9b0d1819e03d723d8bc943cfca";

async fn serve_lines(factory: &ExtendedFactory, input: &str) -> Vec<Value> {
    let mut output: Vec<u8> = Vec::new();
    stream::serve(factory, input.as_bytes(), &mut output).await.unwrap();
    String::from_utf8(output)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect()
}

#[tokio::test]
async fn stream_answers_every_line_in_order() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/user/balance"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "OK",
            "data": {"collateralName": "USD", "balance": "10.5"}
        })))
        .expect(2)
        .mount(&server)
        .await;
    let factory = ExtendedFactory::new(Config {
        extended_api_url: Some(server.uri()),
        ..Config::default()
    });

    let account = r#"{"api_key": "k", "private_key": "0x1", "public_key": "0x1", "vault": 3}"#;
    let input = format!(
        "{}\n\n{}\n{}\n{}\n{}\n",
        r#"{"command": "get_public_key", "params": {"private_key": "0x1"}}"#,
        r#"{"command": "nope"}"#,
        "not json",
        format!(r#"{{"command": "get_account_info", "params": {}}}"#, account),
        r#"{"command": "get_account_info"}"#,
    );

    let responses = serve_lines(&factory, &input).await;
    assert_eq!(responses.len(), 5);
    assert_eq!(responses[0], json!({"data": {"starkKey": STARK_KEY}}));
    assert_eq!(responses[1], json!({"error": "Unknown command: nope"}));
    assert!(responses[2]["error"].as_str().unwrap().starts_with("Malformed request: "));
    assert_eq!(responses[3]["data"]["balance"], "10.5");
    // the handler built on the first account request is reused
    assert_eq!(responses[4]["data"]["balance"], "10.5");
}

#[tokio::test]
async fn stream_retries_a_failed_build() {
    let factory = ExtendedFactory::new(Config::default());
    let input = concat!(
        r#"{"command": "get_markets", "params": {"api_key": "k"}}"#,
        "\n",
        r#"{"command": "test_params", "params": {"api_key": "k", "private_key": "0x1", "public_key": "0x1", "vault": 3}}"#,
        "\n",
    );

    let responses = serve_lines(&factory, input).await;
    assert_eq!(
        responses[0],
        json!({"error": "Missing required credentials: private_key, public_key, vault"})
    );
    assert_eq!(responses[1]["data"]["received_params"]["api_key"], "***MASKED***");
    assert_eq!(responses[1]["data"]["service_config"]["environment"], "testnet");
}

#[tokio::test]
async fn oneshot_refuses_unknown_commands() {
    let outcome = oneshot::run(&GrvtFactory::new(Config::default()), "get_orderbook", None).await;
    assert_eq!(outcome.exit_code, 1);
    assert_eq!(outcome.output, json!({"error": "Unknown command: get_orderbook"}));
}

#[tokio::test]
async fn oneshot_refuses_malformed_args() {
    let outcome = oneshot::run(&ExtendedFactory::new(Config::default()), "get_markets", Some("[1, 2]")).await;
    assert_eq!(outcome.exit_code, 1);
    assert_eq!(
        outcome.output,
        json!({"error": "Malformed request: expected a JSON object, got an array"})
    );
}

#[tokio::test]
async fn oneshot_refuses_missing_credentials() {
    let outcome = oneshot::run(&GrvtFactory::new(Config::default()), "get_positions", Some("{}")).await;
    assert_eq!(outcome.exit_code, 1);
    assert_eq!(
        outcome.output,
        json!({"error": "Failed to initialize GRVT API: Missing required credentials: account_id, private_key, api_key"})
    );
}

#[tokio::test]
async fn oneshot_prints_bare_results() {
    let factory = ExtendedFactory::new(Config::default());
    let outcome = oneshot::run(&factory, "get_public_key", Some(r#"{"private_key": "0x1"}"#)).await;
    assert_eq!(outcome.exit_code, 0);
    assert_eq!(outcome.output, json!({"starkKey": STARK_KEY}));
}

#[tokio::test]
async fn oneshot_public_key_without_key_fails_like_a_build() {
    let factory = ExtendedFactory::new(Config::default());
    let outcome = oneshot::run(&factory, "get_public_key", None).await;
    assert_eq!(outcome.exit_code, 1);
    assert_eq!(outcome.output, json!({"error": "Missing required credentials: private_key"}));

    let outcome = oneshot::run(&factory, "get_public_key", Some(r#"{"private_key": "zz"}"#)).await;
    assert_eq!(outcome.exit_code, 1);
}
