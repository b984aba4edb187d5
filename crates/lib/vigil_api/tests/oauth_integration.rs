//! Integration tests for the OAuth2 authorize/callback relay.

mod common;

use axum::body::Body;
use axum::http::{Request, Response, StatusCode, header};
use url::Url;
use vigil_api::config::{ApiConfig, OAuthClientConfig};
use vigil_api::services::cookies::AUTHORIZATION_REQUEST_COOKIE;

use common::{Harness, cookie_value, json_body, send, set_cookie};

fn spotify() -> Harness {
    let mut config = ApiConfig::with_secret("s");
    config.oauth = Some(OAuthClientConfig {
        registration_id: "spotify".into(),
        client_id: "vigil-client".into(),
        authorization_uri: "https://accounts.example/authorize".into(),
        redirect_uri: "https://vigil.example/oauth2/callback".into(),
        scopes: vec!["user-read-email".into(), "user-follow-read".into()],
    });
    Harness::with_config(config)
}

fn get(uri: &str, relay: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(value) = relay {
        builder = builder.header(
            header::COOKIE,
            format!("{AUTHORIZATION_REQUEST_COOKIE}={value}"),
        );
    }
    builder.body(Body::empty()).unwrap()
}

/// Start a flow; returns the relay cookie value and the `state` sent to the provider.
async fn authorize(harness: &Harness) -> (String, String) {
    let response = send(harness.router(), get("/oauth2/authorize", None)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let relay = cookie_value(set_cookie(&response, AUTHORIZATION_REQUEST_COOKIE).unwrap())
        .to_string();
    (relay, query_state(&response))
}

fn query_state(response: &Response<Body>) -> String {
    let location = response.headers()[header::LOCATION].to_str().unwrap();
    let url = Url::parse(location).unwrap();
    url.query_pairs()
        .find(|(k, _)| k == "state")
        .map(|(_, v)| v.into_owned())
        .expect("state parameter")
}

#[tokio::test]
async fn authorize_redirects_with_relay_cookie() {
    let harness = spotify();
    let response = send(harness.router(), get("/oauth2/authorize", None)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    let location = Url::parse(response.headers()[header::LOCATION].to_str().unwrap()).unwrap();
    assert_eq!(location.host_str(), Some("accounts.example"));
    let pairs: Vec<(String, String)> = location.query_pairs().into_owned().collect();
    assert!(pairs.contains(&("response_type".into(), "code".into())));
    assert!(pairs.contains(&("client_id".into(), "vigil-client".into())));
    assert!(pairs.contains(&("scope".into(), "user-follow-read user-read-email".into())));

    let cookie = set_cookie(&response, AUTHORIZATION_REQUEST_COOKIE).unwrap();
    assert!(cookie.contains("HttpOnly"), "{cookie}");
    assert!(cookie.contains("SameSite=Lax"), "{cookie}");
    assert!(cookie.contains("Max-Age=180"), "{cookie}");
    assert!(response.headers().contains_key(header::CONTENT_SECURITY_POLICY));
}

#[tokio::test]
async fn authorize_without_registration_is_not_found() {
    let harness = Harness::new();
    let response = send(harness.router(), get("/oauth2/authorize", None)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn callback_with_matching_state_completes_and_clears_relay() {
    let harness = spotify();
    let (relay, state) = authorize(&harness).await;

    let uri = format!("/oauth2/callback?code=c0de&state={state}");
    let response = send(harness.router(), get(&uri, Some(&relay))).await;
    assert_eq!(response.status(), StatusCode::OK);

    let cleared = set_cookie(&response, AUTHORIZATION_REQUEST_COOKIE).unwrap();
    assert_eq!(cookie_value(cleared), "");
    assert!(cleared.contains("Max-Age=0"), "{cleared}");

    let body = json_body(response).await;
    assert_eq!(body["registrationId"], "spotify");
    assert_eq!(
        body["scopes"],
        serde_json::json!(["user-follow-read", "user-read-email"])
    );
}

#[tokio::test]
async fn callback_with_wrong_state_is_rejected() {
    let harness = spotify();
    let (relay, _) = authorize(&harness).await;

    let response = send(
        harness.router(),
        get("/oauth2/callback?code=c0de&state=forged", Some(&relay)),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let cleared = set_cookie(&response, AUTHORIZATION_REQUEST_COOKIE).unwrap();
    assert_eq!(cookie_value(cleared), "");
}

#[tokio::test]
async fn callback_without_relay_is_rejected() {
    let harness = spotify();
    let (_, state) = authorize(&harness).await;

    let uri = format!("/oauth2/callback?code=c0de&state={state}");
    let response = send(harness.router(), get(&uri, None)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn relay_is_independent_of_the_instance() {
    let first = spotify();
    let (relay, state) = authorize(&first).await;

    // A second server with its own state finishes the flow.
    let second = spotify();
    let uri = format!("/oauth2/callback?code=c0de&state={state}");
    let response = send(second.router(), get(&uri, Some(&relay))).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn callback_reads_sanitized_parameters() {
    let harness = spotify();
    let (relay, state) = authorize(&harness).await;

    let uri = format!("/oauth2/callback?code=%3Ci%3Ec0de%3C%2Fi%3E&state=%3Cb%3E{state}%3C%2Fb%3E");
    let response = send(harness.router(), get(&uri, Some(&relay))).await;
    assert_eq!(response.status(), StatusCode::OK);
}
