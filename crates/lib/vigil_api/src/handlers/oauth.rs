//! OAuth2 login handlers: redirect to the provider, accept its callback.

use std::collections::{BTreeMap, BTreeSet};

use axum::Json;
use axum::extract::State;
use axum::response::Redirect;
use axum_extra::extract::cookie::CookieJar;
use tracing::{debug, info};
use url::Url;
use vigil_core::auth::nonce::generate_state;
use vigil_core::models::oauth::AuthorizationRequest;

use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::middleware::sanitize::SanitizingRequest;
use crate::models::{OAuthCallbackParams, OAuthCallbackResponse};

/// Attribute holding the client registration a request was made for.
pub const REGISTRATION_ID_ATTRIBUTE: &str = "registration_id";

fn rejected() -> AppError {
    AppError::Unauthorized("Unauthorized".into())
}

/// `GET /oauth2/authorize`: relay a new authorization request and redirect to the provider.
pub async fn authorize_handler(
    State(state): State<AppState>,
    jar: CookieJar,
) -> AppResult<(CookieJar, Redirect)> {
    let client = state
        .config
        .oauth
        .as_ref()
        .ok_or_else(|| AppError::NotFound("OAuth2 login is not configured".into()))?;

    let csrf_state = generate_state();
    let scopes: BTreeSet<String> = client.scopes.iter().cloned().collect();
    let scope = scopes.iter().map(String::as_str).collect::<Vec<_>>().join(" ");
    let request_uri = Url::parse_with_params(
        &client.authorization_uri,
        [
            ("response_type", "code"),
            ("client_id", client.client_id.as_str()),
            ("scope", scope.as_str()),
            ("state", csrf_state.as_str()),
            ("redirect_uri", client.redirect_uri.as_str()),
        ],
    )
    .map_err(|e| AppError::Internal(format!("authorization uri: {e}")))?;

    let request = AuthorizationRequest {
        client_id: client.client_id.clone(),
        redirect_uri: client.redirect_uri.clone(),
        authorization_uri: client.authorization_uri.clone(),
        authorization_request_uri: request_uri.to_string(),
        state: csrf_state,
        scopes,
        attributes: BTreeMap::from([(
            REGISTRATION_ID_ATTRIBUTE.to_string(),
            client.registration_id.clone(),
        )]),
        additional_parameters: BTreeMap::new(),
    };
    let jar = state.relay.save(&request, jar)?;
    debug!(registration_id = %client.registration_id, "redirecting to identity provider");
    Ok((jar, Redirect::to(request_uri.as_str())))
}

/// `GET /oauth2/callback`: match the provider's answer to the relayed request.
///
/// The relay cookie is cleared on every outcome.
pub async fn callback_handler(
    State(state): State<AppState>,
    jar: CookieJar,
    view: SanitizingRequest,
) -> (CookieJar, AppResult<Json<OAuthCallbackResponse>>) {
    let params = OAuthCallbackParams {
        code: view.parameter("code"),
        state: view.parameter("state"),
        error: view.parameter("error"),
    };
    let (jar, request) = state.relay.remove(jar);
    (jar, complete(request, params))
}

fn complete(
    request: Option<AuthorizationRequest>,
    params: OAuthCallbackParams,
) -> AppResult<Json<OAuthCallbackResponse>> {
    if let Some(error) = params.error {
        debug!(error, "identity provider returned an error");
        return Err(rejected());
    }
    let Some(request) = request else {
        debug!("callback without a relayed authorization request");
        return Err(rejected());
    };
    if params.state.as_deref() != Some(request.state.as_str()) {
        debug!("callback state does not match the relayed request");
        return Err(rejected());
    }
    if params.code.as_deref().is_none_or(str::is_empty) {
        return Err(AppError::Validation("Missing authorization code".into()));
    }

    let registration_id = request.attributes.get(REGISTRATION_ID_ATTRIBUTE).cloned();
    info!(registration_id = ?registration_id, "authorization callback accepted");
    Ok(Json(OAuthCallbackResponse {
        registration_id,
        scopes: request.scopes.into_iter().collect(),
    }))
}
