//! OAuth2 authorization request carried across the identity-provider redirect.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// An in-flight OAuth2 authorization request.
///
/// The server keeps no copy; the relay cookie is the record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizationRequest {
    pub client_id: String,
    pub redirect_uri: String,
    pub authorization_uri: String,
    pub authorization_request_uri: String,
    pub state: String,
    #[serde(default)]
    pub scopes: BTreeSet<String>,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    #[serde(default)]
    pub additional_parameters: BTreeMap<String, String>,
}
