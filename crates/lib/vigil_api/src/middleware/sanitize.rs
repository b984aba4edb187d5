//! Sanitizing request view: parameters and headers with markup stripped on access.
//!
//! [`sanitize_request`] also rewrites the request itself, so `Query`, `Form`
//! and `HeaderMap` extractors downstream only ever see sanitized values.

use std::convert::Infallible;

use axum::{
    body::{Body, to_bytes},
    extract::{FromRequestParts, Request},
    http::{
        HeaderMap, HeaderValue, Uri,
        header::{CONTENT_LENGTH, CONTENT_TYPE, HeaderName},
        request::Parts,
        uri::PathAndQuery,
    },
    middleware::Next,
    response::Response,
};
use tracing::debug;
use url::form_urlencoded;
use vigil_core::sanitize::sanitize;

use crate::error::AppError;

/// Largest urlencoded form body buffered for parameter access.
pub const FORM_BODY_LIMIT: usize = 64 * 1024;

/// Read-only view of a request whose parameter and header values come back
/// sanitized. Raw values are kept; sanitizing happens on every accessor call.
#[derive(Debug, Clone, Default)]
pub struct SanitizingRequest {
    params: Vec<(String, String)>,
    headers: HeaderMap,
}

impl SanitizingRequest {
    /// Collect query parameters, optional urlencoded form parameters, and headers.
    pub fn new(uri: &Uri, headers: &HeaderMap, form: Option<&[u8]>) -> Self {
        let mut params: Vec<(String, String)> = uri
            .query()
            .map(|q| form_urlencoded::parse(q.as_bytes()).into_owned().collect())
            .unwrap_or_default();
        if let Some(body) = form {
            params.extend(form_urlencoded::parse(body).into_owned());
        }
        Self {
            params,
            headers: headers.clone(),
        }
    }

    /// First value of parameter `name`.
    pub fn parameter(&self, name: &str) -> Option<String> {
        self.params
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| sanitize(v))
    }

    /// Every value of parameter `name`, or `None` when it never appears.
    pub fn parameter_values(&self, name: &str) -> Option<Vec<String>> {
        let values: Vec<String> = self
            .params
            .iter()
            .filter(|(k, _)| k == name)
            .map(|(_, v)| sanitize(v))
            .collect();
        (!values.is_empty()).then_some(values)
    }

    /// Distinct sanitized parameter names in first-seen order.
    pub fn parameter_names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for (k, _) in &self.params {
            let name = sanitize(k);
            if !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }

    /// First value of header `name`. Non UTF-8 values are skipped.
    pub fn header(&self, name: &str) -> Option<String> {
        self.headers
            .get_all(name)
            .iter()
            .find_map(|v| v.to_str().ok())
            .map(sanitize)
    }

    /// Every value of header `name`.
    pub fn headers(&self, name: &str) -> Vec<String> {
        self.headers
            .get_all(name)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .map(sanitize)
            .collect()
    }

    pub fn header_names(&self) -> impl Iterator<Item = &HeaderName> {
        self.headers.keys()
    }
}

impl<S> FromRequestParts<S> for SanitizingRequest
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    /// The view installed by [`sanitize_request`], or one built from the
    /// query and headers when that middleware is not in the stack.
    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<SanitizingRequest>()
            .cloned()
            .unwrap_or_else(|| SanitizingRequest::new(&parts.uri, &parts.headers, None)))
    }
}

fn is_urlencoded_form(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .is_some_and(|mime| {
            mime.trim()
                .eq_ignore_ascii_case("application/x-www-form-urlencoded")
        })
}

/// Urlencoded `raw` re-encoded with sanitized names and values, or `None`
/// when no pair needed sanitizing.
fn sanitize_urlencoded(raw: &[u8]) -> Option<String> {
    let mut changed = false;
    let pairs: Vec<(String, String)> = form_urlencoded::parse(raw)
        .map(|(k, v)| {
            let (name, value) = (sanitize(&k), sanitize(&v));
            changed |= name != k || value != v;
            (name, value)
        })
        .collect();
    changed.then(|| {
        form_urlencoded::Serializer::new(String::new())
            .extend_pairs(&pairs)
            .finish()
    })
}

fn sanitize_query(uri: &Uri) -> Result<Option<Uri>, AppError> {
    let Some(query) = uri.query().and_then(|q| sanitize_urlencoded(q.as_bytes())) else {
        return Ok(None);
    };
    let invalid = |e: &dyn std::fmt::Display| {
        debug!(error = %e, "sanitized query rejected");
        AppError::Validation("Invalid request URI".into())
    };
    let mut parts = uri.clone().into_parts();
    parts.path_and_query = Some(
        PathAndQuery::try_from(format!("{}?{query}", uri.path())).map_err(|e| invalid(&e))?,
    );
    Uri::from_parts(parts).map(Some).map_err(|e| invalid(&e))
}

fn sanitize_header_values(headers: &mut HeaderMap) {
    for (name, value) in headers.iter_mut() {
        let text = String::from_utf8_lossy(value.as_bytes());
        let clean = sanitize(&text);
        if clean == text {
            continue;
        }
        match HeaderValue::from_str(&clean) {
            Ok(sanitized) => *value = sanitized,
            Err(e) => debug!(header = %name, error = %e, "sanitized header value rejected"),
        }
    }
}

/// Axum middleware: sanitizes the query string, urlencoded form body and
/// header values in place, then installs a [`SanitizingRequest`] over them.
///
/// Form bodies larger than [`FORM_BODY_LIMIT`] are rejected.
pub async fn sanitize_request(request: Request, next: Next) -> Result<Response, AppError> {
    let (mut parts, body) = request.into_parts();

    if let Some(uri) = sanitize_query(&parts.uri)? {
        parts.uri = uri;
    }
    sanitize_header_values(&mut parts.headers);

    let (body, form) = if is_urlencoded_form(&parts.headers) {
        let bytes = to_bytes(body, FORM_BODY_LIMIT).await.map_err(|e| {
            debug!(error = %e, "form body rejected");
            AppError::Validation("Request body too large".into())
        })?;
        let bytes = match sanitize_urlencoded(&bytes) {
            Some(clean) => {
                parts.headers.insert(CONTENT_LENGTH, HeaderValue::from(clean.len()));
                axum::body::Bytes::from(clean)
            }
            None => bytes,
        };
        (Body::from(bytes.clone()), Some(bytes))
    } else {
        (body, None)
    };

    let view = SanitizingRequest::new(&parts.uri, &parts.headers, form.as_deref());
    let mut request = Request::from_parts(parts, body);
    request.extensions_mut().insert(view);
    Ok(next.run(request).await)
}
