use axum::{
    body::Bytes,
    extract::{Path, RawQuery, State},
    http::{header::CONTENT_TYPE, HeaderMap, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::Value;
use tracing::{instrument, warn};

use crate::error::ApiError;
use crate::state::AppState;

/// Stateless pass-through to the upstream API: same method, same path under
/// the upstream base url, same query string and content type, bearer auth
/// added. Successful upstream responses are relayed verbatim (status + JSON
/// body); failures come back as `{error, details}` with the upstream status,
/// or 500 when the request never got an answer.
#[instrument(skip(state, headers, body))]
pub async fn forward(
    State(state): State<AppState>,
    Path(path): Path<String>,
    RawQuery(query): RawQuery,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let base = state.config.paxos.base_url.trim_end_matches('/');
    let mut url = format!("{base}/{path}");
    if let Some(query) = query {
        url.push('?');
        url.push_str(&query);
    }

    let mut request = state
        .http
        .request(method, &url)
        .bearer_auth(&state.config.paxos.api_token);
    if !body.is_empty() {
        let content_type = headers
            .get(CONTENT_TYPE)
            .cloned()
            .unwrap_or_else(|| HeaderValue::from_static("application/json"));
        request = request.header(CONTENT_TYPE, content_type).body(body.to_vec());
    }

    let response = request.send().await.map_err(|e| {
        warn!(error = %e, %url, "upstream request failed");
        ApiError::ExternalService {
            status: 500,
            details: e.to_string(),
        }
    })?;

    let status = response.status();
    if !status.is_success() {
        let details = response.text().await.unwrap_or_default();
        return Err(ApiError::ExternalService {
            status: status.as_u16(),
            details,
        });
    }

    let value: Value = response.json().await.unwrap_or(Value::Null);
    let status = StatusCode::from_u16(status.as_u16()).unwrap_or(StatusCode::OK);
    Ok((status, Json(value)).into_response())
}
