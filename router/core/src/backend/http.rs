//! HTTP plumbing shared by the backend adapters

use std::time::Duration;

use reqwest::{Client, Response};

use crate::document::BackendId;
use crate::error::{BackendError, BackendResult};

/// Longest response body kept in an error message
const MAX_ERROR_BODY: usize = 512;

/// Build a client with connect and request timeouts
pub(crate) fn build_client(backend: BackendId, request_timeout: Duration) -> BackendResult<Client> {
    Client::builder()
        .connect_timeout(Duration::from_secs(5))
        .timeout(request_timeout)
        .build()
        .map_err(|e| BackendError::Unavailable {
            backend,
            message: format!("failed to build HTTP client: {e}"),
        })
}

/// Send a request, mapping transport failures onto [`BackendError`]
///
/// `timeout_ms` is the client's request timeout, reported if it elapses.
pub(crate) async fn send(
    backend: BackendId,
    timeout_ms: u64,
    request: reqwest::RequestBuilder,
) -> BackendResult<Response> {
    let response = request
        .send()
        .await
        .map_err(|e| BackendError::from_reqwest(backend, &e, timeout_ms))?;
    ensure_success(backend, response).await
}

/// Turn a non-2xx response into [`BackendError::Http`]
pub(crate) async fn ensure_success(backend: BackendId, response: Response) -> BackendResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let mut body = response.text().await.unwrap_or_default();
    if body.len() > MAX_ERROR_BODY {
        let mut cut = MAX_ERROR_BODY;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
    }

    Err(BackendError::Http {
        backend,
        status: status.as_u16(),
        body,
    })
}

/// Decode a JSON body, reporting decode failures as invalid responses
pub(crate) async fn json<T: serde::de::DeserializeOwned>(backend: BackendId, response: Response) -> BackendResult<T> {
    response.json::<T>().await.map_err(|e| BackendError::InvalidResponse {
        backend,
        message: e.to_string(),
    })
}

/// Join a base URL and a path without doubling slashes
pub(crate) fn join_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}
