use reqwest::header::RANGE;
use reqwest::{Client, Response, StatusCode};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::time::sleep;
use tracing::debug;

use super::errors::HttpError;

const HTTP_MAX_RETRIES: usize = 3;
const MAX_BACKOFF: Duration = Duration::from_secs(2);

pub async fn get_with_retries(client: &Client, url: &str) -> Result<Response, HttpError> {
    let response = send_with_retries(client, url, None).await?;
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(HttpError::Status { status, body });
    }
    Ok(response)
}

/// Sends a GET, retrying transient failures with jittered backoff.
///
/// `206 Partial Content` and `416 Range Not Satisfiable` are handed back to
/// the caller so that resumable downloads can decide what to do with them.
pub async fn send_with_retries(
    client: &Client,
    url: &str,
    range_start: Option<u64>,
) -> Result<Response, HttpError> {
    let mut backoff = Duration::from_millis(250);
    for attempt in 0..=HTTP_MAX_RETRIES {
        let mut request = client.get(url).header("Accept-Encoding", "identity");
        if let Some(start) = range_start {
            request = request.header(RANGE, format!("bytes={start}-"));
        }

        match request.send().await {
            Ok(response) => {
                let status = response.status();
                if status.is_success() || status == StatusCode::RANGE_NOT_SATISFIABLE {
                    return Ok(response);
                }
                if retryable_status(status) && attempt < HTTP_MAX_RETRIES {
                    debug!(%url, %status, attempt, "retrying request");
                    sleep(with_jitter(backoff)).await;
                    backoff = (backoff * 2).min(MAX_BACKOFF);
                    continue;
                }
                let body = response.text().await.unwrap_or_default();
                return Err(HttpError::Status { status, body });
            }
            Err(err) => {
                if retryable_error(&err) && attempt < HTTP_MAX_RETRIES {
                    debug!(%url, error = %err, attempt, "retrying request");
                    sleep(with_jitter(backoff)).await;
                    backoff = (backoff * 2).min(MAX_BACKOFF);
                    continue;
                }
                return Err(HttpError::Request(err));
            }
        }
    }

    Err(HttpError::Status {
        status: StatusCode::REQUEST_TIMEOUT,
        body: "Request failed after retries.".to_string(),
    })
}

pub fn retryable_status(status: StatusCode) -> bool {
    status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
        || status.is_server_error()
}

pub fn retryable_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}

pub fn with_jitter(base: Duration) -> Duration {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos() as u64;
    base + Duration::from_millis(nanos % 180)
}
