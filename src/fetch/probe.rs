use reqwest::{header::CONTENT_LENGTH, Client};
use tracing::{debug, warn};

/// HEAD `url` and read its `Content-Length`.
///
/// Every failure maps to `None`: an unknown size only means the file can never
/// be judged complete, so it is always re-fetched.
pub async fn head_size(client: &Client, url: &str) -> Option<u64> {
    let resp = match client.head(url).send().await {
        Ok(resp) => resp,
        Err(e) => {
            warn!(%url, error = %e, "HEAD failed; size unknown");
            return None;
        }
    };
    if !resp.status().is_success() {
        warn!(%url, status = %resp.status(), "HEAD non-success; size unknown");
        return None;
    }

    // read the header itself; the body of a HEAD response is always empty
    let size = resp
        .headers()
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok());
    debug!(%url, size = ?size, "probed size");
    size
}
