//! Discovers the resource length with a two byte ranged GET, following
//! redirects along the way.

use tracing::{debug, info, warn};
use url::Url;

use crate::config::{check_scheme, SessionConfig};
use crate::error::{DownloadError, Result};
use crate::range::{parse_content_range, range_header};
use crate::sink::MessageSink;
use crate::transport::{HttpTransport, TransportRequest, TransportResponse};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceInfo {
    pub final_url: Url,
    /// `None` when the server ignored the probe range.
    pub total_length: Option<u64>,
    pub supports_partial_content: bool,
}

pub async fn probe(
    transport: &dyn HttpTransport,
    config: &SessionConfig,
    sink: &dyn MessageSink,
) -> Result<ResourceInfo> {
    let mut url = config.url.clone();
    let mut redirects = 0usize;
    let mut seen_total: Option<u64> = None;

    loop {
        let mut request = TransportRequest::get(url.clone());
        for (name, value) in &config.headers {
            request = request.header(name.as_str(), value.as_str());
        }
        let request = request.header("Range", range_header(0, 1));
        debug!(url = %url, headers = ?request.headers, "probing");

        let response = transport.request(request).await?;
        let status = response.status;
        debug!(
            status,
            message = %response.status_message,
            headers = ?response.headers,
            "probe response"
        );

        match status {
            200..=299 => {
                let total = content_range_total(&response, &mut seen_total)?;
                let info = ResourceInfo {
                    final_url: url,
                    total_length: total.flatten(),
                    supports_partial_content: total.is_some(),
                };
                match info.total_length {
                    Some(len) => {
                        info!(len, "the content length of downloading file is {} bytes", len)
                    }
                    None => info!("server ignored the range request, length unknown"),
                }
                return Ok(info);
            }
            300..=399 if response.header("location").is_some() => {
                content_range_total(&response, &mut seen_total)?;
                let location = response.header("location").unwrap_or_default();
                redirects += 1;
                if redirects > config.max_redirects {
                    warn!(redirects, "too many redirects");
                    return Err(DownloadError::TooManyRedirects(config.max_redirects));
                }
                // relative locations inherit scheme, host and port
                url = url
                    .join(location)
                    .map_err(|_| DownloadError::InvalidUrl(location.to_string()))?;
                check_scheme(&url)?;
                sink.emit(&format!("redirect to {}", url));
            }
            400..=499 => {
                return Err(DownloadError::NotFound {
                    status,
                    message: response.status_message,
                })
            }
            _ => {
                return Err(DownloadError::ServerError {
                    status,
                    message: response.status_message,
                })
            }
        }
    }
}

/// The total from a `Content-Range` header, if any. `Some(None)` means the
/// header was present with an unknown (`*`) total. A total that differs
/// from one seen on an earlier hop is an error.
fn content_range_total(
    response: &TransportResponse,
    seen_total: &mut Option<u64>,
) -> Result<Option<Option<u64>>> {
    let total = match response.header("content-range") {
        Some(value) => Some(parse_content_range(value)?.total),
        None => None,
    };
    if let Some(Some(found)) = total {
        if let Some(expected) = *seen_total {
            if expected != found {
                return Err(DownloadError::InconsistentResource { expected, found });
            }
        }
        *seen_total = Some(found);
    }
    Ok(total)
}
