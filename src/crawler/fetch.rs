// ---------------------------------------------------------------------------
// crawler/fetch.rs — URL validation (SSRF guard) and page fetch with retry
// ---------------------------------------------------------------------------

use std::error::Error as _;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::time::Duration;

use url::{Host, Url};

const MAX_PAGE_SIZE: usize = 5 * 1024 * 1024;
const FETCH_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_ATTEMPTS: u32 = 3;
const USER_AGENT: &str = "schemacrawl/0.1 (structured extraction)";
const MAX_REDIRECTS: usize = 10;
const METADATA_IP: Ipv4Addr = Ipv4Addr::new(169, 254, 169, 254);

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("unsupported scheme '{0}' (only http/https)")]
    UnsupportedScheme(String),

    #[error("blocked host: {0}")]
    BlockedHost(String),

    #[error("HTTP {status} for '{url}'")]
    Status { status: u16, url: String },

    #[error("non-HTML content type '{content_type}' for '{url}'")]
    NotHtml { content_type: String, url: String },

    #[error("response too large: {0} bytes")]
    TooLarge(usize),

    #[error("fetching '{url}' failed: {reason}")]
    Network { url: String, reason: String },

    #[error("fetching '{url}' timed out after {attempts} attempts")]
    Timeout { url: String, attempts: u32 },
}

#[derive(Debug, Clone, Copy)]
pub struct FetchOptions {
    pub cache_bypass: bool,
    pub allow_private_hosts: bool,
}

#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub final_url: Url,
    pub status: u16,
    pub body: String,
}

/// Parse and vet a crawl target. Cloud metadata endpoints are refused even
/// when private hosts are allowed.
pub fn validate_url(raw: &str, allow_private_hosts: bool) -> Result<Url, FetchError> {
    let parsed = Url::parse(raw.trim()).map_err(|e| FetchError::InvalidUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;

    match parsed.scheme() {
        "http" | "https" => {}
        other => return Err(FetchError::UnsupportedScheme(other.to_string())),
    }

    let blocked = match parsed.host() {
        None => {
            return Err(FetchError::InvalidUrl { url: raw.to_string(), reason: "missing host".into() });
        }
        Some(Host::Domain(name)) => {
            let lower = name.to_lowercase();
            lower == "metadata.google.internal"
                || (!allow_private_hosts
                    && (lower == "localhost"
                        || lower.ends_with(".localhost")
                        || lower.ends_with(".internal")))
        }
        Some(Host::Ipv4(v4)) => v4 == METADATA_IP || (!allow_private_hosts && is_private_v4(v4)),
        Some(Host::Ipv6(v6)) => match v6.to_ipv4_mapped() {
            Some(v4) => v4 == METADATA_IP || (!allow_private_hosts && is_private_v4(v4)),
            None => !allow_private_hosts && is_private_v6(v6),
        },
    };

    if blocked {
        let host = parsed.host_str().unwrap_or_default();
        return Err(FetchError::BlockedHost(host.to_string()));
    }
    Ok(parsed)
}

fn is_private_v4(ip: Ipv4Addr) -> bool {
    ip.is_loopback() || ip.is_private() || ip.is_link_local() || ip.is_unspecified() || ip.is_broadcast()
}

fn is_private_v6(ip: Ipv6Addr) -> bool {
    let first = ip.segments()[0];
    ip.is_loopback()
        || ip.is_unspecified()
        || (first & 0xfe00) == 0xfc00 // unique local fc00::/7
        || (first & 0xffc0) == 0xfe80 // link local fe80::/10
}

/// HTTP client for page fetches. Every redirect hop goes through
/// [`validate_url`] before it is followed.
pub fn crawl_client(allow_private_hosts: bool) -> Result<reqwest::Client, reqwest::Error> {
    let policy = reqwest::redirect::Policy::custom(move |attempt| {
        if attempt.previous().len() >= MAX_REDIRECTS {
            return attempt.error(format!("too many redirects (max {MAX_REDIRECTS})"));
        }
        match validate_url(attempt.url().as_str(), allow_private_hosts) {
            Ok(_) => attempt.follow(),
            Err(e) => attempt.error(e),
        }
    });

    reqwest::Client::builder()
        .redirect(policy)
        .pool_max_idle_per_host(10)
        .connect_timeout(Duration::from_secs(5))
        .build()
}

/// The guard's own error, when a redirect hop was refused.
fn rejected_redirect(e: &reqwest::Error) -> Option<FetchError> {
    let mut source = e.source();
    while let Some(err) = source {
        if let Some(fetch) = err.downcast_ref::<FetchError>() {
            return Some(fetch.clone());
        }
        source = err.source();
    }
    None
}

/// GET the page, retrying 429/5xx and timeouts with exponential backoff.
pub async fn fetch_page(
    client: &reqwest::Client,
    raw_url: &str,
    opts: FetchOptions,
) -> Result<FetchedPage, FetchError> {
    let url = validate_url(raw_url, opts.allow_private_hosts)?;
    let mut last_err = None;

    for attempt in 0..MAX_ATTEMPTS {
        if attempt > 0 {
            tokio::time::sleep(Duration::from_millis(500 * 2u64.pow(attempt))).await;
            tracing::debug!(url = %url, attempt, "fetch: retrying");
        }

        let mut req = client
            .get(url.as_str())
            .header("User-Agent", USER_AGENT)
            .header("Accept", "text/html,application/xhtml+xml,*/*;q=0.8")
            .timeout(FETCH_TIMEOUT);
        if opts.cache_bypass {
            req = req.header("Cache-Control", "no-cache").header("Pragma", "no-cache");
        }

        let resp = match req.send().await {
            Ok(resp) => resp,
            Err(e) if e.is_timeout() => {
                last_err = Some(FetchError::Timeout { url: raw_url.to_string(), attempts: attempt + 1 });
                continue;
            }
            Err(e) => {
                if let Some(rejected) = rejected_redirect(&e) {
                    return Err(rejected);
                }
                return Err(FetchError::Network { url: raw_url.to_string(), reason: e.to_string() });
            }
        };

        let status = resp.status().as_u16();
        if status == 429 || (500..600).contains(&status) {
            last_err = Some(FetchError::Status { status, url: raw_url.to_string() });
            continue;
        }
        if !resp.status().is_success() {
            return Err(FetchError::Status { status, url: raw_url.to_string() });
        }

        let content_type = resp
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        if !is_textual(&content_type) {
            return Err(FetchError::NotHtml { content_type, url: raw_url.to_string() });
        }
        if let Some(len) = resp.content_length() {
            if len as usize > MAX_PAGE_SIZE {
                return Err(FetchError::TooLarge(len as usize));
            }
        }

        let final_url = resp.url().clone();
        let bytes = resp.bytes().await.map_err(|e| FetchError::Network {
            url: raw_url.to_string(),
            reason: e.to_string(),
        })?;
        if bytes.len() > MAX_PAGE_SIZE {
            return Err(FetchError::TooLarge(bytes.len()));
        }

        return Ok(FetchedPage {
            final_url,
            status,
            body: String::from_utf8_lossy(&bytes).into_owned(),
        });
    }

    Err(last_err.unwrap_or(FetchError::Timeout { url: raw_url.to_string(), attempts: MAX_ATTEMPTS }))
}

fn is_textual(content_type: &str) -> bool {
    content_type.is_empty()
        || content_type.contains("text/")
        || content_type.contains("html")
        || content_type.contains("xml")
}

#[cfg(test)]
pub(crate) mod tests {
    use std::net::SocketAddr;

    use axum::response::Redirect;
    use axum::routing::get;
    use axum::Router;

    use super::*;

    /// Serve `router` on an ephemeral loopback port.
    pub(crate) async fn serve(router: Router) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        addr
    }

    fn local_opts() -> FetchOptions {
        FetchOptions { cache_bypass: false, allow_private_hosts: true }
    }

    #[test]
    fn accepts_public_http_urls() {
        assert!(validate_url("https://example.com/products?page=2", false).is_ok());
        assert!(validate_url("http://93.184.216.34/", false).is_ok());
    }

    #[test]
    fn rejects_other_schemes() {
        assert_eq!(
            validate_url("file:///etc/passwd", false).unwrap_err(),
            FetchError::UnsupportedScheme("file".into())
        );
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(
            validate_url("not a url", false),
            Err(FetchError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn blocks_private_and_internal_hosts() {
        for url in [
            "http://localhost:8000/",
            "http://127.0.0.1/",
            "http://10.0.0.5/admin",
            "http://169.254.169.254/latest/meta-data",
            "http://metadata.google.internal/",
            "http://[::1]/",
        ] {
            assert!(
                matches!(validate_url(url, false), Err(FetchError::BlockedHost(_))),
                "{url} should be blocked"
            );
        }
    }

    #[test]
    fn blocks_ipv6_private_ranges_and_mapped_v4() {
        for url in [
            "http://[::ffff:127.0.0.1]/",
            "http://[::ffff:169.254.169.254]/",
            "http://[::ffff:10.1.2.3]/",
            "http://[fd00::1]/",
            "http://[fc00::abcd]/",
            "http://[fe80::1]/",
            "http://[::]/",
            "http://255.255.255.255/",
        ] {
            assert!(
                matches!(validate_url(url, false), Err(FetchError::BlockedHost(_))),
                "{url} should be blocked"
            );
        }
        assert!(validate_url("http://[2606:4700::1111]/", false).is_ok());
        assert!(validate_url("http://[::ffff:93.184.216.34]/", false).is_ok());
    }

    #[test]
    fn private_hosts_allowed_when_configured() {
        assert!(validate_url("http://127.0.0.1:3000/", true).is_ok());
        assert!(validate_url("http://[fd00::1]/", true).is_ok());
        assert!(validate_url("http://localhost:3000/", true).is_ok());
    }

    #[test]
    fn metadata_endpoints_blocked_even_when_private_allowed() {
        for url in [
            "http://169.254.169.254/latest/meta-data/",
            "http://[::ffff:169.254.169.254]/",
            "http://metadata.google.internal/computeMetadata/v1/",
        ] {
            assert!(
                matches!(validate_url(url, true), Err(FetchError::BlockedHost(_))),
                "{url} should be blocked"
            );
        }
    }

    #[tokio::test]
    async fn redirect_to_metadata_endpoint_is_refused() {
        let router = Router::new().route(
            "/",
            get(|| async { Redirect::temporary("http://169.254.169.254/latest/meta-data/") }),
        );
        let addr = serve(router).await;

        let client = crawl_client(true).unwrap();
        let err = fetch_page(&client, &format!("http://{addr}/"), local_opts()).await.unwrap_err();
        assert_eq!(err, FetchError::BlockedHost("169.254.169.254".into()));
    }

    #[tokio::test]
    async fn allowed_redirects_are_followed() {
        let router = Router::new()
            .route("/old", get(|| async { Redirect::permanent("/new") }))
            .route(
                "/new",
                get(|| async { axum::response::Html("<p>moved here</p>") }),
            );
        let addr = serve(router).await;

        let client = crawl_client(true).unwrap();
        let page = fetch_page(&client, &format!("http://{addr}/old"), local_opts()).await.unwrap();
        assert_eq!(page.status, 200);
        assert_eq!(page.final_url.path(), "/new");
        assert!(page.body.contains("moved here"));
    }

    #[test]
    fn textual_content_types() {
        assert!(is_textual("text/html; charset=utf-8"));
        assert!(is_textual("application/xhtml+xml"));
        assert!(is_textual(""));
        assert!(!is_textual("application/pdf"));
    }
}
