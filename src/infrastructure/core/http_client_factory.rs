use reqwest::Client;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{RetryTransientMiddleware, policies::ExponentialBackoff};
use std::time::Duration;

pub struct HttpClientFactory;

impl HttpClientFactory {
    /// Creates an HTTP client with retry middleware.
    ///
    /// Retry policy: exponential backoff starting at 1s (1s, 2s, 4s),
    /// max 3 attempts. Transient network faults, 5xx and 429 are
    /// retried; 4xx rejections are not.
    pub fn create_client(timeout: Duration) -> ClientWithMiddleware {
        let retry_policy = ExponentialBackoff::builder()
            .retry_bounds(Duration::from_secs(1), Duration::from_secs(4))
            .build_with_max_retries(3);

        let client = Client::builder()
            .pool_max_idle_per_host(5)
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| Client::new());

        ClientBuilder::new(client)
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build()
    }

    /// Plain client without retries, for best-effort data sources whose
    /// failures are tolerated per tick.
    pub fn create_plain_client(timeout: Duration) -> Client {
        Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new())
    }
}

/// Builds a URL with query parameters. reqwest-middleware 0.5 does not
/// expose `.query()`, so the query string is assembled by hand.
pub fn build_url_with_query<K, V>(base_url: &str, params: &[(K, V)]) -> String
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut url = base_url.to_string();
    for (i, (key, value)) in params.iter().enumerate() {
        url.push(if i == 0 && !base_url.contains('?') {
            '?'
        } else {
            '&'
        });
        url.push_str(&percent_encode(key.as_ref()));
        url.push('=');
        url.push_str(&percent_encode(value.as_ref()));
    }
    url
}

/// Minimal percent-encoding: RFC 3986 unreserved bytes pass through,
/// everything else becomes %XX per UTF-8 byte.
fn percent_encode(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for byte in raw.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'_' | b'.' | b'~') {
            out.push(byte as char);
        } else {
            out.push_str(&format!("%{byte:02X}"));
        }
    }
    out
}
