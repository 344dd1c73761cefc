use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};
use once_cell::sync::Lazy;
use reqwest::{Client, Url};

use crate::logging::Logger;

static LOGGER: Lazy<Logger> = Lazy::new(|| Logger::new("http"));

/// Builds the reqwest client shared by every request of one scanner.
///
/// `timeout` bounds the whole request, connect included. The client keeps its
/// connection pool for as long as the owner keeps the client.
pub fn build_client(timeout: Duration) -> Result<Client> {
    install_crypto_provider();

    Client::builder()
        // ===== 壓縮 =====
        .brotli(true)
        .gzip(true)
        .zstd(true)
        // ===== 超時設置 =====
        .connect_timeout(timeout)
        .timeout(timeout)
        // ===== TCP 優化 =====
        .tcp_nodelay(true)
        .tcp_keepalive(Duration::from_secs(60))
        // ===== 連接池 =====
        .pool_max_idle_per_host(4)
        .pool_idle_timeout(Duration::from_secs(90))
        .redirect(reqwest::redirect::Policy::limited(5))
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| anyhow!("Failed to create reqwest client: {:?}", e))
}

/// reqwest 使用 rustls-no-provider，必須在建立 client 之前指定加密實作
fn install_crypto_provider() {
    static INSTALLED: Lazy<()> = Lazy::new(|| {
        // 已有其他地方安裝過時會回傳 Err，忽略即可
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
    Lazy::force(&INSTALLED);
}

/// Performs one HTTP GET request and returns the response body as text.
///
/// # Arguments
///
/// * `client`: The client built by [`build_client`].
/// * `base_url`: The endpoint without a query string.
/// * `params`: Query parameters, url-encoded onto `base_url`.
///
/// # Returns
///
/// * `Result<String>`: The body text. An error means no usable body was
///   obtained: the request failed to send, timed out, the status was not 2xx,
///   or the body could not be read. Error texts never contain the query string.
///
/// No retries are attempted.
pub async fn get_text(client: &Client, base_url: &str, params: &[(&str, &str)]) -> Result<String> {
    let url = Url::parse_with_params(base_url, params)
        .map_err(|why| anyhow!("Invalid url '{}' because {}", base_url, why))?;
    let visit_log = format!("GET:{}", url_without_query(&url));
    let start = Instant::now();
    let res = client.get(url).send().await;
    let elapsed = start.elapsed().as_millis();

    let response = match res {
        Ok(response) => response,
        Err(why) => {
            let why = why.without_url();
            LOGGER.error(format!("{} failed because {}. {} ms", visit_log, why, elapsed));
            return Err(anyhow!("{}", why));
        }
    };

    LOGGER.info(format!(
        "{} {} {} ms",
        visit_log,
        response.status(),
        elapsed
    ));

    response
        .error_for_status()
        .map_err(|why| anyhow!("{}", why.without_url()))?
        .text()
        .await
        .map_err(|why| anyhow!("Error reading response body: {}", why.without_url()))
}

fn url_without_query(url: &Url) -> String {
    let mut shown = url.clone();
    shown.set_query(None);
    shown.to_string()
}
