//! # Alpha Vantage 匯率採集模組
//!
//! 透過 Alpha Vantage 官方 REST API 取得外匯即時匯率。
//!
//! ## 站點資訊
//!
//! - 來源域名：`www.alphavantage.co`
//! - 存取方式：HTTP GET 搭配 `apikey` 查詢參數
//! - 主要端點：`/query?function=CURRENCY_EXCHANGE_RATE`
//! - 免費方案配額：每分鐘 5 次，超過時回應內會帶 `Note` 欄位

use std::time::Duration;

use anyhow::Result;
use reqwest::Client;

use crate::{config, util};

/// 即時匯率子模組。
pub mod rate;

/// Alpha Vantage 匯率採集器。
///
/// 持有同一個 reqwest client，整個掃描器生命週期內重複使用連線。
pub struct AlphaVantage {
    client: Client,
    base_url: String,
    api_key: String,
}

impl AlphaVantage {
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self> {
        Ok(AlphaVantage {
            client: util::http::build_client(timeout)?,
            base_url: base_url.to_string(),
            api_key: api_key.to_string(),
        })
    }

    pub fn from_config(app: &config::App) -> Result<Self> {
        Self::new(
            &app.alpha_vantage.base_url,
            &app.alpha_vantage.api_key,
            app.request_timeout(),
        )
    }
}
