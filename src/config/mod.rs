use std::{env, path::PathBuf, str::FromStr, time::Duration};

use anyhow::{anyhow, Result};
use config::{Config as config_config, File as config_file};
use serde::{Deserialize, Serialize};

use crate::{declare::PairSpec, logging};

const CONFIG_PATH: &str = "app.json";

const DEFAULT_BASE_URL: &str = "https://www.alphavantage.co/query";
/// Alpha Vantage 免費方案：每分鐘 5 次
const DEFAULT_REQUESTS_PER_WINDOW: u32 = 5;
const DEFAULT_QUOTA_WINDOW_SECS: u64 = 60;
const DEFAULT_SCAN_INTERVAL_SECS: u64 = 300;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

#[derive(Serialize, Deserialize, Default, Debug, Clone)]
pub struct App {
    #[serde(default)]
    pub alpha_vantage: AlphaVantage,
    #[serde(default)]
    pub scanner: Scanner,
}

const ALPHA_VANTAGE_API_KEY: &str = "ALPHA_VANTAGE_API_KEY";
const ALPHA_VANTAGE_BASE_URL: &str = "ALPHA_VANTAGE_BASE_URL";
const FOREX_REQUEST_TIMEOUT_SECS: &str = "FOREX_REQUEST_TIMEOUT_SECS";

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct AlphaVantage {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for AlphaVantage {
    fn default() -> Self {
        AlphaVantage {
            api_key: String::new(),
            base_url: default_base_url(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

const FOREX_PAIRS: &str = "FOREX_PAIRS";
const FOREX_REQUESTS_PER_WINDOW: &str = "FOREX_REQUESTS_PER_WINDOW";
const FOREX_QUOTA_WINDOW_SECS: &str = "FOREX_QUOTA_WINDOW_SECS";
const FOREX_REQUEST_DELAY_SECS: &str = "FOREX_REQUEST_DELAY_SECS";
const FOREX_SCAN_INTERVAL_SECS: &str = "FOREX_SCAN_INTERVAL_SECS";

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Scanner {
    /// "BASE/QUOTE" 格式的貨幣對清單
    #[serde(default = "default_pairs")]
    pub pairs: Vec<String>,
    #[serde(default = "default_requests_per_window")]
    pub requests_per_window: u32,
    #[serde(default = "default_quota_window_secs")]
    pub quota_window_secs: u64,
    /// 有設定時直接使用，不再由配額推算
    #[serde(default)]
    pub request_delay_secs: Option<u64>,
    #[serde(default = "default_scan_interval_secs")]
    pub scan_interval_secs: u64,
}

impl Default for Scanner {
    fn default() -> Self {
        Scanner {
            pairs: default_pairs(),
            requests_per_window: DEFAULT_REQUESTS_PER_WINDOW,
            quota_window_secs: DEFAULT_QUOTA_WINDOW_SECS,
            request_delay_secs: None,
            scan_interval_secs: DEFAULT_SCAN_INTERVAL_SECS,
        }
    }
}

impl App {
    /// 讀取 app.json（不存在時使用預設值），再以環境變數覆蓋
    pub fn get() -> Result<Self> {
        let config_path = config_path();
        let app = if config_path.exists() {
            config_config::builder()
                .add_source(config_file::from(config_path))
                .build()?
                .try_deserialize::<App>()?
        } else {
            App::default()
        };

        Ok(app.override_with_env())
    }

    /// 將來自於 env 的設定值覆蓋掉 json 上的設定值
    fn override_with_env(self) -> Self {
        self.override_with(|key| env::var(key).ok())
    }

    fn override_with<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(api_key) = lookup(ALPHA_VANTAGE_API_KEY) {
            self.alpha_vantage.api_key = api_key.trim().to_string();
        }

        if let Some(base_url) = lookup(ALPHA_VANTAGE_BASE_URL) {
            self.alpha_vantage.base_url = base_url;
        }

        if let Some(v) = lookup(FOREX_REQUEST_TIMEOUT_SECS) {
            self.alpha_vantage.request_timeout_secs =
                parse_non_zero(FOREX_REQUEST_TIMEOUT_SECS, &v, DEFAULT_REQUEST_TIMEOUT_SECS);
        }

        if let Some(pairs) = lookup(FOREX_PAIRS) {
            self.scanner.pairs = pairs
                .split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(String::from)
                .collect();
        }

        if let Some(v) = lookup(FOREX_REQUESTS_PER_WINDOW) {
            self.scanner.requests_per_window =
                parse_non_zero(FOREX_REQUESTS_PER_WINDOW, &v, DEFAULT_REQUESTS_PER_WINDOW);
        }

        if let Some(v) = lookup(FOREX_QUOTA_WINDOW_SECS) {
            self.scanner.quota_window_secs =
                parse_non_zero(FOREX_QUOTA_WINDOW_SECS, &v, DEFAULT_QUOTA_WINDOW_SECS);
        }

        if let Some(v) = lookup(FOREX_REQUEST_DELAY_SECS) {
            match u64::from_str(v.trim()) {
                Ok(secs) => self.scanner.request_delay_secs = Some(secs),
                Err(why) => logging::warn_file_async(format!(
                    "Ignore {}={} because {:?}",
                    FOREX_REQUEST_DELAY_SECS, v, why
                )),
            }
        }

        if let Some(v) = lookup(FOREX_SCAN_INTERVAL_SECS) {
            self.scanner.scan_interval_secs =
                parse_non_zero(FOREX_SCAN_INTERVAL_SECS, &v, DEFAULT_SCAN_INTERVAL_SECS);
        }

        self
    }

    /// 解析掃描清單，任何一組格式錯誤都視為設定錯誤
    pub fn pairs(&self) -> Result<Vec<PairSpec>> {
        if self.scanner.pairs.is_empty() {
            return Err(anyhow!("no currency pair is configured"));
        }

        self.scanner
            .pairs
            .iter()
            .map(|p| PairSpec::from_str(p))
            .collect()
    }

    /// 兩次請求之間的間隔，預設為 配額視窗 / 視窗內可請求次數
    pub fn request_delay(&self) -> Duration {
        if let Some(secs) = self.scanner.request_delay_secs {
            return Duration::from_secs(secs);
        }

        let requests = self.scanner.requests_per_window.max(1);
        Duration::from_secs(self.scanner.quota_window_secs) / requests
    }

    pub fn scan_interval(&self) -> Duration {
        Duration::from_secs(self.scanner.scan_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.alpha_vantage.request_timeout_secs.max(1))
    }
}

fn parse_non_zero<T>(key: &str, value: &str, default: T) -> T
where
    T: FromStr + PartialEq + Default,
{
    match T::from_str(value.trim()) {
        Ok(v) if v != T::default() => v,
        _ => {
            logging::warn_file_async(format!(
                "Ignore {}={} because it is not a positive number",
                key, value
            ));
            default
        }
    }
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

fn default_pairs() -> Vec<String> {
    PairSpec::defaults().iter().map(PairSpec::label).collect()
}

fn default_requests_per_window() -> u32 {
    DEFAULT_REQUESTS_PER_WINDOW
}

fn default_quota_window_secs() -> u64 {
    DEFAULT_QUOTA_WINDOW_SECS
}

fn default_scan_interval_secs() -> u64 {
    DEFAULT_SCAN_INTERVAL_SECS
}

/// 回傳設定檔的路徑
fn config_path() -> PathBuf {
    PathBuf::from(CONFIG_PATH)
}
