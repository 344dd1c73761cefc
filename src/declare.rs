use std::{fmt, str::FromStr};

use anyhow::{anyhow, Result};
use chrono::{DateTime, Local};
use rust_decimal::Decimal;
use strum::{Display, EnumString};

/// 貨幣對，例如 EUR/USD
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PairSpec {
    /// 基礎貨幣
    pub base: String,
    /// 報價貨幣
    pub quote: String,
}

impl PairSpec {
    pub fn new(base: &str, quote: &str) -> Self {
        PairSpec {
            base: base.to_uppercase(),
            quote: quote.to_uppercase(),
        }
    }

    /// 報表上使用的鍵名 "BASE/QUOTE"
    pub fn label(&self) -> String {
        format!("{}/{}", self.base, self.quote)
    }

    /// 預設監控的五組主要貨幣對
    pub fn defaults() -> Vec<PairSpec> {
        vec![
            PairSpec::new("EUR", "USD"),
            PairSpec::new("GBP", "USD"),
            PairSpec::new("USD", "JPY"),
            PairSpec::new("USD", "CHF"),
            PairSpec::new("AUD", "USD"),
        ]
    }
}

impl fmt::Display for PairSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.base, self.quote)
    }
}

impl FromStr for PairSpec {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let (base, quote) = s
            .trim()
            .split_once('/')
            .ok_or_else(|| anyhow!("'{}' is not a BASE/QUOTE pair", s))?;
        let (base, quote) = (base.trim(), quote.trim());

        if base.is_empty() || quote.is_empty() || quote.contains('/') {
            return Err(anyhow!("'{}' is not a BASE/QUOTE pair", s));
        }

        Ok(PairSpec::new(base, quote))
    }
}

/// 單次請求失敗的分類
#[derive(Debug, Copy, Clone, PartialEq, Eq, Display)]
pub enum FailureKind {
    /// 供應商回報已超過配額
    Throttled,
    /// 供應商回報錯誤（未知貨幣對、金鑰錯誤等）
    ProviderError,
    /// 連線逾時、DNS、非 2xx 狀態碼
    TransportError,
    /// 回應格式無法辨識
    MalformedResponse,
}

/// 成功取得的即時匯率
#[derive(Debug, Clone, PartialEq)]
pub struct Quote {
    pub base: String,
    pub quote: String,
    pub rate: Decimal,
    pub bid: Decimal,
    pub ask: Decimal,
    /// 供應商提供的最後更新時間，原樣保留
    pub last_updated: String,
    pub timezone: String,
}

/// 一次請求的結果，失敗也以資料回傳
#[derive(Debug, Clone, PartialEq)]
pub enum QuoteResult {
    Success(Quote),
    Failure { kind: FailureKind, detail: String },
}

impl QuoteResult {
    pub fn failure(kind: FailureKind, detail: impl Into<String>) -> Self {
        QuoteResult::Failure {
            kind,
            detail: detail.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, QuoteResult::Success(_))
    }
}

/// 一輪掃描的結果，依掃描清單的順序排列
#[derive(Debug, Clone)]
pub struct ScanReport {
    /// 本輪開始掃描的時間
    pub scanned_at: DateTime<Local>,
    pub entries: Vec<(String, QuoteResult)>,
}

impl ScanReport {
    pub fn new(scanned_at: DateTime<Local>) -> Self {
        ScanReport {
            scanned_at,
            entries: Vec::new(),
        }
    }

    pub fn push(&mut self, pair: &PairSpec, result: QuoteResult) {
        self.entries.push((pair.label(), result));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn failures(&self) -> usize {
        self.entries
            .iter()
            .filter(|(_, result)| !result.is_success())
            .count()
    }
}

/// 掃描模式
#[derive(Debug, Copy, Clone, PartialEq, Eq, EnumString)]
pub enum ScanMode {
    /// 單次掃描
    #[strum(serialize = "1")]
    Single,
    /// 持續掃描
    #[strum(serialize = "2")]
    Continuous,
}
