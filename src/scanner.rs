use std::{
    io::{self, Write},
    time::{Duration, Instant},
};

use chrono::Local;

use crate::{
    crawler::RateProvider,
    declare::{PairSpec, QuoteResult, ScanReport},
    logging,
    scheduler::Shutdown,
    util::text::format_price,
};

/// 依序查詢每一組貨幣對，兩次請求之間固定等待 `request_delay` 以符合供應商配額
pub struct Scanner<P: RateProvider> {
    provider: P,
    request_delay: Duration,
}

impl<P: RateProvider> Scanner<P> {
    pub fn new(provider: P, request_delay: Duration) -> Self {
        Scanner {
            provider,
            request_delay,
        }
    }

    #[cfg(test)]
    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn request_delay(&self) -> Duration {
        self.request_delay
    }

    /// 取得單一貨幣對的匯率，失敗也會以 `QuoteResult::Failure` 回傳
    pub async fn fetch_rate(&self, pair: &PairSpec) -> QuoteResult {
        self.provider.fetch_rate(pair).await
    }

    /// 掃描一輪
    ///
    /// 每組貨幣對都會送出一次請求並得到一筆結果，順序與 `pairs` 相同。
    /// 失敗不會中斷本輪，也不會縮短下一次請求前的等待。
    pub async fn run_cycle(&self, pairs: &[PairSpec]) -> ScanReport {
        self.scan(pairs, None).await.0
    }

    /// 與 [`Scanner::run_cycle`] 相同，但在請求之間的等待期間收到 `shutdown` 就停止
    ///
    /// 進行中的請求會先完成。被中斷時回傳 `None`，已取得的部分結果直接丟棄。
    pub async fn run_cycle_until(
        &self,
        pairs: &[PairSpec],
        shutdown: &Shutdown,
    ) -> Option<ScanReport> {
        match self.scan(pairs, Some(shutdown)).await {
            (report, true) => Some(report),
            (_, false) => None,
        }
    }

    async fn scan(&self, pairs: &[PairSpec], shutdown: Option<&Shutdown>) -> (ScanReport, bool) {
        let mut report = ScanReport::new(Local::now());
        let start = Instant::now();
        let stopped = || shutdown.is_some_and(Shutdown::is_triggered);

        for (i, pair) in pairs.iter().enumerate() {
            if stopped() {
                logging::info_file_async(format!(
                    "Scan cancelled after {} of {} pairs",
                    report.len(),
                    pairs.len()
                ));
                return (report, false);
            }

            print!("Fetching {}... ", pair);
            let _ = io::stdout().flush();

            let result = self.fetch_rate(pair).await;
            match &result {
                QuoteResult::Success(quote) => {
                    println!("{}", format_price(&quote.rate));
                    logging::debug_file_async(format!(
                        "{}/{} rate: {} bid: {} ask: {} at {} {}",
                        quote.base,
                        quote.quote,
                        quote.rate,
                        quote.bid,
                        quote.ask,
                        quote.last_updated,
                        quote.timezone
                    ));
                }
                QuoteResult::Failure { kind, detail } => {
                    println!("Failed");
                    logging::warn_file_async(format!("{} {}: {}", pair, kind, detail));
                }
            }
            report.push(pair, result);

            // 最後一組之後不需等待
            if i + 1 < pairs.len() {
                match shutdown {
                    Some(shutdown) => {
                        tokio::select! {
                            _ = tokio::time::sleep(self.request_delay) => {}
                            _ = shutdown.wait() => {}
                        }
                    }
                    None => tokio::time::sleep(self.request_delay).await,
                }
            }
        }

        logging::info_file_async(format!(
            "Scanned {} pairs, {} failed, {} ms",
            report.len(),
            report.failures(),
            start.elapsed().as_millis()
        ));

        (report, true)
    }
}
