use std::{process, sync::Arc, time::Duration};

use tokio::{sync::watch, task};

use crate::{
    crawler::RateProvider, declare::PairSpec, logging, report, scanner::Scanner,
};

/// 停止持續掃描的訊號，可複製給多個工作共用
#[derive(Clone)]
pub struct Shutdown {
    tx: Arc<watch::Sender<bool>>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Shutdown { tx: Arc::new(tx) }
    }

    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }

    /// 等到 [`Shutdown::trigger`] 被呼叫為止，已觸發時立即返回
    pub async fn wait(&self) {
        let mut rx = self.tx.subscribe();
        let _ = rx.wait_for(|stopped| *stopped).await;
    }

    /// 收到 Ctrl+C 時觸發，第二次 Ctrl+C 直接結束程式
    pub fn listen_ctrl_c(&self) {
        let shutdown = self.clone();
        task::spawn(async move {
            if let Err(why) = tokio::signal::ctrl_c().await {
                logging::error_file_async(format!(
                    "Failed to listen for ctrl_c because {:?}",
                    why
                ));
                return;
            }

            logging::info_console("Shutdown signal received".to_string());
            logging::info_file_async("Shutdown signal received".to_string());
            shutdown.trigger();

            if tokio::signal::ctrl_c().await.is_ok() {
                logging::info_console("Second shutdown signal received, exiting".to_string());
                logging::info_file_async("Forced exit on second shutdown signal".to_string());
                logging::flush(Duration::from_millis(500));
                process::exit(130);
            }
        });
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// 持續掃描，每輪結束後等待 `interval` 再開始下一輪
///
/// 每一輪之前、輪內請求之間的等待以及輪與輪之間的等待都會檢查 `shutdown`。
/// 進行中的請求會先完成，被中斷的那一輪不輸出表格也不計入。回傳完成的輪數。
pub async fn run_forever<P: RateProvider>(
    scanner: &Scanner<P>,
    pairs: &[PairSpec],
    interval: Duration,
    shutdown: &Shutdown,
) -> usize {
    println!(
        "Starting continuous scan (interval: {}s)",
        interval.as_secs()
    );
    println!("Press Ctrl+C to stop\n");

    let mut cycles = 0;

    while !shutdown.is_triggered() {
        let Some(report) = scanner.run_cycle_until(pairs, shutdown).await else {
            break;
        };
        println!("\n{}", report::render(&report));
        cycles += 1;

        println!(
            "\nWaiting {} seconds until next scan...",
            interval.as_secs()
        );

        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = shutdown.wait() => break,
        }
    }

    logging::info_file_async(format!("Continuous scan stopped after {} cycles", cycles));
    println!("\nForex scanner stopped by user");

    cycles
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;
    use crate::crawler::mock::ScriptedProvider;

    #[tokio::test]
    async fn test_shutdown_wait_after_trigger() {
        let shutdown = Shutdown::new();
        assert!(!shutdown.is_triggered());

        shutdown.trigger();
        assert!(shutdown.is_triggered());

        tokio::time::timeout(Duration::from_secs(1), shutdown.wait())
            .await
            .expect("wait should return once triggered");
    }

    #[tokio::test]
    async fn test_run_forever_not_started_when_already_stopped() {
        let scanner = Scanner::new(ScriptedProvider::default(), Duration::from_millis(1));
        let shutdown = Shutdown::new();
        shutdown.trigger();

        let cycles = run_forever(
            &scanner,
            &PairSpec::defaults(),
            Duration::from_secs(300),
            &shutdown,
        )
        .await;

        assert_eq!(cycles, 0);
        assert_eq!(scanner.provider().call_count(), 0);
    }

    #[tokio::test]
    async fn test_run_forever_stops_during_interval() {
        let scanner = Arc::new(Scanner::new(
            ScriptedProvider::default(),
            Duration::from_millis(5),
        ));
        let shutdown = Shutdown::new();

        let handle = {
            let scanner = scanner.clone();
            let shutdown = shutdown.clone();
            task::spawn(async move {
                run_forever(
                    &scanner,
                    &PairSpec::defaults(),
                    Duration::from_secs(300),
                    &shutdown,
                )
                .await
            })
        };

        // 等第一輪跑完，進入 300 秒的等待
        let deadline = Instant::now() + Duration::from_secs(5);
        while scanner.provider().call_count() < 5 && Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;

        shutdown.trigger();
        let cycles = tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("run_forever should stop promptly")
            .unwrap();

        assert_eq!(cycles, 1);
        assert_eq!(scanner.provider().call_count(), 5);
    }

    #[tokio::test]
    async fn test_run_forever_stops_mid_cycle() {
        let delay = Duration::from_millis(400);
        let scanner = Arc::new(Scanner::new(ScriptedProvider::default(), delay));
        let shutdown = Shutdown::new();

        let handle = {
            let scanner = scanner.clone();
            let shutdown = shutdown.clone();
            task::spawn(async move {
                run_forever(
                    &scanner,
                    &PairSpec::defaults(),
                    Duration::from_secs(300),
                    &shutdown,
                )
                .await
            })
        };

        tokio::time::sleep(Duration::from_millis(100)).await;
        let triggered_at = Instant::now();
        shutdown.trigger();

        let cycles = tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("run_forever should not finish the interrupted cycle")
            .unwrap();

        assert_eq!(cycles, 0);
        assert!(triggered_at.elapsed() < delay, "{:?}", triggered_at.elapsed());
        assert_eq!(scanner.provider().call_count(), 1);
    }

    #[tokio::test]
    async fn test_run_forever_repeats_cycles() {
        let scanner = Arc::new(Scanner::new(ScriptedProvider::default(), Duration::ZERO));
        let shutdown = Shutdown::new();
        let pairs = vec![PairSpec::new("EUR", "USD"), PairSpec::new("USD", "JPY")];

        let handle = {
            let scanner = scanner.clone();
            let shutdown = shutdown.clone();
            task::spawn(async move {
                run_forever(&scanner, &pairs, Duration::from_millis(20), &shutdown).await
            })
        };

        let deadline = Instant::now() + Duration::from_secs(5);
        while scanner.provider().call_count() < 6 && Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        shutdown.trigger();

        let cycles = tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap();

        assert!(cycles >= 3, "cycles: {}", cycles);
        // 被中斷的那一輪最多多送出一次請求，不計入完成的輪數
        let calls = scanner.provider().call_count();
        assert!(
            calls == cycles * 2 || calls == cycles * 2 + 1,
            "calls: {}, cycles: {}",
            calls,
            cycles
        );
    }
}
