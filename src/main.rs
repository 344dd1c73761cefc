use std::{process, time::Duration};

use anyhow::Result;
use tokio::io::{self, AsyncBufReadExt, AsyncWriteExt, BufReader};

use crate::{
    crawler::alphavantage::AlphaVantage,
    declare::ScanMode,
    scanner::Scanner,
    scheduler::Shutdown,
};

pub mod config;
pub mod crawler;
pub mod declare;
pub mod logging;
pub mod report;
pub mod scanner;
pub mod scheduler;
pub mod util;

const RULE_WIDTH: usize = 70;
/// 結束前等待日誌寫入檔案的上限
const LOG_FLUSH_TIMEOUT: Duration = Duration::from_secs(2);

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    let rule = "=".repeat(RULE_WIDTH);
    println!("{}", rule);
    println!(
        "{:^width$}",
        "FOREX SCANNER - Live Currency Exchange Rate Monitor",
        width = RULE_WIDTH
    );
    println!("{}", rule);
    println!("\nPowered by Alpha Vantage API (alphavantage.co)\n");

    let mut app = config::App::get()?;
    let mut stdin = BufReader::new(io::stdin());

    if app.alpha_vantage.api_key.is_empty() {
        app.alpha_vantage.api_key = prompt(&mut stdin, "Enter your Alpha Vantage API key: ").await?;
    }

    if app.alpha_vantage.api_key.is_empty() {
        println!("API key is required. Get a free key at https://www.alphavantage.co/support/#api-key");
        exit(1);
    }

    let pairs = app.pairs()?;
    let scanner = Scanner::new(AlphaVantage::from_config(&app)?, app.request_delay());

    println!("\nCurrency pairs to monitor:");
    for pair in &pairs {
        println!("   - {}", pair);
    }

    println!("\nSelect scan mode:");
    println!("1. Single scan (one-time)");
    println!(
        "2. Continuous scan (every {} seconds)",
        app.scan_interval().as_secs()
    );

    let choice = prompt(&mut stdin, "\nEnter choice (1 or 2): ").await?;
    let mode = match choice.parse::<ScanMode>() {
        Ok(mode) => mode,
        Err(_) => {
            println!("Invalid choice");
            logging::warn_file_async(format!("Invalid scan mode choice: {:?}", choice));
            exit(1);
        }
    };

    logging::info_file_async(format!(
        "forex_scanner started. mode: {:?}, pairs: {}, delay: {:?}",
        mode,
        pairs.len(),
        scanner.request_delay()
    ));

    match mode {
        ScanMode::Single => {
            println!("\nStarting single scan...\n");
            let report = scanner.run_cycle(&pairs).await;
            println!("\n{}", report::render(&report));
        }
        ScanMode::Continuous => {
            let shutdown = Shutdown::new();
            shutdown.listen_ctrl_c();
            scheduler::run_forever(&scanner, &pairs, app.scan_interval(), &shutdown).await;
        }
    }

    logging::flush(LOG_FLUSH_TIMEOUT);
    Ok(())
}

/// 寫完日誌後以 `code` 結束程式
fn exit(code: i32) -> ! {
    logging::flush(LOG_FLUSH_TIMEOUT);
    process::exit(code)
}

/// 顯示提示並讀取一行輸入，去除前後空白
async fn prompt<R>(reader: &mut R, message: &str) -> Result<String>
where
    R: AsyncBufReadExt + Unpin,
{
    let mut stdout = io::stdout();
    stdout.write_all(message.as_bytes()).await?;
    stdout.flush().await?;

    let mut line = String::new();
    reader.read_line(&mut line).await?;

    Ok(line.trim().to_string())
}
