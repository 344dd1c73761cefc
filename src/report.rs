use std::fmt::Write as _;

use crate::{
    declare::{QuoteResult, ScanReport},
    util::text::format_price,
};

const WIDTH: usize = 70;
const TITLE: &str = "FOREX SCANNER RESULTS";

/// 將掃描結果排成固定寬度的表格
///
/// 成功的列顯示匯率、買價、賣價（四捨五入到小數四位）與最後更新時間，
/// 失敗的列一律顯示 `N/A` 與 `Failed`。沒有任何結果時只輸出 `No data available`。
///
/// `Scan Time` 取自 `report.scanned_at`，也就是這一輪開始掃描的時間，
/// 而不是表格輸出的時間。
pub fn render(report: &ScanReport) -> String {
    let rule = "=".repeat(WIDTH);
    let mut out = String::with_capacity(256 + report.len() * (WIDTH + 2));

    let _ = writeln!(out, "{}", rule);
    let _ = writeln!(out, "{:^width$}", TITLE, width = WIDTH);
    let _ = writeln!(out, "{}", rule);
    let _ = writeln!(
        out,
        "Scan Time: {}",
        report.scanned_at.format("%Y-%m-%d %H:%M:%S")
    );
    let _ = writeln!(out, "{}", rule);

    if report.is_empty() {
        let _ = writeln!(out, "No data available");
        return out;
    }

    let _ = writeln!(
        out,
        "\n{:<15} {:<12} {:<12} {:<12} {:<20}",
        "Currency Pair", "Rate", "Bid", "Ask", "Updated"
    );
    let _ = writeln!(out, "{}", "-".repeat(WIDTH));

    for (label, result) in &report.entries {
        let _ = match result {
            QuoteResult::Success(quote) => writeln!(
                out,
                "{:<15} {:<12} {:<12} {:<12} {:<20}",
                label,
                format_price(&quote.rate),
                format_price(&quote.bid),
                format_price(&quote.ask),
                quote.last_updated
            ),
            QuoteResult::Failure { .. } => writeln!(
                out,
                "{:<15} {:<12} {:<12} {:<12} {:<20}",
                label, "N/A", "N/A", "N/A", "Failed"
            ),
        };
    }

    let _ = writeln!(out, "{}", rule);
    out
}
