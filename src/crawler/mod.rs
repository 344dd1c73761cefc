use async_trait::async_trait;

use crate::declare::{PairSpec, QuoteResult};

/// Alpha Vantage
pub mod alphavantage;

/// 匯率來源
///
/// 實作者必須把所有失敗都轉成 `QuoteResult::Failure` 回傳，不可 panic，
/// 每次呼叫只能送出一次請求，不做重試。
#[async_trait]
pub trait RateProvider: Send + Sync {
    async fn fetch_rate(&self, pair: &PairSpec) -> QuoteResult;
}
