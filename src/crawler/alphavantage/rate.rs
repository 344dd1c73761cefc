use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::{
    crawler::{alphavantage::AlphaVantage, RateProvider},
    declare::{FailureKind, PairSpec, Quote, QuoteResult},
    logging,
    util::{self, text},
};

const FUNCTION: &str = "CURRENCY_EXCHANGE_RATE";

/// 成功時匯率資料所在的欄位
const REALTIME_KEY: &str = "Realtime Currency Exchange Rate";
/// 超過配額時的提示
const NOTE_KEY: &str = "Note";
/// 新版付費方案的配額提示
const INFORMATION_KEY: &str = "Information";
const ERROR_MESSAGE_KEY: &str = "Error Message";

/// `Realtime Currency Exchange Rate` 物件，所有值都是字串
#[derive(Deserialize, Debug)]
struct ExchangeRate {
    #[serde(rename = "1. From_Currency Code")]
    from_currency_code: String,
    #[serde(rename = "3. To_Currency Code")]
    to_currency_code: String,
    #[serde(rename = "5. Exchange Rate")]
    exchange_rate: String,
    #[serde(rename = "6. Last Refreshed")]
    last_refreshed: String,
    #[serde(rename = "7. Time Zone")]
    time_zone: String,
    #[serde(rename = "8. Bid Price")]
    bid_price: String,
    #[serde(rename = "9. Ask Price")]
    ask_price: String,
}

impl ExchangeRate {
    fn into_quote(self) -> anyhow::Result<Quote> {
        Ok(Quote {
            rate: text::parse_positive_decimal(&self.exchange_rate)?,
            bid: text::parse_positive_decimal(&self.bid_price)?,
            ask: text::parse_positive_decimal(&self.ask_price)?,
            base: self.from_currency_code,
            quote: self.to_currency_code,
            last_updated: self.last_refreshed,
            timezone: self.time_zone,
        })
    }
}

/// 將回應內容分類為成功、限流、供應商錯誤或格式錯誤
///
/// 優先順序：匯率資料 > `Note`/`Information` > `Error Message`
pub(crate) fn classify(body: &str) -> QuoteResult {
    let json = match serde_json::from_str::<Value>(body) {
        Ok(json) => json,
        Err(why) => {
            return QuoteResult::failure(
                FailureKind::MalformedResponse,
                format!("Unexpected response format: {}", why),
            )
        }
    };

    if let Some(realtime) = json.get(REALTIME_KEY) {
        return match serde_json::from_value::<ExchangeRate>(realtime.clone())
            .map_err(anyhow::Error::from)
            .and_then(ExchangeRate::into_quote)
        {
            Ok(quote) => QuoteResult::Success(quote),
            Err(why) => QuoteResult::failure(
                FailureKind::MalformedResponse,
                format!("Data parsing error: {}", why),
            ),
        };
    }

    if let Some(note) = json.get(NOTE_KEY).or_else(|| json.get(INFORMATION_KEY)) {
        return QuoteResult::failure(FailureKind::Throttled, message_of(note));
    }

    if let Some(message) = json.get(ERROR_MESSAGE_KEY) {
        return QuoteResult::failure(FailureKind::ProviderError, message_of(message));
    }

    QuoteResult::failure(FailureKind::MalformedResponse, "Unexpected response format")
}

/// 供應商訊息原樣保留，非字串時以 JSON 文字呈現
fn message_of(value: &Value) -> String {
    match value.as_str() {
        Some(s) => s.to_string(),
        None => value.to_string(),
    }
}

#[async_trait]
impl RateProvider for AlphaVantage {
    /// 取得指定貨幣對的即時匯率。
    ///
    /// 只送出一次請求；連線失敗、逾時或非 2xx 狀態碼回傳 `TransportError`，
    /// 其餘情況交由 [`classify`] 判斷。
    async fn fetch_rate(&self, pair: &PairSpec) -> QuoteResult {
        let params = [
            ("function", FUNCTION),
            ("from_currency", pair.base.as_str()),
            ("to_currency", pair.quote.as_str()),
            ("apikey", self.api_key.as_str()),
        ];

        let result = match util::http::get_text(&self.client, &self.base_url, &params).await {
            Ok(body) => classify(&body),
            Err(why) => QuoteResult::failure(FailureKind::TransportError, why.to_string()),
        };

        if let QuoteResult::Failure { kind, detail } = &result {
            logging::error_file_async(format!(
                "Failed to fetch_rate({}) {} because {}",
                pair, kind, detail
            ));
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{Arc, Mutex},
        time::Duration,
    };

    use axum::{extract::Query, http::StatusCode, routing::get, Router};
    use rust_decimal_macros::dec;

    use super::*;

    const SUCCESS_BODY: &str = r#"{
        "Realtime Currency Exchange Rate": {
            "1. From_Currency Code": "EUR",
            "2. From_Currency Name": "Euro",
            "3. To_Currency Code": "USD",
            "4. To_Currency Name": "United States Dollar",
            "5. Exchange Rate": "1.2345",
            "6. Last Refreshed": "2024-05-01 12:00:01",
            "7. Time Zone": "UTC",
            "8. Bid Price": "1.2340",
            "9. Ask Price": "1.2350"
        }
    }"#;

    fn kind_of(result: &QuoteResult) -> Option<FailureKind> {
        match result {
            QuoteResult::Success(_) => None,
            QuoteResult::Failure { kind, .. } => Some(*kind),
        }
    }

    #[test]
    fn test_classify_success() {
        match classify(SUCCESS_BODY) {
            QuoteResult::Success(quote) => {
                assert_eq!(quote.base, "EUR");
                assert_eq!(quote.quote, "USD");
                assert_eq!(quote.rate, dec!(1.2345));
                assert_eq!(quote.bid, dec!(1.2340));
                assert_eq!(quote.ask, dec!(1.2350));
                assert_eq!(quote.last_updated, "2024-05-01 12:00:01");
                assert_eq!(quote.timezone, "UTC");
            }
            other => panic!("expected success, got {:?}", other),
        }
    }

    #[test]
    fn test_classify_note_is_throttled() {
        let note = "Thank you for using Alpha Vantage! Our standard API call frequency is 5 calls per minute.";
        let result = classify(&serde_json::json!({ "Note": note }).to_string());

        assert_eq!(
            result,
            QuoteResult::failure(FailureKind::Throttled, note)
        );
    }

    #[test]
    fn test_classify_information_is_throttled() {
        let result = classify(r#"{"Information": "rate limit is 25 requests per day"}"#);
        assert_eq!(kind_of(&result), Some(FailureKind::Throttled));
    }

    #[test]
    fn test_classify_error_message() {
        let result = classify(r#"{"Error Message": "Invalid API call."}"#);
        assert_eq!(
            result,
            QuoteResult::failure(FailureKind::ProviderError, "Invalid API call.")
        );
    }

    #[test]
    fn test_classify_unknown_shape() {
        for body in [r#"{}"#, r#"{"Meta Data": {}}"#, "[]", "null"] {
            let result = classify(body);
            assert_eq!(
                result,
                QuoteResult::failure(FailureKind::MalformedResponse, "Unexpected response format"),
                "{}",
                body
            );
        }
    }

    #[test]
    fn test_classify_not_json() {
        let result = classify("<html>maintenance</html>");
        assert_eq!(kind_of(&result), Some(FailureKind::MalformedResponse));
    }

    #[test]
    fn test_classify_bad_numbers() {
        for (field, value) in [
            ("5. Exchange Rate", "0"),
            ("8. Bid Price", "-1.2"),
            ("9. Ask Price", "N/A"),
        ] {
            let mut json: Value = serde_json::from_str(SUCCESS_BODY).unwrap();
            json[REALTIME_KEY][field] = Value::from(value);

            let result = classify(&json.to_string());
            assert_eq!(
                kind_of(&result),
                Some(FailureKind::MalformedResponse),
                "{} = {}",
                field,
                value
            );
        }
    }

    #[test]
    fn test_classify_missing_field() {
        let mut json: Value = serde_json::from_str(SUCCESS_BODY).unwrap();
        json[REALTIME_KEY]
            .as_object_mut()
            .unwrap()
            .remove("7. Time Zone");

        assert_eq!(
            kind_of(&classify(&json.to_string())),
            Some(FailureKind::MalformedResponse)
        );
    }

    #[test]
    fn test_classify_success_wins_over_note() {
        let mut json: Value = serde_json::from_str(SUCCESS_BODY).unwrap();
        json[NOTE_KEY] = Value::from("premium endpoint");

        assert!(classify(&json.to_string()).is_success());
    }

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}/query", addr)
    }

    #[tokio::test]
    async fn test_fetch_rate_sends_query() {
        let seen: Arc<Mutex<Vec<(String, String)>>> = Arc::default();
        let captured = seen.clone();
        let url = serve(Router::new().route(
            "/query",
            get(move |Query(params): Query<Vec<(String, String)>>| {
                let captured = captured.clone();
                async move {
                    captured.lock().unwrap().extend(params);
                    SUCCESS_BODY
                }
            }),
        ))
        .await;

        let av = AlphaVantage::new(&url, "demo", Duration::from_secs(5)).unwrap();
        let result = av.fetch_rate(&PairSpec::new("EUR", "USD")).await;

        assert!(result.is_success(), "{:?}", result);
        let seen = seen.lock().unwrap().clone();
        assert_eq!(
            seen,
            vec![
                ("function".to_string(), "CURRENCY_EXCHANGE_RATE".to_string()),
                ("from_currency".to_string(), "EUR".to_string()),
                ("to_currency".to_string(), "USD".to_string()),
                ("apikey".to_string(), "demo".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_fetch_rate_non_2xx_is_transport_error() {
        let url = serve(Router::new().route(
            "/query",
            get(|| async { (StatusCode::BAD_GATEWAY, SUCCESS_BODY) }),
        ))
        .await;

        let av = AlphaVantage::new(&url, "demo", Duration::from_secs(5)).unwrap();
        let result = av.fetch_rate(&PairSpec::new("EUR", "USD")).await;

        assert_eq!(kind_of(&result), Some(FailureKind::TransportError));
    }

    #[tokio::test]
    async fn test_fetch_rate_connection_refused() {
        // 先綁定取得一個空閒埠，關閉後再連線
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let av = AlphaVantage::new(
            &format!("http://{}/query", addr),
            "secret",
            Duration::from_secs(2),
        )
        .unwrap();
        let result = av.fetch_rate(&PairSpec::new("USD", "JPY")).await;

        match result {
            QuoteResult::Failure {
                kind: FailureKind::TransportError,
                detail,
            } => assert!(!detail.contains("secret"), "{}", detail),
            other => panic!("expected transport error, got {:?}", other),
        }
    }

    #[tokio::test]
    #[ignore]
    async fn test_fetch_rate_live() {
        dotenv::dotenv().ok();
        let app = crate::config::App::get().unwrap();
        let av = AlphaVantage::from_config(&app).unwrap();

        for pair in PairSpec::defaults() {
            let result = av.fetch_rate(&pair).await;
            logging::debug_file_async(format!("alphavantage {} {:?}", pair, result));
        }
    }
}
