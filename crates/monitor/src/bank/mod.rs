//! Client for the Monobank HTTP API.

use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use monobank_exporter_domain::model::StatementItem;
use reqwest::{header, Client, Response, Url};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::debug;

mod types;

pub use types::{Account, ApiErrorBody, ClientInfo, CurrencyInfo, Jar, SetWebhookRequest};

const CURRENCY_ENDPOINT: &str = "bank/currency";
const CLIENT_INFO_ENDPOINT: &str = "personal/client-info";
const WEBHOOK_ENDPOINT: &str = "personal/webhook";
const STATEMENT_ENDPOINT: &str = "personal/statement";
const TOKEN_HEADER: &str = "X-Token";

/// Minimum gap between two statement requests.
pub const STATEMENT_REQUEST_GAP: Duration = Duration::from_secs(60);
/// Statement ranges must stay below 31 days + 1 hour.
pub const MAX_STATEMENT_RANGE_SECS: i64 = 2_682_000;

#[derive(Debug, Error)]
pub enum BankError {
    #[error("bank api base url is not configured")]
    MissingBaseUrl,
    #[error("invalid bank api base url `{0}`: {1}")]
    InvalidBaseUrl(String, String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("bank api returned HTTP {status}: {description}")]
    Api { status: u16, description: String },
    #[error("failed to decode bank response: {0}")]
    Decode(String),
    #[error("statement range exceeds 31 days + 1 hour")]
    StatementRangeTooWide,
    #[error("statement requests are limited to one per {}s", STATEMENT_REQUEST_GAP.as_secs())]
    StatementRateLimited,
}

impl From<reqwest::Error> for BankError {
    fn from(value: reqwest::Error) -> Self {
        Self::Transport(value.to_string())
    }
}

#[async_trait]
pub trait BankApi: Send + Sync {
    async fn currencies(&self) -> Result<Vec<CurrencyInfo>, BankError>;

    async fn client_info(&self, token: &str) -> Result<ClientInfo, BankError>;

    /// Registers `url` as the webhook for `token`. `Ok(false)` means the bank
    /// answered with a non-success status.
    async fn set_webhook(&self, url: &str, token: &str) -> Result<bool, BankError>;

    async fn statements(
        &self,
        token: &str,
        account: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<StatementItem>, BankError>;
}

/// Enforces the statement endpoint's range and frequency limits.
#[derive(Debug, Default)]
pub struct StatementGuard {
    last_request: Mutex<Option<Instant>>,
}

impl StatementGuard {
    pub fn check(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        now: Instant,
    ) -> Result<(), BankError> {
        if to.timestamp() - from.timestamp() >= MAX_STATEMENT_RANGE_SECS {
            return Err(BankError::StatementRangeTooWide);
        }
        let last = *self.last_request.lock().unwrap_or_else(PoisonError::into_inner);
        match last {
            Some(previous) if now.saturating_duration_since(previous) <= STATEMENT_REQUEST_GAP => {
                Err(BankError::StatementRateLimited)
            }
            _ => Ok(()),
        }
    }

    pub fn record(&self, now: Instant) {
        *self.last_request.lock().unwrap_or_else(PoisonError::into_inner) = Some(now);
    }
}

pub struct HttpBankClient {
    base_url: Url,
    http: Client,
    statement_guard: StatementGuard,
}

impl HttpBankClient {
    /// Builds the client; a blank or malformed base URL is a configuration
    /// defect and refuses construction.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, BankError> {
        let trimmed = base_url.trim();
        if trimmed.is_empty() {
            return Err(BankError::MissingBaseUrl);
        }
        let normalized = if trimmed.ends_with('/') {
            trimmed.to_string()
        } else {
            format!("{trimmed}/")
        };
        let base_url = Url::parse(&normalized)
            .map_err(|err| BankError::InvalidBaseUrl(trimmed.to_string(), err.to_string()))?;

        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/json"),
        );
        let http = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            base_url,
            http,
            statement_guard: StatementGuard::default(),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, BankError> {
        self.base_url
            .join(path)
            .map_err(|err| BankError::InvalidBaseUrl(self.base_url.to_string(), err.to_string()))
    }
}

#[async_trait]
impl BankApi for HttpBankClient {
    async fn currencies(&self) -> Result<Vec<CurrencyInfo>, BankError> {
        let response = self.http.get(self.endpoint(CURRENCY_ENDPOINT)?).send().await?;
        decode(response).await
    }

    async fn client_info(&self, token: &str) -> Result<ClientInfo, BankError> {
        let response = self
            .http
            .get(self.endpoint(CLIENT_INFO_ENDPOINT)?)
            .header(TOKEN_HEADER, token)
            .send()
            .await?;
        decode(response).await
    }

    async fn set_webhook(&self, url: &str, token: &str) -> Result<bool, BankError> {
        let response = self
            .http
            .post(self.endpoint(WEBHOOK_ENDPOINT)?)
            .header(TOKEN_HEADER, token)
            .json(&SetWebhookRequest { web_hook_url: url })
            .send()
            .await?;
        let status = response.status();
        debug!(status = status.as_u16(), "webhook registration answered");
        Ok(status.is_success())
    }

    async fn statements(
        &self,
        token: &str,
        account: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<StatementItem>, BankError> {
        self.statement_guard.check(from, to, Instant::now())?;
        let path = format!(
            "{STATEMENT_ENDPOINT}/{account}/{}/{}",
            from.timestamp(),
            to.timestamp()
        );
        let response = self
            .http
            .get(self.endpoint(&path)?)
            .header(TOKEN_HEADER, token)
            .send()
            .await?;
        let items = decode(response).await?;
        self.statement_guard.record(Instant::now());
        Ok(items)
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, BankError> {
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        let description = serde_json::from_str::<ApiErrorBody>(&body)
            .ok()
            .and_then(|err| err.error_description)
            .unwrap_or_else(|| body.clone());
        return Err(BankError::Api {
            status: status.as_u16(),
            description,
        });
    }
    serde_json::from_str(&body).map_err(|err| BankError::Decode(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use serde_json::json;
    use wiremock::matchers::{body_json, header as header_matcher, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> HttpBankClient {
        HttpBankClient::new(&server.uri(), Duration::from_secs(5)).expect("client builds")
    }

    #[test]
    fn blank_base_url_is_fatal() {
        let err = HttpBankClient::new("  ", Duration::from_secs(1))
            .err()
            .expect("construction fails");
        assert!(matches!(err, BankError::MissingBaseUrl));
    }

    #[test]
    fn base_url_gets_trailing_slash() {
        let client = HttpBankClient::new("https://api.monobank.ua", Duration::from_secs(1))
            .expect("client builds");
        assert_eq!(
            client.endpoint(CLIENT_INFO_ENDPOINT).unwrap().as_str(),
            "https://api.monobank.ua/personal/client-info"
        );
    }

    #[test]
    fn statement_guard_rejects_wide_ranges() {
        let guard = StatementGuard::default();
        let to = Utc::now();
        let from = to - ChronoDuration::seconds(MAX_STATEMENT_RANGE_SECS);
        assert!(matches!(
            guard.check(from, to, Instant::now()),
            Err(BankError::StatementRangeTooWide)
        ));
        let from = to - ChronoDuration::days(31);
        assert!(guard.check(from, to, Instant::now()).is_ok());
    }

    #[test]
    fn statement_guard_enforces_gap() {
        let guard = StatementGuard::default();
        let to = Utc::now();
        let from = to - ChronoDuration::days(1);
        let start = Instant::now();
        guard.record(start);

        assert!(matches!(
            guard.check(from, to, start + Duration::from_secs(30)),
            Err(BankError::StatementRateLimited)
        ));
        assert!(guard
            .check(from, to, start + Duration::from_secs(61))
            .is_ok());
    }

    #[tokio::test]
    async fn client_info_sends_token_header() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/personal/client-info"))
            .and(header_matcher("X-Token", "secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "clientId": "c1",
                "name": "Alice",
                "accounts": [{"id": "ACC1", "balance": 500, "creditLimit": 0, "type": "black", "currencyCode": 980}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let info = client(&server).client_info("secret").await.expect("client info");
        assert_eq!(info.name, "Alice");
        assert_eq!(info.accounts[0].id, "ACC1");
        assert!(info.jars.is_empty());
    }

    #[tokio::test]
    async fn api_errors_carry_description() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/personal/client-info"))
            .respond_with(
                ResponseTemplate::new(403).set_body_json(json!({"errorDescription": "Unknown 'X-Token'"})),
            )
            .mount(&server)
            .await;

        let err = client(&server).client_info("bad").await.unwrap_err();
        match err {
            BankError::Api { status, description } => {
                assert_eq!(status, 403);
                assert_eq!(description, "Unknown 'X-Token'");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn set_webhook_posts_url_and_maps_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/personal/webhook"))
            .and(header_matcher("X-Token", "t1"))
            .and(body_json(json!({"webHookUrl": "https://hook.example.com/webhook"})))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/personal/webhook"))
            .and(header_matcher("X-Token", "t2"))
            .respond_with(ResponseTemplate::new(400))
            .mount(&server)
            .await;

        let client = client(&server);
        assert!(client
            .set_webhook("https://hook.example.com/webhook", "t1")
            .await
            .unwrap());
        assert!(!client
            .set_webhook("https://hook.example.com/webhook", "t2")
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn statements_hit_ranged_path_and_rate_limit() {
        let server = MockServer::start().await;
        let to = DateTime::from_timestamp(1_700_086_400, 0).unwrap();
        let from = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        Mock::given(method("GET"))
            .and(path("/personal/statement/ACC1/1700000000/1700086400"))
            .and(header_matcher("X-Token", "t1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"id": "s1", "time": 1700000100, "amount": -500, "balance": 99500}
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let client = client(&server);
        let items = client
            .statements("t1", "ACC1", from, to)
            .await
            .expect("statements");
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].balance, 99_500);

        assert!(matches!(
            client.statements("t1", "ACC1", from, to).await,
            Err(BankError::StatementRateLimited)
        ));
    }

    #[tokio::test]
    async fn currencies_decode() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/bank/currency"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"currencyCodeA": 840, "currencyCodeB": 980, "date": 1552392228, "rateSell": 27.0, "rateBuy": 27.2, "rateCross": 27.1}
            ])))
            .mount(&server)
            .await;

        let quotes = client(&server).currencies().await.expect("currencies");
        assert_eq!(quotes.len(), 1);
        assert_eq!(quotes[0].rate_buy, 27.2);
    }
}
