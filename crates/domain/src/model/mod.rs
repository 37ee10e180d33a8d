//! Data structures shared across the API and monitor binaries.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Bank amounts arrive in minor units (kopecks); gauges carry major units.
pub fn minor_units_to_money(minor: i64) -> f64 {
    minor as f64 / 100.0
}

/// Renders a numeric ISO-4217 code (e.g. `980`) as its alphabetic label
/// (`UAH`). Unknown codes yield `None`.
pub fn currency_label(numeric_code: u16) -> Option<String> {
    rusty_money::iso::find_by_num_code(&format!("{numeric_code:03}"))
        .map(|currency| currency.iso_alpha_code.to_string())
}

/// One configured bank client.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct ClientConfig {
    #[serde(default)]
    pub token: String,
    /// Display-name override for the holder label.
    #[serde(default)]
    pub name: Option<String>,
    /// Per-client webhook URL, preferred over the global one.
    #[serde(default, rename = "webHookUrl", alias = "webhookUrl", alias = "webhook_url")]
    pub webhook_url: Option<String>,
}

impl ClientConfig {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            name: None,
            webhook_url: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_webhook_url(mut self, url: impl Into<String>) -> Self {
        self.webhook_url = Some(url.into());
        self
    }

    pub fn has_token(&self) -> bool {
        !self.token.trim().is_empty()
    }

    /// Display name override, trimmed; blank values are ignored.
    pub fn display_name(&self) -> Option<&str> {
        non_blank(self.name.as_deref())
    }

    /// Client-specific webhook URL, trimmed; blank values are ignored.
    pub fn own_webhook_url(&self) -> Option<&str> {
        non_blank(self.webhook_url.as_deref())
    }

    /// Label used in logs; never exposes the token.
    pub fn log_label(&self) -> &str {
        self.display_name().unwrap_or("<unnamed>")
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("token", &"<redacted>")
            .field("name", &self.name)
            .field("webhook_url", &self.webhook_url)
            .finish()
    }
}

/// Last known state of one account, as exported.
#[derive(Debug, Clone, PartialEq)]
pub struct AccountSnapshot {
    pub holder_name: String,
    pub currency: String,
    pub card_type: String,
    pub credit_limit: f64,
    /// Balance excluding the credit limit.
    pub balance: f64,
}

/// Last known state of one jar, as exported.
#[derive(Debug, Clone, PartialEq)]
pub struct JarSnapshot {
    pub holder_name: String,
    pub title: String,
    pub description: String,
    pub currency: String,
    pub balance: f64,
    pub goal: Option<f64>,
}

impl JarSnapshot {
    /// Goal rendered for the `goal` label; empty when the jar has none.
    pub fn goal_label(&self) -> String {
        self.goal.map(|goal| goal.to_string()).unwrap_or_default()
    }
}

/// Exchange rates for one currency pair. Rates that the bank does not quote
/// are zero.
#[derive(Debug, Clone, PartialEq)]
pub struct CurrencyQuote {
    pub currency_a: Option<String>,
    pub currency_b: Option<String>,
    pub rate_buy: f64,
    pub rate_sell: f64,
    pub rate_cross: f64,
    pub date: Option<DateTime<Utc>>,
}

/// Body the bank POSTs to the webhook endpoint. Every field is optional so
/// malformed deliveries still deserialize and can be discarded explicitly.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct WebhookEvent {
    #[serde(default, rename = "type")]
    pub event_type: Option<String>,
    #[serde(default)]
    pub data: Option<WebhookData>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct WebhookData {
    #[serde(default)]
    pub account: Option<String>,
    #[serde(default, rename = "statementItem")]
    pub statement_item: Option<StatementItem>,
}

impl WebhookEvent {
    pub fn statement(account: impl Into<String>, balance: i64) -> Self {
        Self {
            event_type: Some("StatementItem".to_string()),
            data: Some(WebhookData {
                account: Some(account.into()),
                statement_item: Some(StatementItem {
                    balance,
                    ..StatementItem::default()
                }),
            }),
        }
    }

    /// Account or jar identifier, if present and non-blank.
    pub fn account_id(&self) -> Option<&str> {
        non_blank(self.data.as_ref()?.account.as_deref())
    }

    pub fn statement_item(&self) -> Option<&StatementItem> {
        self.data.as_ref()?.statement_item.as_ref()
    }
}

/// One statement line as reported by the bank, amounts in minor units.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatementItem {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub time: i64,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub mcc: i32,
    #[serde(default)]
    pub original_mcc: i32,
    #[serde(default)]
    pub hold: bool,
    #[serde(default)]
    pub amount: i64,
    #[serde(default)]
    pub operation_amount: i64,
    #[serde(default)]
    pub currency_code: u16,
    #[serde(default)]
    pub commission_rate: i64,
    #[serde(default)]
    pub cashback_amount: i64,
    /// Account balance after the operation, credit limit included.
    #[serde(default)]
    pub balance: i64,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub receipt_id: Option<String>,
    #[serde(default)]
    pub invoice_id: Option<String>,
    #[serde(default)]
    pub counter_edrpou: Option<String>,
    #[serde(default)]
    pub counter_iban: Option<String>,
    #[serde(default)]
    pub counter_name: Option<String>,
}

impl StatementItem {
    pub fn balance_as_money(&self) -> f64 {
        minor_units_to_money(self.balance)
    }
}

/// Trimmed value, or `None` when blank.
fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}
