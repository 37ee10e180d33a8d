//! Wire types of the Monobank personal API. Amounts are minor units.

use chrono::DateTime;
use monobank_exporter_domain::model::{
    currency_label, minor_units_to_money, AccountSnapshot, CurrencyQuote, JarSnapshot,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientInfo {
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub name: String,
    /// Webhook the bank currently delivers to for this token, if any.
    #[serde(default)]
    pub web_hook_url: Option<String>,
    #[serde(default)]
    pub permissions: Option<String>,
    #[serde(default)]
    pub accounts: Vec<Account>,
    #[serde(default)]
    pub jars: Vec<Jar>,
}

impl ClientInfo {
    pub fn has_active_webhook(&self) -> bool {
        self.web_hook_url
            .as_deref()
            .is_some_and(|url| !url.trim().is_empty())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: String,
    #[serde(default)]
    pub send_id: Option<String>,
    #[serde(default)]
    pub balance: i64,
    #[serde(default)]
    pub credit_limit: i64,
    #[serde(default, rename = "type")]
    pub account_type: String,
    #[serde(default)]
    pub currency_code: u16,
    #[serde(default)]
    pub cashback_type: Option<String>,
    #[serde(default)]
    pub masked_pan: Vec<String>,
    #[serde(default)]
    pub iban: Option<String>,
}

impl Account {
    pub fn to_snapshot(&self, holder_name: &str) -> AccountSnapshot {
        AccountSnapshot {
            holder_name: holder_name.to_string(),
            currency: label_or_code(self.currency_code),
            card_type: self.account_type.clone(),
            credit_limit: minor_units_to_money(self.credit_limit),
            balance: minor_units_to_money(self.balance - self.credit_limit),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Jar {
    pub id: String,
    #[serde(default)]
    pub send_id: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub currency_code: u16,
    #[serde(default)]
    pub balance: i64,
    #[serde(default)]
    pub goal: Option<i64>,
}

impl Jar {
    pub fn to_snapshot(&self, holder_name: &str) -> JarSnapshot {
        JarSnapshot {
            holder_name: holder_name.to_string(),
            title: self.title.clone(),
            description: self.description.clone(),
            currency: label_or_code(self.currency_code),
            balance: minor_units_to_money(self.balance),
            goal: self.goal.map(minor_units_to_money),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrencyInfo {
    pub currency_code_a: u16,
    pub currency_code_b: u16,
    #[serde(default)]
    pub date: i64,
    #[serde(default)]
    pub rate_sell: f64,
    #[serde(default)]
    pub rate_buy: f64,
    #[serde(default)]
    pub rate_cross: f64,
}

impl CurrencyInfo {
    pub fn to_quote(&self) -> CurrencyQuote {
        CurrencyQuote {
            currency_a: currency_label(self.currency_code_a),
            currency_b: currency_label(self.currency_code_b),
            rate_buy: self.rate_buy,
            rate_sell: self.rate_sell,
            rate_cross: self.rate_cross,
            date: DateTime::from_timestamp(self.date, 0),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SetWebhookRequest<'a> {
    #[serde(rename = "webHookUrl")]
    pub web_hook_url: &'a str,
}

#[derive(Debug, Deserialize, Default)]
pub struct ApiErrorBody {
    #[serde(default, rename = "errorDescription")]
    pub error_description: Option<String>,
}

fn label_or_code(code: u16) -> String {
    currency_label(code).unwrap_or_else(|| code.to_string())
}
