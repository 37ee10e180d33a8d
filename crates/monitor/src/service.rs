//! Webhook setup, periodic export and webhook reconciliation.

use std::sync::Arc;
use std::time::Duration;

use monobank_exporter_domain::{
    AccountSnapshot, CacheCategory, ClientConfig, JarSnapshot, LookupCache, MetricsExporter,
    RateKind, Snapshot, WebhookEvent,
};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::bank::{BankApi, BankError, ClientInfo};
use crate::webhook::validate_webhook_url;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("client token is empty")]
    MissingToken,
    #[error("bank api error: {0}")]
    Bank(#[from] BankError),
}

/// What happened to a client's webhook during setup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookStatus {
    /// Neither a client nor a global URL is configured.
    NotConfigured,
    /// The chosen URL failed validation; the bank was not called.
    Invalid { url: String },
    Registered { url: String },
    /// The bank answered with a non-success status.
    Rejected { url: String },
    /// The registration request itself failed.
    Failed { url: String, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientExport {
    pub holder_name: String,
    /// `None` on periodic ticks, which never touch the webhook.
    pub webhook: Option<WebhookStatus>,
    pub accounts: usize,
    pub jars: usize,
    /// Whether snapshots were cached for webhook reconciliation.
    pub cached: bool,
}

#[derive(Debug)]
pub struct ClientOutcome {
    pub client: String,
    pub result: Result<ClientExport, ServiceError>,
}

#[derive(Debug, Default)]
pub struct SetupReport {
    /// Clients with a token whose client info could be fetched.
    pub valid_clients: Vec<ClientConfig>,
    pub outcomes: Vec<ClientOutcome>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscardReason {
    EmptyEvent,
    MissingAccount,
    MissingStatement,
}

/// Result of applying one webhook event, probing accounts before jars.
#[derive(Debug, Clone, PartialEq)]
pub enum ReconcileOutcome {
    Discarded(DiscardReason),
    Account(AccountSnapshot),
    Jar(JarSnapshot),
    NotFound,
}

pub struct MonobankService {
    bank: Arc<dyn BankApi>,
    cache: Arc<dyn LookupCache>,
    exporter: Arc<dyn MetricsExporter>,
    snapshot_ttl: Duration,
}

impl MonobankService {
    pub fn new(
        bank: Arc<dyn BankApi>,
        cache: Arc<dyn LookupCache>,
        exporter: Arc<dyn MetricsExporter>,
        snapshot_ttl: Duration,
    ) -> Self {
        Self {
            bank,
            cache,
            exporter,
            snapshot_ttl,
        }
    }

    /// Registers webhooks, exports balances and seeds the cache for every
    /// client. One client's failure never stops the others.
    pub async fn setup_webhook_and_export(
        &self,
        global_webhook_url: Option<&str>,
        clients: &[ClientConfig],
    ) -> SetupReport {
        let mut report = SetupReport::default();
        if clients.is_empty() {
            warn!("client list is empty, nothing to export");
            return report;
        }

        let global_webhook = global_webhook_url.map(str::trim).map(|url| {
            info!(url, "validating global webhook url");
            (url, validate_webhook_url(url))
        });

        for client in clients {
            if !client.has_token() {
                error!(client = client.log_label(), "token is empty, skipping client");
                report.outcomes.push(ClientOutcome {
                    client: client.log_label().to_string(),
                    result: Err(ServiceError::MissingToken),
                });
                continue;
            }

            let webhook = self.register_webhook(client, global_webhook).await;
            let result = match self.bank.client_info(&client.token).await {
                Ok(info) => {
                    log_webhook_state(&webhook, &info);
                    let mut export = self.export_client_info(client, &info);
                    export.webhook = Some(webhook);
                    report.valid_clients.push(client.clone());
                    Ok(export)
                }
                Err(err) => {
                    error!(client = client.log_label(), %err, "failed to fetch client info");
                    Err(ServiceError::from(err))
                }
            };
            report.outcomes.push(ClientOutcome {
                client: client.log_label().to_string(),
                result,
            });
        }

        report
    }

    /// Periodic tick: re-fetches client info and re-exports account and jar
    /// gauges without touching webhooks.
    pub async fn export_balance_metrics(&self, clients: &[ClientConfig]) -> Vec<ClientOutcome> {
        if clients.is_empty() {
            warn!("client list is empty, nothing to export");
            return Vec::new();
        }

        let mut outcomes = Vec::with_capacity(clients.len());
        for client in clients {
            let result = if !client.has_token() {
                error!(client = client.log_label(), "token is empty, skipping client");
                Err(ServiceError::MissingToken)
            } else {
                match self.bank.client_info(&client.token).await {
                    Ok(info) => Ok(self.export_client_info(client, &info)),
                    Err(err) => {
                        error!(client = client.log_label(), %err, "failed to fetch client info");
                        Err(ServiceError::from(err))
                    }
                }
            };
            outcomes.push(ClientOutcome {
                client: client.log_label().to_string(),
                result,
            });
        }
        outcomes
    }

    /// Exports buy/sell/cross gauges for every quote with both currency
    /// labels. Zero rates are "not quoted" and skipped. Returns the number of
    /// observations made.
    pub async fn export_currency_metrics(&self) -> Result<usize, ServiceError> {
        let currencies = self.bank.currencies().await.inspect_err(|err| {
            error!(%err, "failed to fetch currency rates");
        })?;

        let mut observed = 0;
        for quote in currencies.iter().map(|info| info.to_quote()) {
            let (Some(currency_a), Some(currency_b)) = (&quote.currency_a, &quote.currency_b) else {
                continue;
            };
            for (kind, rate) in [
                (RateKind::Buy, quote.rate_buy),
                (RateKind::Sell, quote.rate_sell),
                (RateKind::Cross, quote.rate_cross),
            ] {
                if rate > 0.0 {
                    debug!(%currency_a, %currency_b, kind = kind.as_ref(), rate, "currency rate");
                    self.exporter
                        .observe_currency(currency_a, currency_b, kind, rate);
                    observed += 1;
                }
            }
        }

        info!(quotes = currencies.len(), observed, "exported currency metrics");
        Ok(observed)
    }

    /// Applies a webhook balance to the cached snapshot and re-exports it.
    pub fn reconcile_webhook(&self, event: Option<&WebhookEvent>) -> ReconcileOutcome {
        let Some(event) = event else {
            info!("webhook without body, ignoring");
            return ReconcileOutcome::Discarded(DiscardReason::EmptyEvent);
        };
        let Some(account_id) = event.account_id() else {
            info!("webhook without account id, ignoring");
            return ReconcileOutcome::Discarded(DiscardReason::MissingAccount);
        };
        let Some(statement) = event.statement_item() else {
            info!(account = account_id, "webhook without statement item, ignoring");
            return ReconcileOutcome::Discarded(DiscardReason::MissingStatement);
        };
        info!(account = account_id, "webhook received");

        let total = statement.balance_as_money();

        let updated = self.cache.update(
            CacheCategory::AccountInfo,
            account_id,
            self.snapshot_ttl,
            &mut |snapshot| match snapshot {
                Snapshot::Account(mut account) => {
                    account.balance = total - account.credit_limit;
                    Snapshot::Account(account)
                }
                other => other,
            },
        );
        if let Some(Snapshot::Account(account)) = updated {
            self.exporter.observe_account(&account);
            info!(holder = %account.holder_name, "exported account balance from webhook");
            return ReconcileOutcome::Account(account);
        }

        let updated = self.cache.update(
            CacheCategory::JarInfo,
            account_id,
            self.snapshot_ttl,
            &mut |snapshot| match snapshot {
                Snapshot::Jar(mut jar) => {
                    jar.balance = total;
                    Snapshot::Jar(jar)
                }
                other => other,
            },
        );
        if let Some(Snapshot::Jar(jar)) = updated {
            self.exporter.observe_jar(&jar);
            info!(holder = %jar.holder_name, "exported jar balance from webhook");
            return ReconcileOutcome::Jar(jar);
        }

        warn!(
            account = account_id,
            "no cached account or jar for webhook, dropping event"
        );
        ReconcileOutcome::NotFound
    }

    async fn register_webhook(
        &self,
        client: &ClientConfig,
        global_webhook: Option<(&str, bool)>,
    ) -> WebhookStatus {
        let url = match (client.own_webhook_url(), global_webhook) {
            (Some(own), _) => {
                info!(client = client.log_label(), url = own, "using client webhook url");
                if !validate_webhook_url(own) {
                    return WebhookStatus::Invalid {
                        url: own.to_string(),
                    };
                }
                own
            }
            (None, Some((global, true))) => global,
            (None, Some((global, false))) => {
                return WebhookStatus::Invalid {
                    url: global.to_string(),
                }
            }
            (None, None) => return WebhookStatus::NotConfigured,
        };

        match self.bank.set_webhook(url, &client.token).await {
            Ok(true) => WebhookStatus::Registered {
                url: url.to_string(),
            },
            Ok(false) => {
                warn!(client = client.log_label(), url, "bank rejected webhook registration");
                WebhookStatus::Rejected {
                    url: url.to_string(),
                }
            }
            Err(err) => {
                error!(client = client.log_label(), url, %err, "webhook registration failed");
                WebhookStatus::Failed {
                    url: url.to_string(),
                    reason: err.to_string(),
                }
            }
        }
    }

    fn export_client_info(&self, client: &ClientConfig, info: &ClientInfo) -> ClientExport {
        let holder_name = match client.display_name() {
            Some(name) => {
                debug!(original = %info.name, display = name, "overriding holder name");
                name
            }
            None => info.name.as_str(),
        };
        // Without an active webhook no delta will ever arrive for these ids.
        // Writes are last-writer-wins: a webhook applied while `client_info`
        // was in flight is replaced by this poll's balance.
        let cached = info.has_active_webhook();

        for account in &info.accounts {
            let snapshot = account.to_snapshot(holder_name);
            self.exporter.observe_account(&snapshot);
            if cached {
                self.cache.set(
                    CacheCategory::AccountInfo,
                    &account.id,
                    Snapshot::Account(snapshot),
                    self.snapshot_ttl,
                );
            }
        }
        info!(holder = holder_name, accounts = info.accounts.len(), "exported balance metrics");

        if info.jars.is_empty() {
            debug!(holder = holder_name, "holder has no jars");
        }
        for jar in &info.jars {
            let snapshot = jar.to_snapshot(holder_name);
            self.exporter.observe_jar(&snapshot);
            if cached {
                self.cache.set(
                    CacheCategory::JarInfo,
                    &jar.id,
                    Snapshot::Jar(snapshot),
                    self.snapshot_ttl,
                );
            }
        }

        ClientExport {
            holder_name: holder_name.to_string(),
            webhook: None,
            accounts: info.accounts.len(),
            jars: info.jars.len(),
            cached,
        }
    }
}

fn log_webhook_state(status: &WebhookStatus, info: &ClientInfo) {
    if let WebhookStatus::Registered { url } = status {
        if info.web_hook_url.as_deref() == Some(url.as_str()) {
            info!(holder = %info.name, "webhook is active");
        } else {
            warn!(holder = %info.name, "bank reports a different webhook than the one registered");
        }
    }
}
