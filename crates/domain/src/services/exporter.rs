use metrics::{describe_gauge, gauge};
use strum_macros::AsRefStr;

use crate::config::MetricNames;
use crate::model::{AccountSnapshot, JarSnapshot};

/// Which of the three currency gauges an observation lands on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum RateKind {
    Buy,
    Sell,
    Cross,
}

/// Sink for observed balances and rates.
pub trait MetricsExporter: Send + Sync {
    fn observe_account(&self, account: &AccountSnapshot);

    fn observe_jar(&self, jar: &JarSnapshot);

    fn observe_currency(&self, currency_a: &str, currency_b: &str, kind: RateKind, rate: f64);
}

/// Publishes gauges through the process-wide `metrics` recorder, which the
/// Prometheus handle renders on `/metrics`.
#[derive(Debug, Clone)]
pub struct PrometheusMetricsExporter {
    names: MetricNames,
}

impl PrometheusMetricsExporter {
    pub fn new(names: MetricNames) -> Self {
        describe_gauge!(names.balance.clone(), "shows current balance");
        describe_gauge!(names.credit_limit.clone(), "shows current credit limit");
        describe_gauge!(names.jar_balance.clone(), "shows current jar balance");
        describe_gauge!(names.currencies_buy.clone(), "shows current rate for buy");
        describe_gauge!(names.currencies_sell.clone(), "shows current rate for sell");
        describe_gauge!(names.currencies_cross.clone(), "shows current cross rate");
        Self { names }
    }

    fn currency_gauge_name(&self, kind: RateKind) -> String {
        match kind {
            RateKind::Buy => self.names.currencies_buy.clone(),
            RateKind::Sell => self.names.currencies_sell.clone(),
            RateKind::Cross => self.names.currencies_cross.clone(),
        }
    }
}

impl MetricsExporter for PrometheusMetricsExporter {
    fn observe_account(&self, account: &AccountSnapshot) {
        gauge!(
            self.names.balance.clone(),
            "name" => account.holder_name.clone(),
            "currency_type" => account.currency.clone(),
            "card_type" => account.card_type.clone()
        )
        .set(account.balance);
        gauge!(
            self.names.credit_limit.clone(),
            "name" => account.holder_name.clone(),
            "currency_type" => account.currency.clone(),
            "card_type" => account.card_type.clone()
        )
        .set(account.credit_limit);
    }

    fn observe_jar(&self, jar: &JarSnapshot) {
        gauge!(
            self.names.jar_balance.clone(),
            "name" => jar.holder_name.clone(),
            "title" => jar.title.clone(),
            "description" => jar.description.clone(),
            "currency_type" => jar.currency.clone(),
            "goal" => jar.goal_label()
        )
        .set(jar.balance);
    }

    fn observe_currency(&self, currency_a: &str, currency_b: &str, kind: RateKind, rate: f64) {
        gauge!(
            self.currency_gauge_name(kind),
            "currency_a" => currency_a.to_string(),
            "currency_b" => currency_b.to_string()
        )
        .set(rate);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use metrics_exporter_prometheus::PrometheusBuilder;

    fn render_with<F: FnOnce(&PrometheusMetricsExporter)>(names: MetricNames, f: F) -> String {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        metrics::with_local_recorder(&recorder, || {
            let exporter = PrometheusMetricsExporter::new(names);
            f(&exporter);
        });
        handle.render()
    }

    #[test]
    fn account_emits_balance_and_credit_limit() {
        let body = render_with(MetricNames::default(), |exporter| {
            exporter.observe_account(&AccountSnapshot {
                holder_name: "Alice".into(),
                currency: "UAH".into(),
                card_type: "black".into(),
                credit_limit: 1000.0,
                balance: 250.5,
            });
        });

        assert!(body.contains(
            r#"monobank_balance{name="Alice",currency_type="UAH",card_type="black"} 250.5"#
        ));
        assert!(body.contains(
            r#"monobank_credit_limit{name="Alice",currency_type="UAH",card_type="black"} 1000"#
        ));
    }

    #[test]
    fn jar_goal_label_defaults_to_empty() {
        let body = render_with(MetricNames::default(), |exporter| {
            exporter.observe_jar(&JarSnapshot {
                holder_name: "Alice".into(),
                title: "Trip".into(),
                description: "Summer".into(),
                currency: "UAH".into(),
                balance: 42.0,
                goal: None,
            });
        });

        assert!(body.contains(
            r#"monobank_jar_balance{name="Alice",title="Trip",description="Summer",currency_type="UAH",goal=""} 42"#
        ));
    }

    #[test]
    fn currency_kinds_map_to_separate_gauges() {
        let names = MetricNames {
            currencies_sell: "custom_sell".into(),
            ..MetricNames::default()
        };
        let body = render_with(names, |exporter| {
            exporter.observe_currency("USD", "UAH", RateKind::Buy, 41.1);
            exporter.observe_currency("USD", "UAH", RateKind::Sell, 41.6);
            exporter.observe_currency("PLN", "UAH", RateKind::Cross, 10.4);
        });

        assert!(body.contains(r#"monobank_currencies_buy{currency_a="USD",currency_b="UAH"} 41.1"#));
        assert!(body.contains(r#"custom_sell{currency_a="USD",currency_b="UAH"} 41.6"#));
        assert!(body.contains(r#"monobank_currencies_cross{currency_a="PLN",currency_b="UAH"} 10.4"#));
        assert!(!body.contains("monobank_currencies_sell{"));
    }
}
