use landed_core::config::{AppConfig, LoadOptions};
use landed_core::currency::RateProvider;
use landed_integrations::ExchangeRateApiProvider;
use landed_store::JsonFileOrderStore;
use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

pub fn run(json_output: bool) -> String {
    let report = build_report();

    if json_output {
        return serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\
                 \"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        });
    }

    render_human(&report)
}

fn build_report() -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_owned(),
            });
            checks.extend(runtime_checks(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            checks.push(skipped("orders_directory"));
            checks.push(skipped("currency_provider"));
        }
    }

    let all_pass = checks.iter().all(|check| check.status != CheckStatus::Fail);
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "doctor: all readiness checks passed".to_owned()
    } else {
        "doctor: one or more readiness checks failed".to_owned()
    };

    DoctorReport { overall_status, summary, checks }
}

fn skipped(name: &'static str) -> DoctorCheck {
    DoctorCheck {
        name,
        status: CheckStatus::Skipped,
        details: "skipped because configuration did not load".to_owned(),
    }
}

fn runtime_checks(config: &AppConfig) -> Vec<DoctorCheck> {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            let details = format!("failed to initialize async runtime: {error}");
            return vec![
                DoctorCheck {
                    name: "orders_directory",
                    status: CheckStatus::Fail,
                    details: details.clone(),
                },
                DoctorCheck { name: "currency_provider", status: CheckStatus::Fail, details },
            ];
        }
    };

    runtime.block_on(async {
        vec![check_orders_directory(config).await, check_currency_provider(config).await]
    })
}

async fn check_orders_directory(config: &AppConfig) -> DoctorCheck {
    let store = JsonFileOrderStore::new(config.orders.directory.clone());
    match store.probe_writable().await {
        Ok(()) => DoctorCheck {
            name: "orders_directory",
            status: CheckStatus::Pass,
            details: format!("`{}` is writable", store.directory().display()),
        },
        Err(error) => DoctorCheck {
            name: "orders_directory",
            status: CheckStatus::Fail,
            details: error.to_string(),
        },
    }
}

async fn check_currency_provider(config: &AppConfig) -> DoctorCheck {
    let source = &config.pricing.source_currency;
    let display = &config.pricing.display_currency;
    if source == display {
        return DoctorCheck {
            name: "currency_provider",
            status: CheckStatus::Skipped,
            details: "source and display currency are the same".to_owned(),
        };
    }

    let provider = match ExchangeRateApiProvider::new(
        &config.currency.provider_base_url,
        config.currency.timeout(),
    ) {
        Ok(provider) => provider,
        Err(error) => {
            return DoctorCheck {
                name: "currency_provider",
                status: CheckStatus::Fail,
                details: format!("could not build http client: {error}"),
            };
        }
    };

    match provider.latest_rates(source).await {
        Ok(rates) if rates.contains_key(display.code()) => DoctorCheck {
            name: "currency_provider",
            status: CheckStatus::Pass,
            details: format!(
                "{} -> {} rate available from `{}`",
                source.code(),
                display.code(),
                config.currency.provider_base_url
            ),
        },
        Ok(_) => DoctorCheck {
            name: "currency_provider",
            status: CheckStatus::Fail,
            details: format!("provider returned no {} rate for {}", display.code(), source.code()),
        },
        Err(error) => DoctorCheck {
            name: "currency_provider",
            status: CheckStatus::Fail,
            details: format!("provider unreachable: {error}"),
        },
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
