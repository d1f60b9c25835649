//! LipidMaps REST lookups by molecular formula.

use std::sync::LazyLock;
use std::time::Duration;

use lipidsort_shared::{LipidMapsConfig, LipidSortError, Result};
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};
use url::Url;

/// User-Agent string for LipidMaps requests.
const USER_AGENT: &str = concat!("lipidsort/", env!("CARGO_PKG_VERSION"));

/// `[FA01]`-style classification codes.
static BRACKETED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[.*?\]").expect("valid regex"));

/// Classification of one formula.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LipidRecord {
    pub formula: String,
    /// Top-level category, e.g. `Fatty Acyls`.
    pub core: String,
    /// Main class, e.g. `Fatty Acids and Conjugates`.
    pub main_class: String,
}

impl LipidRecord {
    /// `C18H34O2: Fatty Acyls, Fatty Acids and Conjugates`, one line of the
    /// sorter's input list.
    pub fn input_line(&self) -> String {
        format!("{}: {}, {}", self.formula, self.core, self.main_class)
    }

    /// `C18H34O2 => Fatty Acyls`, one line of a seed grouping.
    pub fn pregroup_line(&self) -> String {
        format!("{} => {}", self.formula, self.core)
    }
}

/// Result of annotating a formula list.
#[derive(Debug, Clone, Default)]
pub struct Annotation {
    pub records: Vec<LipidRecord>,
    /// Formulas LipidMaps had nothing for, or that could not be fetched.
    pub failed: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawRecord {
    #[serde(default)]
    formula: Option<String>,
    #[serde(default)]
    core: Option<String>,
    #[serde(default)]
    main_class: Option<String>,
}

/// Remove bracketed codes and surrounding whitespace.
pub fn strip_brackets(text: &str) -> String {
    BRACKETED.replace_all(text, "").trim().to_string()
}

/// Client for `{base}/rest/compound/formula/{formula}/all`.
pub struct LipidMapsClient {
    client: Client,
    base_url: Url,
    rate_limit: Duration,
}

impl LipidMapsClient {
    pub fn new(config: &LipidMapsConfig) -> Result<Self> {
        let base_url = Url::parse(&config.base_url).map_err(|e| {
            LipidSortError::config(format!("invalid lipidmaps.base_url '{}': {e}", config.base_url))
        })?;

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| LipidSortError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url,
            rate_limit: Duration::from_millis(config.rate_limit_ms),
        })
    }

    fn formula_url(&self, formula: &str) -> String {
        let formula: String = formula.chars().filter(|c| !c.is_whitespace()).collect();
        format!(
            "{}/rest/compound/formula/{formula}/all",
            self.base_url.as_str().trim_end_matches('/')
        )
    }

    /// Look up one formula.
    ///
    /// `Ok(None)` when LipidMaps answers with a non-success status or with
    /// nothing usable; `Err` only when the request itself fails.
    #[instrument(skip(self))]
    pub async fn fetch(&self, formula: &str) -> Result<Option<LipidRecord>> {
        let url = self.formula_url(formula);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| LipidSortError::Network(format!("{url}: {e}")))?;

        let status = response.status();
        debug!(%url, %status, "lipidmaps response");
        if !status.is_success() {
            return Ok(None);
        }

        let body = response
            .text()
            .await
            .map_err(|e| LipidSortError::Network(format!("{url}: {e}")))?;

        match serde_json::from_str::<Value>(&body) {
            Ok(value) => Ok(record_from_value(value, formula)),
            Err(e) => {
                debug!(error = %e, "lipidmaps body is not JSON");
                Ok(None)
            }
        }
    }

    /// Look up every formula line in turn, spaced by the configured rate
    /// limit. Quotes are stripped and blank lines skipped.
    #[instrument(skip_all, fields(formulas = lines.len()))]
    pub async fn annotate<S: AsRef<str>>(&self, lines: &[S]) -> Annotation {
        let mut annotation = Annotation::default();
        let mut first = true;

        for line in lines {
            let formula = line.as_ref().replace('"', "");
            let formula = formula.trim();
            if formula.is_empty() {
                continue;
            }

            if !first && !self.rate_limit.is_zero() {
                tokio::time::sleep(self.rate_limit).await;
            }
            first = false;

            match self.fetch(formula).await {
                Ok(Some(record)) => {
                    debug!(%formula, core = %record.core, "annotated");
                    annotation.records.push(record);
                }
                Ok(None) => {
                    warn!(%formula, "no LipidMaps data for formula");
                    annotation.failed.push(formula.to_string());
                }
                Err(e) => {
                    warn!(%formula, error = %e, "LipidMaps lookup failed");
                    annotation.failed.push(formula.to_string());
                }
            }
        }

        info!(
            annotated = annotation.records.len(),
            failed = annotation.failed.len(),
            "LipidMaps annotation finished"
        );
        annotation
    }
}

/// Accepts a single object, an object keyed `Row1`, `Row2`, ... (first row
/// used) or a non-empty array (first element used).
fn record_from_value(value: Value, queried: &str) -> Option<LipidRecord> {
    let entry = match value {
        Value::Object(mut map) => match map.remove("Row1") {
            Some(row) => row,
            None => Value::Object(map),
        },
        Value::Array(items) => items.into_iter().next()?,
        _ => return None,
    };

    let raw: RawRecord = serde_json::from_value(entry).ok()?;
    let core = strip_brackets(raw.core.as_deref().unwrap_or_default());
    let main_class = strip_brackets(raw.main_class.as_deref().unwrap_or_default());
    if core.is_empty() && main_class.is_empty() {
        return None;
    }

    let formula = raw
        .formula
        .map(|f| f.trim().to_string())
        .filter(|f| !f.is_empty())
        .unwrap_or_else(|| queried.trim().to_string());

    Some(LipidRecord {
        formula,
        core,
        main_class,
    })
}
