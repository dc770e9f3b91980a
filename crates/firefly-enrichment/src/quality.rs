//! # Data Quality Engine (§2.4, §4.4)
//!
//! Evaluates an ordered rule set against a target value under one of two
//! strategies: `FAIL_FAST` stops at the first CRITICAL failure, `COLLECT_ALL`
//! always evaluates every rule. Built-in rules (`not-null`, `pattern`,
//! `range`) cover the common cases; callers may implement [`QualityRule`]
//! for anything bespoke.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use firefly_shared::error::{FireflyError, FireflyResult};
use firefly_shared::events::{topics, EventPublisher};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QualityStrategy {
    FailFast,
    CollectAll,
}

/// Outcome of one rule evaluation (§3 `QualityResult`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityResult {
    pub rule_name: String,
    pub passed: bool,
    pub severity: Severity,
    pub message: String,
    pub field_name: Option<String>,
    pub actual_value: Option<Value>,
}

/// Aggregate outcome of a rule set evaluation (§3 `QualityReport`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityReport {
    pub passed: bool,
    pub total_rules: usize,
    pub passed_rules: usize,
    pub failed_rules: usize,
    pub results: Vec<QualityResult>,
    pub timestamp: DateTime<Utc>,
}

impl QualityReport {
    fn from_results(results: Vec<QualityResult>) -> Self {
        let passed_rules = results.iter().filter(|r| r.passed).count();
        let failed_rules = results.len() - passed_rules;
        // report.passed ⟺ no result has (passed=false ∧ severity=CRITICAL)
        let passed = !results
            .iter()
            .any(|r| !r.passed && r.severity == Severity::Critical);
        Self {
            passed,
            total_rules: results.len(),
            passed_rules,
            failed_rules,
            results,
            timestamp: Utc::now(),
        }
    }

    pub fn failures(&self) -> impl Iterator<Item = &QualityResult> {
        self.results.iter().filter(|r| !r.passed)
    }

    pub fn by_severity(&self, severity: Severity) -> impl Iterator<Item = &QualityResult> {
        self.results.iter().filter(move |r| r.severity == severity)
    }
}

/// A deterministic predicate producing one [`QualityResult`] (GLOSSARY
/// "Quality rule").
pub trait QualityRule: Send + Sync + std::fmt::Debug {
    fn name(&self) -> String;
    fn severity(&self) -> Severity;
    fn evaluate(&self, value: &Value) -> QualityResult;
}

/// Evaluate `rules` against `value` under `strategy` (§4.4).
pub fn evaluate(
    rules: &[Box<dyn QualityRule>],
    value: &Value,
    strategy: QualityStrategy,
) -> QualityReport {
    let mut results = Vec::with_capacity(rules.len());
    for rule in rules {
        let result = rule.evaluate(value);
        let is_critical_failure = !result.passed && result.severity == Severity::Critical;
        results.push(result);
        if is_critical_failure && strategy == QualityStrategy::FailFast {
            break;
        }
    }
    QualityReport::from_results(results)
}

/// Evaluate `rules` against `value` and publish a `quality.evaluated` event
/// carrying the resulting report (§2.4 "produce report; emit event", §4.4
/// "On completion publish a QualityEvent carrying the report"). Publish
/// failures are logged and swallowed, matching `EnrichmentPipeline::publish`
/// — a dropped event never fails the evaluation itself.
pub async fn evaluate_and_publish(
    rules: &[Box<dyn QualityRule>],
    value: &Value,
    strategy: QualityStrategy,
    events: &Arc<dyn EventPublisher>,
) -> QualityReport {
    let report = evaluate(rules, value, strategy);
    if let Err(err) = events
        .publish(topics::QUALITY_EVALUATED, serde_json::json!({ "report": &report }))
        .await
    {
        tracing::warn!(error = %err, "quality event publish failed");
    }
    report
}

fn field(value: &Value, name: &str) -> Option<&Value> {
    value.as_object().and_then(|obj| obj.get(name))
}

/// `not-null:<field>`: passes iff the field is present and non-null.
#[derive(Debug)]
pub struct NotNullRule {
    field: String,
    severity: Severity,
}

impl NotNullRule {
    pub fn new(field: impl Into<String>, severity: Severity) -> Self {
        Self {
            field: field.into(),
            severity,
        }
    }
}

impl QualityRule for NotNullRule {
    fn name(&self) -> String {
        format!("not-null:{}", self.field)
    }

    fn severity(&self) -> Severity {
        self.severity
    }

    fn evaluate(&self, value: &Value) -> QualityResult {
        let actual = field(value, &self.field).cloned();
        let passed = matches!(&actual, Some(v) if !v.is_null());
        QualityResult {
            rule_name: self.name(),
            passed,
            severity: self.severity,
            message: if passed {
                format!("'{}' is present", self.field)
            } else {
                format!("'{}' must not be null", self.field)
            },
            field_name: Some(self.field.clone()),
            actual_value: actual,
        }
    }
}

/// `pattern:<field>`: compiled regex; a null or missing field always fails.
#[derive(Debug)]
pub struct PatternRule {
    field: String,
    pattern: Regex,
    severity: Severity,
}

impl PatternRule {
    pub fn new(field: impl Into<String>, pattern: &str, severity: Severity) -> FireflyResult<Self> {
        let compiled = Regex::new(pattern)
            .map_err(|e| FireflyError::validation(format!("invalid pattern rule regex: {e}")))?;
        Ok(Self {
            field: field.into(),
            pattern: compiled,
            severity,
        })
    }
}

impl QualityRule for PatternRule {
    fn name(&self) -> String {
        format!("pattern:{}", self.field)
    }

    fn severity(&self) -> Severity {
        self.severity
    }

    fn evaluate(&self, value: &Value) -> QualityResult {
        let actual = field(value, &self.field).cloned();
        let passed = actual
            .as_ref()
            .and_then(|v| v.as_str())
            .map(|s| self.pattern.is_match(s))
            .unwrap_or(false);
        QualityResult {
            rule_name: self.name(),
            passed,
            severity: self.severity,
            message: if passed {
                format!("'{}' matches pattern", self.field)
            } else {
                format!("'{}' does not match required pattern", self.field)
            },
            field_name: Some(self.field.clone()),
            actual_value: actual,
        }
    }
}

/// `range:<field>`: inclusive bounds; either bound `None` means open on
/// that side. A non-numeric or null field always fails.
#[derive(Debug)]
pub struct RangeRule {
    field: String,
    min: Option<f64>,
    max: Option<f64>,
    severity: Severity,
}

impl RangeRule {
    pub fn new(field: impl Into<String>, min: Option<f64>, max: Option<f64>, severity: Severity) -> Self {
        Self {
            field: field.into(),
            min,
            max,
            severity,
        }
    }
}

impl QualityRule for RangeRule {
    fn name(&self) -> String {
        format!("range:{}", self.field)
    }

    fn severity(&self) -> Severity {
        self.severity
    }

    fn evaluate(&self, value: &Value) -> QualityResult {
        let actual = field(value, &self.field).cloned();
        let number = actual.as_ref().and_then(|v| v.as_f64());
        let passed = match number {
            Some(n) => self.min.map(|min| n >= min).unwrap_or(true) && self.max.map(|max| n <= max).unwrap_or(true),
            None => false,
        };
        QualityResult {
            rule_name: self.name(),
            passed,
            severity: self.severity,
            message: if passed {
                format!("'{}' is within range", self.field)
            } else {
                format!("'{}' is outside the allowed range", self.field)
            },
            field_name: Some(self.field.clone()),
            actual_value: actual,
        }
    }
}
