//! Report generation strategy.
//!
//! The coordinator only sees [`ReportGenerator`]; the placeholder
//! [`TemplateReportGenerator`] can be swapped for a model-backed one without
//! touching the lifecycle.

use time::macros::format_description;
use time::OffsetDateTime;

use crate::request::BusinessInfo;

/// Prompt characters quoted in the analysis section.
const PROMPT_EXCERPT_CHARS: usize = 100;

/// Any failure raised by a generator. The lifecycle treats every cause alike,
/// so the error is just the message that ends up on the failed record.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct GenerationError {
    message: String,
}

impl GenerationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<String> for GenerationError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<&str> for GenerationError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

/// Turns business details and a prompt into report text.
///
/// Called synchronously from the blocking pool, once per lifecycle run, and
/// never retried. Implementations should be free of side effects.
pub trait ReportGenerator: Send + Sync + 'static {
    fn generate(&self, business: &BusinessInfo, prompt: &str) -> Result<String, GenerationError>;
}

impl<F> ReportGenerator for F
where
    F: Fn(&BusinessInfo, &str) -> Result<String, GenerationError> + Send + Sync + 'static,
{
    fn generate(&self, business: &BusinessInfo, prompt: &str) -> Result<String, GenerationError> {
        self(business, prompt)
    }
}

/// Placeholder generator producing a fixed Markdown report.
#[derive(Debug, Clone, Default)]
pub struct TemplateReportGenerator {
    generated_at: Option<OffsetDateTime>,
}

impl TemplateReportGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stamp every report with `at` instead of the current time.
    pub fn with_fixed_time(at: OffsetDateTime) -> Self {
        Self {
            generated_at: Some(at),
        }
    }
}

fn prompt_excerpt(prompt: &str) -> String {
    prompt.chars().take(PROMPT_EXCERPT_CHARS).collect()
}

impl ReportGenerator for TemplateReportGenerator {
    fn generate(&self, business: &BusinessInfo, prompt: &str) -> Result<String, GenerationError> {
        let at = self.generated_at.unwrap_or_else(OffsetDateTime::now_utc);
        let stamp = at
            .format(format_description!(
                "[year]-[month]-[day] [hour]:[minute]:[second]"
            ))
            .map_err(|e| GenerationError::new(format!("failed to format report time: {}", e)))?;

        let name = &business.business_name;
        let report = format!(
            "# Business Report for {name}

## Executive Summary
This is a placeholder report generated for demonstration purposes.

## Business Information
- **Company**: {name}
- **Location**: {postal}, {country}
- **Industry**: {industry}

## Analysis
Based on your request: \"{excerpt}...\"

## Key Findings
1. Your business is located in {country}
2. You operate in the {industry} industry

## Recommendations
1. Continue operating your business
2. This is a placeholder report - replace with model-generated content

## Conclusion
This placeholder report has been successfully generated.

---
*Report generated on {stamp}*",
            name = name,
            postal = business.postal_code,
            country = business.country,
            industry = business.industry,
            excerpt = prompt_excerpt(prompt),
            stamp = stamp,
        );

        Ok(report)
    }
}
