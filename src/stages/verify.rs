//! Verify: decide whether the text is a financial document at all, and
//! identify its type and issuer.

use super::{AnalysisStage, StageFailure, StageInput, StageKind, StageOutcome, StageOutput, Verification};
use crate::constants::system::INLINE_SOURCE;
use crate::models::DocumentType;
use async_trait::async_trait;
use regex::{Regex, RegexSet};
use std::path::Path;
use std::sync::OnceLock;

/// Canonical term and the pattern that counts as a mention of it
const FINANCIAL_TERMS: &[(&str, &str)] = &[
    ("revenue", r"revenues?"),
    ("net income", r"net\s+income"),
    ("net loss", r"net\s+loss"),
    ("earnings", r"earnings"),
    ("profit", r"profits?"),
    ("balance sheet", r"balance\s+sheets?"),
    ("cash flow", r"cash\s+flows?"),
    ("assets", r"assets"),
    ("liabilities", r"liabilit(?:y|ies)"),
    ("equity", r"equity"),
    ("eps", r"eps|earnings\s+per\s+share"),
    ("dividend", r"dividends?"),
    ("ebitda", r"ebitda"),
    ("operating income", r"operating\s+income"),
    ("margin", r"margins?"),
    ("fiscal", r"fiscal"),
    ("shareholders", r"share(?:holders?|owners?)"),
    ("debt", r"debt"),
];

/// Longest company name accepted from the text
const MAX_COMPANY_NAME_CHARS: usize = 50;

fn term_set() -> &'static RegexSet {
    static SET: OnceLock<RegexSet> = OnceLock::new();
    SET.get_or_init(|| {
        RegexSet::new(
            FINANCIAL_TERMS
                .iter()
                .map(|(_, pattern)| format!(r"(?i)\b(?:{pattern})\b")),
        )
        .expect("static term patterns are valid")
    })
}

fn company_patterns() -> &'static [Regex; 2] {
    static PATTERNS: OnceLock<[Regex; 2]> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            Regex::new(
                r"(?m)^[ \t]*([A-Z][A-Za-z &,.]*?\b(?:Inc|Corp|Corporation|Company|Ltd|LLC)\b\.?)",
            )
            .expect("static regex is valid"),
            Regex::new(r"(?:Company|Corporation)[: \t]+([A-Z][A-Za-z &]*[A-Za-z])")
                .expect("static regex is valid"),
        ]
    })
}

/// Distinct canonical financial terms mentioned in `text`
pub fn matched_terms(text: &str) -> Vec<String> {
    term_set()
        .matches(text)
        .into_iter()
        .map(|idx| FINANCIAL_TERMS[idx].0.to_string())
        .collect()
}

/// Issuer named in the text, falling back to a title-cased file name
pub fn company_name(text: &str, source: &str) -> Option<String> {
    let from_text = company_patterns().iter().find_map(|pattern| {
        pattern
            .captures(text)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().trim().to_string())
            .filter(|name| !name.is_empty() && name.chars().count() <= MAX_COMPANY_NAME_CHARS)
    });

    from_text.or_else(|| name_from_source(source))
}

fn name_from_source(source: &str) -> Option<String> {
    if source == INLINE_SOURCE {
        return None;
    }
    let stem = Path::new(source).file_stem()?.to_str()?;
    let words: Vec<String> = stem
        .split(|c: char| c == '_' || c == '-' || c.is_whitespace())
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect();

    (!words.is_empty()).then(|| words.join(" "))
}

#[derive(Debug, Clone, Copy, Default)]
pub struct VerifyStage;

#[async_trait]
impl AnalysisStage for VerifyStage {
    fn kind(&self) -> StageKind {
        StageKind::Verify
    }

    async fn evaluate(&self, input: StageInput<'_>) -> StageOutcome {
        if input.query.trim().is_empty() {
            return Err(StageFailure::invalid_input(self.kind(), "query is empty"));
        }

        let context = input.context();
        let terms = matched_terms(context);
        let required = input.settings.min_financial_terms;
        let is_financial_document = terms.len() >= required;

        let reason = if is_financial_document {
            format!("found financial terms: {}", terms.join(", "))
        } else if terms.is_empty() {
            "no financial terms found".to_string()
        } else {
            format!(
                "found {} of {} required financial terms ({})",
                terms.len(),
                required,
                terms.join(", ")
            )
        };

        Ok(StageOutput::Verification(Verification {
            is_financial_document,
            document_type: DocumentType::identify(context),
            company_name: company_name(context, input.source),
            matched_terms: terms,
            reason,
        }))
    }
}
