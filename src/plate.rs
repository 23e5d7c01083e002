use crate::types::PlateFragment;
use anyhow::Result;
use regex::Regex;
use std::cmp::Ordering;
use tracing::debug;

const MIN_PLATE_CHARS: usize = 4;

/// Turns raw OCR fragments into one canonical plate string.
///
/// Matching order: domestic grammars first, then international, then a
/// best-single-fragment fallback. The confusable substitution (O→0,
/// I→1, l→1) is applied only to the copy the patterns run against;
/// the fallback returns the fragment text as read.
#[derive(Debug)]
pub struct PlateExtractor {
    domestic: Vec<Regex>,
    international: Vec<Regex>,
    canonical: Regex,
    whitespace: Regex,
}

impl PlateExtractor {
    pub fn new() -> Result<Self> {
        Ok(Self {
            // Domestic grammars in priority order:
            //   short tail  51B-12345 / 36F-8888
            //   letter pair 43AB-1234
            //   split tail  51B1-123.45
            domestic: vec![
                Regex::new(r"(?i)\b(\d{2}[A-Z]\d?[-\s]?\d{4,5})\b")?,
                Regex::new(r"(?i)\b(\d{2}[A-Z]{1,2}[-\s]?\d{4,5})\b")?,
                Regex::new(r"(?i)\b(\d{2}[A-Z]\d[-\s]?\d{3}[.\-]?\d{2})\b")?,
            ],
            international: vec![
                Regex::new(r"(?i)\b([A-Z]{1,3}[\s\-]?\d{3,4}[\s\-]?[A-Z]{0,2})\b")?,
                // Generic alphanumeric run, case-sensitive
                Regex::new(r"\b([A-Z0-9]{5,8})\b")?,
            ],
            canonical: Regex::new(r"^(\d{2}[A-Z]{1,2}\d?)(\d{4,5})$")?,
            whitespace: Regex::new(r"\s+")?,
        })
    }

    /// Returns the recognized plate, or None when no stage produced a
    /// usable string.
    pub fn extract(&self, fragments: &[PlateFragment]) -> Option<String> {
        if fragments.is_empty() {
            return None;
        }

        let joined = fragments
            .iter()
            .filter(|f| f.confidence > 0.3)
            .map(|f| f.text.trim().to_uppercase())
            .collect::<Vec<_>>()
            .join(" ");
        // Matching copy only; the fallback sees the text as read.
        let substituted = joined.replace('O', "0").replace('I', "1").replace('l', "1");

        for pattern in &self.domestic {
            if let Some(caps) = pattern.captures(&substituted) {
                let plate = self.normalize_domestic(&caps[1]);
                if plate.len() >= MIN_PLATE_CHARS {
                    debug!("OCR [domestic] found: {}", plate);
                    return Some(plate);
                }
            }
        }

        for pattern in &self.international {
            if let Some(caps) = pattern.captures(&substituted) {
                let plate = caps[1].trim().to_uppercase();
                let plate = self.whitespace.replace_all(&plate, " ").into_owned();
                if plate.len() >= MIN_PLATE_CHARS {
                    debug!("OCR [intl] found: {}", plate);
                    return Some(plate);
                }
            }
        }

        // Last resort: the single strongest fragment, unmodified.
        let best = fragments.iter().max_by(|a, b| {
            a.confidence
                .partial_cmp(&b.confidence)
                .unwrap_or(Ordering::Equal)
        })?;
        if best.confidence > 0.5 && best.text.trim().len() >= MIN_PLATE_CHARS {
            return Some(best.text.trim().to_uppercase());
        }

        None
    }

    /// Canonical domestic form: strip separators, then re-insert one
    /// dash between the regional prefix and the numeric tail. Strings
    /// outside the domestic shape pass through uppercased.
    pub fn normalize_domestic(&self, raw: &str) -> String {
        let stripped: String = raw
            .to_uppercase()
            .chars()
            .filter(|c| !matches!(c, ' ' | '.' | '-'))
            .collect();
        if let Some(caps) = self.canonical.captures(&stripped) {
            format!("{}-{}", &caps[1], &caps[2])
        } else {
            raw.to_uppercase()
        }
    }
}
