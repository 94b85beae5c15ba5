use regex::Regex;

use crate::config::PlatePattern;

/// Ordered regional plate patterns. The first pattern matching the start of the
/// upper-cased text wins, so configuration order is priority order.
#[derive(Debug, Default)]
pub struct PatternMatcher {
    patterns: Vec<(Regex, String)>,
}

impl PatternMatcher {
    /// Compile the configured patterns. Invalid expressions are logged and skipped.
    pub fn new(patterns: &[PlatePattern]) -> Self {
        let mut compiled = Vec::with_capacity(patterns.len());
        for entry in patterns {
            // Anchor at the start only; a trailing `$` in the pattern still applies.
            match Regex::new(&format!("^(?:{})", entry.pattern)) {
                Ok(regex) => compiled.push((regex, entry.region.clone())),
                Err(e) => log::warn!("pattern '{}' skipped: {}", entry.pattern, e),
            }
        }
        if compiled.is_empty() {
            log::warn!("no plate patterns configured; plate text will never normalize");
        }
        Self { patterns: compiled }
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Returns `"{TEXT} {region}"` for the first matching pattern, or `""` when
    /// nothing matches. Trailing whitespace (OCR engines end lines with `\n`) is
    /// dropped; leading whitespace is part of the text and must match.
    pub fn normalize(&self, raw_text: &str) -> String {
        let text = raw_text.trim_end().to_uppercase();
        if text.is_empty() {
            return String::new();
        }
        for (regex, region) in &self.patterns {
            if regex.is_match(&text) {
                log::debug!("pattern matched: {} ({})", text, region);
                return format!("{} {}", text, region).trim_end().to_string();
            }
        }
        log::debug!("no pattern matched: {}", text);
        String::new()
    }
}
