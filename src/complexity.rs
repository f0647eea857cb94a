use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;

static FUNCTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:def|fn|func|fun|function)\s+\w+\s*[(<]").expect("valid function pattern")
});
static CLASS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:class|struct|enum|trait|interface)\s+\w+").expect("valid class pattern")
});
static CONDITIONAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:if|elif|switch|match)\b").expect("valid conditional pattern"));
static LOOP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:for|while|loop)\b").expect("valid loop pattern"));

/// Raw token counts behind a complexity score.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ComplexityCounts {
    pub lines: usize,
    pub functions: usize,
    pub classes: usize,
    pub conditionals: usize,
    pub loops: usize,
}

impl ComplexityCounts {
    pub fn scan(content: &str) -> Self {
        Self {
            lines: content.lines().count(),
            functions: FUNCTION.find_iter(content).count(),
            classes: CLASS.find_iter(content).count(),
            conditionals: CONDITIONAL.find_iter(content).count(),
            loops: LOOP.find_iter(content).count(),
        }
    }

    pub fn score(&self) -> f64 {
        self.lines as f64 * 0.1
            + self.functions as f64 * 2.0
            + self.classes as f64 * 3.0
            + self.conditionals as f64 * 1.5
            + self.loops as f64 * 2.0
    }
}

/// Heuristic complexity of a content snapshot.
pub fn score(content: &str) -> f64 {
    ComplexityCounts::scan(content).score()
}

/// Score a file on disk; unreadable files score 0.
pub fn score_file(path: &Path) -> f64 {
    match std::fs::read_to_string(path) {
        Ok(content) => score(&content),
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "cannot read file for scoring");
            0.0
        }
    }
}
