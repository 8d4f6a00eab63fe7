//! Pre-retrieval intent routing.
//!
//! Questions are matched, case-insensitively, against small phrase tables.
//! Listing and existence questions are answered from index metadata alone;
//! everything else goes through retrieval, optionally pinned to one document
//! or filtered by a detected industry keyword.

use std::fmt;
use std::path::Path;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Listing,
    Existence,
    DocumentSpecific,
    General,
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Intent::Listing => "listing",
            Intent::Existence => "existence",
            Intent::DocumentSpecific => "document_specific",
            Intent::General => "general",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Listing,
    Existence { category: Option<String> },
    Document { source: String },
    General { category: Option<String> },
}

impl Route {
    pub fn intent(&self) -> Intent {
        match self {
            Route::Listing => Intent::Listing,
            Route::Existence { .. } => Intent::Existence,
            Route::Document { .. } => Intent::DocumentSpecific,
            Route::General { .. } => Intent::General,
        }
    }
}

/// Decides how a question is answered. `known_sources` are the distinct
/// source names currently in the index.
pub trait IntentClassifier: Send + Sync {
    fn classify(&self, question: &str, known_sources: &[String]) -> Route;
}

pub const LISTING_PHRASES: &[&str] = &[
    "list all case studies",
    "list all the case studies",
    "list the case studies",
    "list case studies",
    "show all case studies",
    "show me all case studies",
    "what case studies are available",
    "which case studies are available",
    "what case studies do we have",
    "what case studies do you have",
    "all available case studies",
];

pub const EXISTENCE_PHRASES: &[&str] = &[
    "is there any",
    "is there a ",
    "are there any",
    "do we have",
    "do you have",
    "have we done",
    "any case study on",
    "any case studies on",
];

// shorter document stems match too much ordinary text
const MIN_STEM_CHARS: usize = 3;

/// Table-driven classifier: phrase → intent, in priority order listing,
/// existence, document-specific, general.
pub struct PhraseClassifier {
    rules: Vec<(String, Intent)>,
    categories: Vec<String>,
}

impl PhraseClassifier {
    pub fn new(categories: &[String]) -> Self {
        let rules = LISTING_PHRASES
            .iter()
            .map(|p| (p.to_string(), Intent::Listing))
            .chain(EXISTENCE_PHRASES.iter().map(|p| (p.to_string(), Intent::Existence)))
            .collect();
        Self::with_rules(rules, categories)
    }

    /// Custom phrase table; only `Listing` and `Existence` rules are
    /// meaningful, the other intents are decided from source names.
    pub fn with_rules(rules: Vec<(String, Intent)>, categories: &[String]) -> Self {
        Self {
            rules: rules.into_iter().map(|(p, i)| (p.to_lowercase(), i)).collect(),
            categories: categories.iter().map(|c| c.trim().to_lowercase()).filter(|c| !c.is_empty()).collect(),
        }
    }

    fn phrase_intent(&self, q: &str) -> Option<Intent> {
        [Intent::Listing, Intent::Existence]
            .into_iter()
            .find(|intent| self.rules.iter().any(|(p, i)| i == intent && q.contains(p.as_str())))
    }

    /// Longest configured category contained in the question.
    pub fn detect_category(&self, question: &str) -> Option<String> {
        let q = question.to_lowercase();
        self.categories
            .iter()
            .filter(|c| q.contains(c.as_str()))
            .max_by_key(|c| c.chars().count())
            .cloned()
    }

    /// The known source whose extension-stripped name appears in the
    /// question, with `_` and `-` also accepted as spaces.
    pub fn detect_document(&self, question: &str, known_sources: &[String]) -> Option<String> {
        let q = question.to_lowercase();
        known_sources
            .iter()
            .filter_map(|source| {
                let stem = document_stem(source);
                if stem.chars().count() < MIN_STEM_CHARS {
                    return None;
                }
                let spaced = stem.replace(['_', '-'], " ");
                (q.contains(&stem) || q.contains(&spaced)).then(|| (stem.chars().count(), source))
            })
            .max_by_key(|(len, _)| *len)
            .map(|(_, source)| source.clone())
    }
}

fn document_stem(source: &str) -> String {
    Path::new(source)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| source.to_string())
        .to_lowercase()
}

impl IntentClassifier for PhraseClassifier {
    fn classify(&self, question: &str, known_sources: &[String]) -> Route {
        let q = question.to_lowercase();
        match self.phrase_intent(&q) {
            Some(Intent::Listing) => return Route::Listing,
            Some(Intent::Existence) => return Route::Existence { category: self.detect_category(&q) },
            _ => {}
        }
        if let Some(source) = self.detect_document(&q, known_sources) {
            return Route::Document { source };
        }
        Route::General { category: self.detect_category(&q) }
    }
}

/// Listing answer over every known source, already sorted by the index.
pub fn listing_answer(sources: &[String]) -> String {
    if sources.is_empty() {
        return "No case studies have been ingested yet.".to_string();
    }
    let noun = if sources.len() == 1 { "case study is" } else { "case studies are" };
    let mut out = format!("{} {} available:", sources.len(), noun);
    for s in sources {
        out.push_str("\n- ");
        out.push_str(s);
    }
    out
}

/// Yes/no answer for an existence question plus the matching sources.
pub fn existence_answer(category: Option<&str>, sources: &[String]) -> (String, Vec<String>) {
    let Some(category) = category else {
        return (
            "I couldn't tell which industry or category you mean, so I can't say whether a matching case study exists."
                .to_string(),
            Vec::new(),
        );
    };
    let needle = category.to_lowercase();
    let matches: Vec<String> = sources.iter().filter(|s| s.to_lowercase().contains(&needle)).cloned().collect();
    let text = match matches.len() {
        0 => format!("No, there are no {} case studies.", category),
        1 => format!("Yes, there is 1 {} case study: {}.", category, matches[0]),
        n => format!("Yes, there are {} {} case studies: {}.", n, category, matches.join(", ")),
    };
    (text, matches)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stems_drop_only_the_extension() {
        assert_eq!(document_stem("FMCG_Snacks.pdf"), "fmcg_snacks");
        assert_eq!(document_stem("q3.retail.review.pdf"), "q3.retail.review");
        assert_eq!(document_stem("noext"), "noext");
    }
}
