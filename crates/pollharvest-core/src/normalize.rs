//! Converts raw worker payloads into canonical extracted items.
//!
//! Pattern splitting recognizes two fragment shapes in a document:
//! lines that end with a question mark, and sentences led by a question
//! word. A delegated suggester may replace pattern splitting per source;
//! its failure degrades back to patterns and never fails the job.

use url::Url;

use crate::models::{ExtractedItem, ExtractionMethod, Provenance, RawPayload, SourceDescriptor};
use crate::traits::FragmentSuggester;

/// Tunable fragment-length bounds.
#[derive(Debug, Clone, Copy)]
pub struct NormalizerConfig {
    /// Fragments shorter than this are dropped as noise.
    pub min_fragment_len: usize,
    pub max_fragment_len: usize,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            min_fragment_len: 15,
            max_fragment_len: 300,
        }
    }
}

const QUESTION_STARTERS: &[&str] = &[
    "do you", "would you", "are you", "have you", "did you", "will you", "should", "what", "how",
    "why", "which", "who", "when", "where",
];

/// Stateless payload-to-item converter. Deterministic given identical input;
/// never touches session state.
#[derive(Debug, Clone)]
pub struct Normalizer<G: FragmentSuggester> {
    config: NormalizerConfig,
    suggester: G,
}

impl<G: FragmentSuggester> Normalizer<G> {
    pub fn new(config: NormalizerConfig, suggester: G) -> Self {
        Self { config, suggester }
    }

    /// Convert one payload into at most `cap` extracted items.
    pub async fn normalize(
        &self,
        payload: &RawPayload,
        source: &SourceDescriptor,
        cap: usize,
    ) -> Vec<ExtractedItem> {
        let RawPayload::Surveys(batch) = payload;

        // Local exact dedup only: the two pattern passes often find the same
        // line. Session-wide fuzzy dedup belongs to the dedup engine.
        let mut seen = std::collections::HashSet::new();
        let mut items = Vec::new();
        for doc in &batch.surveys {
            let source_url = doc
                .url
                .as_deref()
                .filter(|u| Url::parse(u).is_ok())
                .map(str::to_string);

            let mut fragments = Vec::new();
            if let Some(question) = &doc.survey_question {
                fragments.push(question.clone());
            }
            fragments.extend(self.document_fragments(&doc.embedded_content, source).await);

            for fragment in fragments {
                let text = clean_fragment(&fragment);
                let len = text.chars().count();
                if len < self.config.min_fragment_len || len > self.config.max_fragment_len {
                    continue;
                }
                if !seen.insert(text.to_lowercase()) {
                    continue;
                }
                items.push(ExtractedItem {
                    text,
                    source_id: source.id.clone(),
                    source_url: source_url.clone(),
                    provenance: Provenance {
                        survey_code: doc.survey_code.clone(),
                        survey_date: doc.survey_date.clone(),
                        method: source.extraction,
                    },
                });
                if items.len() >= cap {
                    return items;
                }
            }
        }
        items
    }

    async fn document_fragments(&self, content: &str, source: &SourceDescriptor) -> Vec<String> {
        match source.extraction {
            ExtractionMethod::PatternSplit => pattern_fragments(content),
            ExtractionMethod::Delegated => match self.suggester.suggest_fragments(content).await {
                Ok(fragments) if !fragments.is_empty() => fragments,
                Ok(_) => pattern_fragments(content),
                Err(err) => {
                    tracing::warn!(
                        source_id = %source.id,
                        error = %err,
                        "Fragment delegate failed, falling back to pattern split"
                    );
                    pattern_fragments(content)
                }
            },
        }
    }
}

/// Pattern-based splitting: question-mark lines plus question-word sentences.
pub fn pattern_fragments(content: &str) -> Vec<String> {
    let mut fragments = Vec::new();

    for line in content.lines() {
        let line = line.trim();
        if line.ends_with('?') {
            fragments.push(line.to_string());
        }
    }

    for sentence in content.split_terminator(['.', '!', '?']) {
        let sentence = clean_fragment(sentence);
        let lower = sentence.to_lowercase();
        if QUESTION_STARTERS.iter().any(|s| lower.starts_with(s)) {
            fragments.push(format!("{sentence}?"));
        }
    }

    fragments
}

/// Strip list numbering/bullets and collapse whitespace.
fn clean_fragment(text: &str) -> String {
    let mut t = text.trim();
    t = t
        .trim_start_matches(|c: char| c.is_ascii_digit())
        .trim_start_matches(['.', ')'])
        .trim_start_matches(['-', '*', '•'])
        .trim_start();
    t.split_whitespace().collect::<Vec<_>>().join(" ")
}
