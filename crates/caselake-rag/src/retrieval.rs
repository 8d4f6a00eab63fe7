//! Turns nearest-neighbor hits into a context window and a short, ranked
//! source list.
//!
//! Order of filters: the source pin (`required_source` by exact name,
//! `required_keyword` by substring, both before top-k selection), similarity
//! threshold, topic keywords. Every chunk that passes goes into the context.
//! Survivors are also aggregated per source; sources without enough evidence
//! are dropped from the ranking, the rest ranked and truncated.

use std::cmp::Ordering;
use std::collections::HashMap;

use tracing::debug;

use caselake_core::config::RetrievalConfig;
use caselake_core::types::{SearchHit, SourceAggregate};
use caselake_core::Result;
use caselake_vector::VectorIndex;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Retrieval {
    /// Surviving chunks, `\n\n`-joined in retrieval order.
    pub context: String,
    pub sources: Vec<String>,
    /// The hits the context was built from.
    pub hits: Vec<SearchHit>,
}

/// Which sources a question may draw from.
struct SourcePin {
    exact: Option<String>,
    keyword: Option<String>,
}

impl SourcePin {
    fn from_config(config: &RetrievalConfig) -> Self {
        let keyword = config.required_keyword.as_deref().map(str::trim).filter(|k| !k.is_empty()).map(str::to_lowercase);
        Self { exact: config.required_source.clone(), keyword }
    }

    fn is_set(&self) -> bool { self.exact.is_some() || self.keyword.is_some() }

    fn admits(&self, source: &str) -> bool {
        self.exact.as_deref().map_or(true, |s| s == source)
            && self.keyword.as_deref().map_or(true, |kw| source.to_lowercase().contains(kw))
    }
}

/// Number of configured topic keywords found in `text`.
pub fn topic_hits(text: &str, keywords: &[String]) -> usize {
    let text = text.to_lowercase();
    keywords
        .iter()
        .map(|k| k.trim().to_lowercase())
        .filter(|k| !k.is_empty() && text.contains(k.as_str()))
        .count()
}

pub fn retrieve(index: &VectorIndex, query: &[f32], config: &RetrievalConfig) -> Result<Retrieval> {
    let pin = SourcePin::from_config(config);
    let hits = if pin.is_set() {
        index.search_where(query, config.top_k, |r| pin.admits(&r.source))?
    } else {
        index.search(query, config.top_k)?
    };
    debug!(candidates = hits.len(), top_k = config.top_k, "retrieved candidates");
    Ok(aggregate(hits, config))
}

/// The filtering and ranking half of [`retrieve`], on hits already fetched
/// best-first.
pub fn aggregate(hits: Vec<SearchHit>, config: &RetrievalConfig) -> Retrieval {
    let pin = SourcePin::from_config(config);
    let topic_mode = config.topic_mode();
    let min_topic = config.min_topic_matches.unwrap_or(1);

    let mut survivors: Vec<(SearchHit, usize)> = Vec::new();
    for hit in hits {
        if !pin.admits(&hit.source) { continue; }
        if hit.score < config.similarity_threshold { continue; }
        let topics = if topic_mode { topic_hits(&hit.text, &config.topic_keywords) } else { 0 };
        if topic_mode && topics == 0 { continue; }
        survivors.push((hit, topics));
    }

    let mut per_source: HashMap<&str, SourceAggregate> = HashMap::new();
    for (hit, topics) in &survivors {
        per_source.entry(hit.source.as_str()).or_default().record(hit.score, *topics);
    }

    let mut ranked: Vec<(&str, SourceAggregate)> = per_source
        .into_iter()
        .filter(|(_, agg)| agg.chunk_count >= config.min_chunks_per_source)
        .filter(|(_, agg)| !topic_mode || agg.topic_hits >= min_topic)
        .collect();
    ranked.sort_by(|(a_name, a), (b_name, b)| {
        let primary = if topic_mode { b.topic_hits.cmp(&a.topic_hits) } else { Ordering::Equal };
        primary.then(b.max_score.total_cmp(&a.max_score)).then(a_name.cmp(b_name))
    });
    ranked.truncate(config.max_sources);

    let sources: Vec<String> = ranked.iter().map(|(name, _)| name.to_string()).collect();
    let hits: Vec<SearchHit> = survivors.into_iter().map(|(h, _)| h).collect();
    let context = hits.iter().map(|h| h.text.as_str()).collect::<Vec<_>>().join("\n\n");
    debug!(sources = sources.len(), chunks = hits.len(), "aggregated retrieval");
    Retrieval { context, sources, hits }
}
