//! Typed record predicates.
//!
//! Queries are expressed as a small tagged expression tree over named
//! field accessors, evaluated against decoded records. Combinators
//! (`And`/`Or`) nest arbitrarily; `AnyAnnotation` matches when any element
//! of a record's annotation sequence satisfies the inner predicate.

use birdseye_types::{AnnotationBox, SourceRecord, Verdict};

/// Predicate over a single annotation.
#[derive(Clone, Debug, PartialEq)]
pub enum AnnotationFilter {
    LabelEquals(String),
    LabelContains(String),
    DescriptionContains(String),
    /// Substring match against any tag.
    TagContains(String),
    ValueEquals(Verdict),
}

impl AnnotationFilter {
    pub fn matches(&self, annotation: &AnnotationBox) -> bool {
        match self {
            AnnotationFilter::LabelEquals(label) => annotation.label == *label,
            AnnotationFilter::LabelContains(needle) => annotation.label.contains(needle),
            AnnotationFilter::DescriptionContains(needle) => {
                annotation.description.contains(needle)
            }
            AnnotationFilter::TagContains(needle) => {
                annotation.tags.iter().any(|tag| tag.contains(needle))
            }
            AnnotationFilter::ValueEquals(verdict) => annotation.value == *verdict,
        }
    }
}

/// Predicate over a whole record.
#[derive(Clone, Debug, PartialEq)]
pub enum Filter {
    /// Matches every record.
    All,
    And(Vec<Filter>),
    Or(Vec<Filter>),
    PathEquals(String),
    PathContains(String),
    IndexEquals(u32),
    ChannelEquals(String),
    DescriptionContains(String),
    /// Substring match against the grouping reference's nickname.
    NicknameContains(String),
    /// Any element of the annotation sequence matches.
    AnyAnnotation(AnnotationFilter),
}

impl Filter {
    pub fn matches(&self, record: &SourceRecord) -> bool {
        match self {
            Filter::All => true,
            Filter::And(parts) => parts.iter().all(|part| part.matches(record)),
            Filter::Or(parts) => parts.iter().any(|part| part.matches(record)),
            Filter::PathEquals(path) => record.source_path == *path,
            Filter::PathContains(needle) => record.source_path.contains(needle),
            Filter::IndexEquals(index) => record.source_index == *index,
            Filter::ChannelEquals(channel) => record.channel == *channel,
            Filter::DescriptionContains(needle) => record.description.contains(needle),
            Filter::NicknameContains(needle) => record
                .record_ref
                .as_ref()
                .and_then(|reference| reference.nickname.as_ref())
                .is_some_and(|nickname| nickname.contains(needle)),
            Filter::AnyAnnotation(inner) => record
                .annotations
                .as_ref()
                .is_some_and(|annotations| annotations.iter().any(|a| inner.matches(a))),
        }
    }

    /// The free-text search: substring match across the reference nickname,
    /// the source path, and annotation labels, descriptions, and tags.
    /// Empty or whitespace-only text matches everything.
    pub fn text_search(text: &str) -> Filter {
        let needle = text.trim();
        if needle.is_empty() {
            return Filter::All;
        }
        let needle = needle.to_string();
        Filter::Or(vec![
            Filter::NicknameContains(needle.clone()),
            Filter::PathContains(needle.clone()),
            Filter::AnyAnnotation(AnnotationFilter::LabelContains(needle.clone())),
            Filter::AnyAnnotation(AnnotationFilter::DescriptionContains(needle.clone())),
            Filter::AnyAnnotation(AnnotationFilter::TagContains(needle)),
        ])
    }
}
