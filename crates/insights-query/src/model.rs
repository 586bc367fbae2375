//! Query model - Filters, pipeline stages and find queries

use crate::aggregation::Accumulator;
use crate::error::{QueryError, Result};
use insights_core::{Document, FieldValue};
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

/// Case-insensitive literal substring pattern.
///
/// The needle is escaped before compiling, so user input never acts as a
/// regular expression.
#[derive(Debug, Clone)]
pub struct ContainsPattern {
    needle: String,
    regex: Regex,
}

impl ContainsPattern {
    pub fn new(needle: impl Into<String>) -> Result<Self> {
        let needle = needle.into();
        let regex = RegexBuilder::new(&regex::escape(&needle))
            .case_insensitive(true)
            .build()?;
        Ok(Self { needle, regex })
    }

    pub fn needle(&self) -> &str {
        &self.needle
    }

    pub fn is_match(&self, haystack: &str) -> bool {
        self.regex.is_match(haystack)
    }
}

impl PartialEq for ContainsPattern {
    fn eq(&self, other: &Self) -> bool {
        self.needle == other.needle
    }
}

/// Document filter
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Matches every document
    All,
    /// Field is present, not null and not the empty string
    NonEmpty(String),
    /// Field holds a number
    Numeric(String),
    /// String field contains the pattern
    Contains {
        field: String,
        pattern: ContainsPattern,
    },
    /// Every sub-filter matches
    And(Vec<Filter>),
    /// At least one sub-filter matches
    Or(Vec<Filter>),
}

impl Filter {
    pub fn non_empty(field: impl Into<String>) -> Self {
        Filter::NonEmpty(field.into())
    }

    pub fn numeric(field: impl Into<String>) -> Self {
        Filter::Numeric(field.into())
    }

    /// Case-insensitive substring match on a string field
    pub fn contains(field: impl Into<String>, needle: impl Into<String>) -> Result<Self> {
        Ok(Filter::Contains {
            field: field.into(),
            pattern: ContainsPattern::new(needle)?,
        })
    }

    /// Check if a document matches this filter
    pub fn matches(&self, doc: &Document) -> bool {
        match self {
            Filter::All => true,
            Filter::NonEmpty(field) => !doc.is_missing(field),
            Filter::Numeric(field) => doc.get_path(field).is_some_and(FieldValue::is_numeric),
            Filter::Contains { field, pattern } => doc
                .get_path(field)
                .and_then(FieldValue::as_str)
                .is_some_and(|s| pattern.is_match(s)),
            Filter::And(filters) => filters.iter().all(|f| f.matches(doc)),
            Filter::Or(filters) => filters.iter().any(|f| f.matches(doc)),
        }
    }
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Ascending,
    Descending,
}

/// What a group stage buckets documents by
#[derive(Debug, Clone, PartialEq)]
pub enum GroupKey {
    /// Single group spanning all input documents
    Null,
    /// Value at a field path
    Field(String),
    /// Embedded document built from several field paths: `(name, path)`
    Compound(Vec<(String, String)>),
}

impl GroupKey {
    /// Evaluate the key for a document. Absent fields evaluate to null.
    pub fn evaluate(&self, doc: &Document) -> FieldValue {
        match self {
            GroupKey::Null => FieldValue::Null,
            GroupKey::Field(path) => doc.get_path(path).cloned().unwrap_or(FieldValue::Null),
            GroupKey::Compound(parts) => {
                let mut key = Document::new();
                for (name, path) in parts {
                    if let Some(value) = doc.get_path(path) {
                        key.insert(name.clone(), value.clone());
                    }
                }
                FieldValue::Object(key)
            }
        }
    }
}

/// A single pipeline stage
#[derive(Debug, Clone, PartialEq)]
pub enum Stage {
    /// Keep documents matching the filter
    Match(Filter),
    /// Parse `source` as a `published` date and store its UTC year in `target`
    DeriveYear { source: String, target: String },
    /// Bucket documents and compute one accumulator per named output field
    Group {
        key: GroupKey,
        accumulators: Vec<(String, Accumulator)>,
    },
    /// Stable sort on one or more field paths
    Sort(Vec<(String, SortOrder)>),
    Skip(usize),
    Limit(usize),
    /// Replace the stream with `{name: count}`; emits nothing for an empty stream
    Count(String),
    /// Run independent sub-pipelines over the same input
    Facet(Vec<(String, Pipeline)>),
}

impl Stage {
    fn validate(&self) -> Result<()> {
        match self {
            Stage::DeriveYear { source, target } => {
                if source.is_empty() || target.is_empty() {
                    return Err(QueryError::InvalidPipeline(
                        "derive-year stage needs source and target fields".to_string(),
                    ));
                }
            }
            Stage::Group { accumulators, .. } => {
                if accumulators.iter().any(|(name, _)| name.is_empty() || name == "_id") {
                    return Err(QueryError::InvalidAggregation(
                        "accumulator output names must be non-empty and not '_id'".to_string(),
                    ));
                }
            }
            Stage::Sort(keys) => {
                if keys.is_empty() {
                    return Err(QueryError::InvalidPipeline("sort stage without keys".to_string()));
                }
            }
            Stage::Limit(0) => {
                return Err(QueryError::InvalidPipeline(
                    "limit must be positive".to_string(),
                ));
            }
            Stage::Count(name) => {
                if name.is_empty() {
                    return Err(QueryError::InvalidPipeline("count stage needs a name".to_string()));
                }
            }
            Stage::Facet(facets) => {
                if facets.is_empty() {
                    return Err(QueryError::InvalidPipeline("facet stage without facets".to_string()));
                }
                for (name, pipeline) in facets {
                    if name.is_empty() {
                        return Err(QueryError::InvalidPipeline("unnamed facet".to_string()));
                    }
                    pipeline.validate()?;
                }
            }
            Stage::Match(_) | Stage::Skip(_) | Stage::Limit(_) => {}
        }
        Ok(())
    }
}

/// Ordered sequence of stages
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Pipeline {
    pub stages: Vec<Stage>,
}

impl Pipeline {
    /// Create a new pipeline builder
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    /// Validate every stage
    pub fn validate(&self) -> Result<()> {
        for stage in &self.stages {
            stage.validate()?;
        }
        Ok(())
    }
}

/// Pipeline builder for fluent API
#[derive(Default)]
pub struct PipelineBuilder {
    stages: Vec<Stage>,
}

impl PipelineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an arbitrary stage
    pub fn stage(mut self, stage: Stage) -> Self {
        self.stages.push(stage);
        self
    }

    pub fn match_filter(self, filter: Filter) -> Self {
        self.stage(Stage::Match(filter))
    }

    /// Keep documents where every listed field is present and non-empty
    pub fn match_non_empty(self, fields: &[&str]) -> Self {
        let filters = fields.iter().map(|f| Filter::non_empty(*f)).collect();
        self.match_filter(Filter::And(filters))
    }

    pub fn derive_year(self, source: impl Into<String>, target: impl Into<String>) -> Self {
        self.stage(Stage::DeriveYear {
            source: source.into(),
            target: target.into(),
        })
    }

    pub fn group(self, key: GroupKey, accumulators: Vec<(&str, Accumulator)>) -> Self {
        self.stage(Stage::Group {
            key,
            accumulators: accumulators
                .into_iter()
                .map(|(name, acc)| (name.to_string(), acc))
                .collect(),
        })
    }

    /// Group by a single field path
    pub fn group_by(self, field: impl Into<String>, accumulators: Vec<(&str, Accumulator)>) -> Self {
        self.group(GroupKey::Field(field.into()), accumulators)
    }

    pub fn sort_asc(self, field: impl Into<String>) -> Self {
        self.stage(Stage::Sort(vec![(field.into(), SortOrder::Ascending)]))
    }

    pub fn sort_desc(self, field: impl Into<String>) -> Self {
        self.stage(Stage::Sort(vec![(field.into(), SortOrder::Descending)]))
    }

    pub fn skip(self, n: usize) -> Self {
        self.stage(Stage::Skip(n))
    }

    pub fn limit(self, n: usize) -> Self {
        self.stage(Stage::Limit(n))
    }

    pub fn count(self, name: impl Into<String>) -> Self {
        self.stage(Stage::Count(name.into()))
    }

    pub fn facet(self, facets: Vec<(&str, Pipeline)>) -> Self {
        self.stage(Stage::Facet(
            facets
                .into_iter()
                .map(|(name, pipeline)| (name.to_string(), pipeline))
                .collect(),
        ))
    }

    /// Build the pipeline
    pub fn build(self) -> Result<Pipeline> {
        let pipeline = Pipeline {
            stages: self.stages,
        };
        pipeline.validate()?;
        Ok(pipeline)
    }
}

/// Plain document retrieval: filter, then skip/limit
#[derive(Debug, Clone, PartialEq)]
pub struct FindQuery {
    pub filter: Filter,
    pub skip: usize,
    pub limit: Option<usize>,
}

impl FindQuery {
    pub fn new(filter: Filter) -> Self {
        Self {
            filter,
            skip: 0,
            limit: None,
        }
    }

    pub fn skip(mut self, skip: usize) -> Self {
        self.skip = skip;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}
