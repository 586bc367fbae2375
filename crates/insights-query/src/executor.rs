//! Pipeline executor
//!
//! Runs a [`Pipeline`] stage by stage over a slice of documents. The input
//! slice is never modified; stages that reshape documents work on copies.

use crate::aggregation::{Accumulator, AccumulatorState};
use crate::error::Result;
use crate::model::{Filter, FindQuery, GroupKey, Pipeline, SortOrder, Stage};
use insights_core::{published_year, Document, FieldValue};
use std::borrow::Cow;
use std::cmp::Ordering;
use std::collections::HashMap;
use tracing::debug;

/// Stateless pipeline executor
#[derive(Debug, Default, Clone, Copy)]
pub struct PipelineExecutor;

impl PipelineExecutor {
    pub fn new() -> Self {
        Self
    }

    /// Execute an aggregation pipeline
    pub fn execute(&self, pipeline: &Pipeline, input: &[Document]) -> Result<Vec<Document>> {
        pipeline.validate()?;
        let stream: Vec<Cow<'_, Document>> = input.iter().map(Cow::Borrowed).collect();
        let output = self.run_stages(&pipeline.stages, stream)?;
        Ok(output.into_iter().map(Cow::into_owned).collect())
    }

    /// Filter, skip and limit documents
    pub fn find(&self, query: &FindQuery, input: &[Document]) -> Vec<Document> {
        let matched = input
            .iter()
            .filter(|doc| query.filter.matches(doc))
            .skip(query.skip);

        match query.limit {
            Some(limit) => matched.take(limit).cloned().collect(),
            None => matched.cloned().collect(),
        }
    }

    /// Count documents matching a filter
    pub fn count(&self, filter: &Filter, input: &[Document]) -> u64 {
        input.iter().filter(|doc| filter.matches(doc)).count() as u64
    }

    fn run_stages<'a>(
        &self,
        stages: &[Stage],
        mut stream: Vec<Cow<'a, Document>>,
    ) -> Result<Vec<Cow<'a, Document>>> {
        for stage in stages {
            stream = match stage {
                Stage::Match(filter) => {
                    stream.retain(|doc| filter.matches(doc));
                    stream
                }
                Stage::DeriveYear { source, target } => derive_year(stream, source, target),
                Stage::Group { key, accumulators } => group(stream, key, accumulators),
                Stage::Sort(keys) => {
                    sort(&mut stream, keys);
                    stream
                }
                Stage::Skip(n) => stream.into_iter().skip(*n).collect(),
                Stage::Limit(n) => {
                    stream.truncate(*n);
                    stream
                }
                Stage::Count(name) => {
                    if stream.is_empty() {
                        Vec::new()
                    } else {
                        let doc = Document::new().with(name.clone(), stream.len() as u64);
                        vec![Cow::Owned(doc)]
                    }
                }
                Stage::Facet(facets) => {
                    let mut out = Document::new();
                    for (name, pipeline) in facets {
                        let results = self.run_stages(&pipeline.stages, stream.clone())?;
                        let values: Vec<FieldValue> = results
                            .into_iter()
                            .map(|doc| FieldValue::Object(doc.into_owned()))
                            .collect();
                        out.insert(name.clone(), values);
                    }
                    vec![Cow::Owned(out)]
                }
            };
        }
        Ok(stream)
    }
}

fn derive_year<'a>(
    stream: Vec<Cow<'a, Document>>,
    source: &str,
    target: &str,
) -> Vec<Cow<'a, Document>> {
    stream
        .into_iter()
        .map(|doc| {
            let year = match doc.get_path(source).and_then(FieldValue::as_str) {
                Some(raw) => published_year(raw).map_err(|e| e.to_string()),
                None => Err(format!("'{}' is not a date string", source)),
            };
            match year {
                Ok(year) => {
                    let mut owned = doc.into_owned();
                    owned.insert(target, year);
                    Cow::Owned(owned)
                }
                Err(reason) => {
                    debug!("Skipping year derivation: {}", reason);
                    clear_field(doc, target)
                }
            }
        })
        .collect()
}

/// A failed derivation leaves the target absent, even if the record
/// carried its own value under that name
fn clear_field<'a>(doc: Cow<'a, Document>, field: &str) -> Cow<'a, Document> {
    if !doc.contains_key(field) {
        return doc;
    }
    let mut owned = doc.into_owned();
    owned.remove(field);
    Cow::Owned(owned)
}

fn group<'a>(
    stream: Vec<Cow<'a, Document>>,
    key: &GroupKey,
    accumulators: &[(String, Accumulator)],
) -> Vec<Cow<'a, Document>> {
    // Groups are emitted in first-seen order
    let mut order: Vec<(FieldValue, Vec<AccumulatorState>)> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for doc in &stream {
        let value = key.evaluate(doc);
        let slot = *index.entry(value.canonical_key()).or_insert_with(|| {
            order.push((value, accumulators.iter().map(|(_, acc)| acc.start()).collect()));
            order.len() - 1
        });

        let states = &mut order[slot].1;
        for ((_, acc), state) in accumulators.iter().zip(states.iter_mut()) {
            state.add(acc, doc);
        }
    }

    order
        .into_iter()
        .map(|(id, states)| {
            let mut out = Document::new().with("_id", id);
            for ((name, _), state) in accumulators.iter().zip(states) {
                out.insert(name.clone(), state.finish());
            }
            Cow::Owned(out)
        })
        .collect()
}

fn sort(stream: &mut [Cow<'_, Document>], keys: &[(String, SortOrder)]) {
    stream.sort_by(|a, b| {
        for (path, order) in keys {
            let left = a.get_path(path).unwrap_or(&FieldValue::Null);
            let right = b.get_path(path).unwrap_or(&FieldValue::Null);
            let ord = match order {
                SortOrder::Ascending => left.compare(right),
                SortOrder::Descending => right.compare(left),
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn docs(json: &str) -> Vec<Document> {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_match_group_sort() {
        let input = docs(
            r#"[
                {"topic": "oil", "intensity": 6},
                {"topic": "oil", "intensity": 2},
                {"topic": "gas", "intensity": 9},
                {"topic": "", "intensity": 50},
                {"intensity": 40},
                {"topic": "coal", "intensity": ""}
            ]"#,
        );
        let pipeline = Pipeline::builder()
            .match_filter(Filter::And(vec![
                Filter::non_empty("topic"),
                Filter::numeric("intensity"),
            ]))
            .group_by("topic", vec![("avg", Accumulator::avg("intensity"))])
            .sort_desc("avg")
            .build()
            .unwrap();

        let out = PipelineExecutor::new().execute(&pipeline, &input).unwrap();
        let ids: Vec<&str> = out.iter().map(|d| d.get("_id").unwrap().as_str().unwrap()).collect();
        assert_eq!(ids, vec!["gas", "oil"]);
        assert_eq!(out[1].get("avg"), Some(&FieldValue::Float(4.0)));
    }

    #[test]
    fn test_group_first_seen_order_and_numeric_keys() {
        let input = docs(r#"[{"l": 3}, {"l": 1}, {"l": 3.0}, {"l": 2}]"#);
        let pipeline = Pipeline::builder()
            .group_by("l", vec![("n", Accumulator::Count)])
            .build()
            .unwrap();
        let out = PipelineExecutor::new().execute(&pipeline, &input).unwrap();
        assert_eq!(out.len(), 3);
        assert_eq!(out[0].get("_id"), Some(&FieldValue::Integer(3)));
        assert_eq!(out[0].get("n"), Some(&FieldValue::Integer(2)));
        assert_eq!(out[1].get("_id"), Some(&FieldValue::Integer(1)));
    }

    #[test]
    fn test_sort_is_stable() {
        let input = docs(r#"[{"k": 1, "n": "a"}, {"k": 2, "n": "b"}, {"k": 1, "n": "c"}]"#);
        let pipeline = Pipeline::builder().sort_desc("k").build().unwrap();
        let out = PipelineExecutor::new().execute(&pipeline, &input).unwrap();
        let names: Vec<&str> = out.iter().map(|d| d.get("n").unwrap().as_str().unwrap()).collect();
        assert_eq!(names, vec!["b", "a", "c"]);
    }

    #[test]
    fn test_derive_year_skips_unparseable() {
        let input = docs(
            r#"[
                {"published": "January, 01 2020 00:00:00", "intensity": 4},
                {"published": "garbage", "intensity": 100},
                {"published": 2020, "intensity": 100}
            ]"#,
        );
        let pipeline = Pipeline::builder()
            .derive_year("published", "year")
            .match_filter(Filter::numeric("year"))
            .build()
            .unwrap();
        let out = PipelineExecutor::new().execute(&pipeline, &input).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].get("year"), Some(&FieldValue::Integer(2020)));
        // source document is untouched
        assert!(input[0].get("year").is_none());
    }

    #[test]
    fn test_derive_year_clears_stale_target_on_failure() {
        let input = docs(
            r#"[
                {"published": "January, 01 2020 00:00:00", "year": 1990},
                {"published": "garbage", "year": 1999},
                {"published": 2020, "year": "n/a"},
                {"year": 2001}
            ]"#,
        );
        let pipeline = Pipeline::builder()
            .derive_year("published", "year")
            .build()
            .unwrap();
        let out = PipelineExecutor::new().execute(&pipeline, &input).unwrap();
        assert_eq!(out.len(), 4);
        assert_eq!(out[0].get("year"), Some(&FieldValue::Integer(2020)));
        assert!(out[1..].iter().all(|doc| !doc.contains_key("year")));
        // the stored record keeps its own field
        assert_eq!(input[1].get("year"), Some(&FieldValue::Integer(1999)));
    }

    #[test]
    fn test_two_level_grouping() {
        let input = docs(
            r#"[
                {"region": "Asia", "topic": "oil"},
                {"region": "Asia", "topic": "gas"},
                {"region": "Asia", "topic": "gas"},
                {"region": "Africa", "topic": "oil"}
            ]"#,
        );
        let pipeline = Pipeline::builder()
            .group(
                GroupKey::Compound(vec![
                    ("region".to_string(), "region".to_string()),
                    ("topic".to_string(), "topic".to_string()),
                ]),
                vec![("count", Accumulator::Count)],
            )
            .sort_desc("count")
            .group_by(
                "_id.region",
                vec![("topics", Accumulator::push(&[("topic", "_id.topic"), ("count", "count")]))],
            )
            .sort_asc("_id")
            .build()
            .unwrap();

        let out = PipelineExecutor::new().execute(&pipeline, &input).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].get("_id").and_then(FieldValue::as_str), Some("Africa"));
        let FieldValue::Array(topics) = out[1].get("topics").unwrap() else {
            panic!("topics should be an array");
        };
        let first = topics[0].as_document().unwrap();
        assert_eq!(first.get("topic").and_then(FieldValue::as_str), Some("gas"));
        assert_eq!(first.get("count"), Some(&FieldValue::Integer(2)));
    }

    #[test]
    fn test_skip_limit_count() {
        let input = docs(r#"[{"a": 1}, {"a": 2}, {"a": 3}, {"a": 4}]"#);
        let pipeline = Pipeline::builder().skip(1).limit(2).build().unwrap();
        let out = PipelineExecutor::new().execute(&pipeline, &input).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].get("a"), Some(&FieldValue::Integer(2)));

        let pipeline = Pipeline::builder().count("total").build().unwrap();
        let out = PipelineExecutor::new().execute(&pipeline, &input).unwrap();
        assert_eq!(out[0].get("total"), Some(&FieldValue::Integer(4)));

        let out = PipelineExecutor::new().execute(&pipeline, &[]).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_facet_runs_independent_pipelines() {
        let input = docs(r#"[{"s": "x"}, {"s": "y"}, {"s": "x"}, {"s": ""}]"#);
        let distinct = Pipeline::builder()
            .match_non_empty(&["s"])
            .group_by("s", vec![("n", Accumulator::Count)])
            .count("total")
            .build()
            .unwrap();
        let all = Pipeline::builder()
            .group(GroupKey::Null, vec![("count", Accumulator::Count)])
            .build()
            .unwrap();
        let pipeline = Pipeline::builder()
            .facet(vec![("distinct", distinct), ("all", all)])
            .build()
            .unwrap();

        let out = PipelineExecutor::new().execute(&pipeline, &input).unwrap();
        assert_eq!(out.len(), 1);
        let FieldValue::Array(distinct) = out[0].get("distinct").unwrap() else {
            panic!("facet output should be an array");
        };
        assert_eq!(
            distinct[0].as_document().unwrap().get("total"),
            Some(&FieldValue::Integer(2))
        );
        let FieldValue::Array(all) = out[0].get("all").unwrap() else {
            panic!("facet output should be an array");
        };
        assert_eq!(
            all[0].as_document().unwrap().get("count"),
            Some(&FieldValue::Integer(4))
        );
    }

    #[test]
    fn test_find_and_count() {
        let input = docs(r#"[{"t": "Oil a"}, {"t": "gas"}, {"t": "oil b"}, {"t": "OIL c"}]"#);
        let filter = Filter::contains("t", "oil").unwrap();
        let executor = PipelineExecutor::new();

        assert_eq!(executor.count(&filter, &input), 3);
        let page = executor.find(&FindQuery::new(filter.clone()).skip(1).limit(1), &input);
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].get("t").and_then(FieldValue::as_str), Some("oil b"));

        let all = executor.find(&FindQuery::new(filter), &input);
        assert_eq!(all.len(), 3);
    }

    #[test]
    fn test_execute_rejects_invalid_pipeline() {
        let pipeline = Pipeline {
            stages: vec![Stage::Limit(0)],
        };
        assert!(PipelineExecutor::new().execute(&pipeline, &[]).is_err());
    }
}
