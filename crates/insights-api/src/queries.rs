//! Fixed query definitions, one per endpoint
//!
//! Every pipeline drops records whose grouped field is missing (absent,
//! null or empty). Fields that are averaged or summed must hold numbers.

use insights_query::{Accumulator, Filter, FindQuery, GroupKey, Pipeline, Result};

/// Field holding the derived publication year
const PUBLISHED_YEAR: &str = "publishedYear";

/// Group by `group_field`, average `value_field`, highest average first
fn average_by(group_field: &str, value_field: &str, output: &str) -> Result<Pipeline> {
    Pipeline::builder()
        .match_filter(Filter::And(vec![
            Filter::non_empty(group_field),
            Filter::numeric(value_field),
        ]))
        .group_by(group_field, vec![(output, Accumulator::avg(value_field))])
        .sort_desc(output)
        .build()
}

/// Group by `group_field`, count records, largest group first
fn count_by(group_field: &str, output: &str) -> Result<Pipeline> {
    Pipeline::builder()
        .match_non_empty(&[group_field])
        .group_by(group_field, vec![(output, Accumulator::Count)])
        .sort_desc(output)
        .build()
}

/// Distinct non-empty values of a field, counted
fn distinct_count(field: &str) -> Result<Pipeline> {
    Pipeline::builder()
        .match_non_empty(&[field])
        .group_by(field, vec![("count", Accumulator::Count)])
        .count("total")
        .build()
}

pub fn average_intensity_by_topic() -> Result<Pipeline> {
    average_by("topic", "intensity", "averageIntensity")
}

pub fn most_relevant_insights_by_region() -> Result<Pipeline> {
    Pipeline::builder()
        .match_filter(Filter::And(vec![
            Filter::non_empty("region"),
            Filter::numeric("relevance"),
        ]))
        .group_by("region", vec![("totalRelevance", Accumulator::sum("relevance"))])
        .sort_desc("totalRelevance")
        .build()
}

pub fn likelihood_by_country() -> Result<Pipeline> {
    average_by("country", "likelihood", "averageLikelihood")
}

pub fn intensity_over_years() -> Result<Pipeline> {
    Pipeline::builder()
        .match_filter(Filter::And(vec![
            Filter::non_empty("published"),
            Filter::numeric("intensity"),
        ]))
        .derive_year("published", PUBLISHED_YEAR)
        // records whose date did not parse carry no year
        .match_filter(Filter::numeric(PUBLISHED_YEAR))
        .group_by(PUBLISHED_YEAR, vec![("averageIntensity", Accumulator::avg("intensity"))])
        .sort_asc("_id")
        .build()
}

pub fn insights_count_by_country() -> Result<Pipeline> {
    count_by("country", "count")
}

pub fn prevalent_topics_by_region() -> Result<Pipeline> {
    Pipeline::builder()
        .match_non_empty(&["topic", "region"])
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
}

pub fn most_relevant_topics() -> Result<Pipeline> {
    average_by("topic", "relevance", "averageRelevance")
}

pub fn distribution_by_pestle() -> Result<Pipeline> {
    count_by("pestle", "count")
}

/// Records whose `title` or `insight` contains `search`, one page at a time
pub fn search(search: &str, skip: usize, limit: usize) -> Result<FindQuery> {
    Ok(FindQuery::new(search_filter(search)?).skip(skip).limit(limit))
}

pub fn search_filter(search: &str) -> Result<Filter> {
    Ok(Filter::Or(vec![
        Filter::contains("title", search)?,
        Filter::contains("insight", search)?,
    ]))
}

/// Category fields in the order they are consulted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Sector,
    Topic,
    Country,
    Pestle,
}

impl Category {
    pub fn field(&self) -> &'static str {
        match self {
            Category::Sector => "sector",
            Category::Topic => "topic",
            Category::Country => "country",
            Category::Pestle => "pestle",
        }
    }
}

/// Pick the first non-empty category among sector, topic and country,
/// falling back to pestle (which may itself be empty)
pub fn select_category(
    sector: Option<&str>,
    topic: Option<&str>,
    country: Option<&str>,
    pestle: Option<&str>,
) -> (Category, String) {
    let candidates = [
        (Category::Sector, sector),
        (Category::Topic, topic),
        (Category::Country, country),
    ];
    for (category, value) in candidates {
        if let Some(value) = value.filter(|v| !v.is_empty()) {
            return (category, value.to_string());
        }
    }
    (Category::Pestle, pestle.unwrap_or_default().to_string())
}

/// Up to ten records whose category field contains `value`
pub fn insights_by_category(category: Category, value: &str) -> Result<FindQuery> {
    Ok(FindQuery::new(Filter::contains(category.field(), value)?).limit(10))
}

/// Total records plus distinct sector, topic and published counts
pub fn counts() -> Result<Pipeline> {
    let insights = Pipeline::builder()
        .group(GroupKey::Null, vec![("count", Accumulator::Count)])
        .build()?;

    Pipeline::builder()
        .facet(vec![
            ("insights", insights),
            ("sectors", distinct_count("sector")?),
            ("topics", distinct_count("topic")?),
            ("published", distinct_count("published")?),
        ])
        .build()
}

pub fn insights_with_different_likelihood() -> Result<Pipeline> {
    Pipeline::builder()
        .match_non_empty(&["likelihood"])
        .group_by("likelihood", vec![("totalInsights", Accumulator::Count)])
        .build()
}

pub fn top_countries_by_insights(limit: usize) -> Result<Pipeline> {
    Pipeline::builder()
        .match_non_empty(&["country"])
        .group_by("country", vec![("totalInsights", Accumulator::Count)])
        .sort_desc("totalInsights")
        .limit(limit)
        .build()
}
