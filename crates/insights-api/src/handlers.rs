//! HTTP request handlers

use crate::error::{ApiError, Result};
use crate::queries;
use axum::{
    extract::{rejection::QueryRejection, Query, State},
    response::Json,
};
use insights_core::{Document, FieldValue};
use insights_storage::DocumentStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

const DEFAULT_PAGE: u64 = 1;
const DEFAULT_PER_PAGE: u64 = 10;
const TOP_COUNTRIES: usize = 5;

/// Application state shared across handlers
pub struct AppState {
    pub store: Arc<dyn DocumentStore>,
    pub query_semaphore: Arc<Semaphore>,
    pub query_timeout: Duration,
}

impl AppState {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        query_timeout: Duration,
        max_concurrent_queries: usize,
    ) -> Self {
        Self {
            store,
            query_semaphore: Arc::new(Semaphore::new(max_concurrent_queries.max(1))),
            query_timeout,
        }
    }

    /// Run a store call on the blocking pool, bounded by the query timeout
    /// and the concurrent query limit.
    ///
    /// The permit moves into the blocking task, so a query that outlives
    /// its timeout keeps holding its slot until it actually finishes.
    pub async fn run<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&dyn DocumentStore) -> insights_storage::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let permit = Arc::clone(&self.query_semaphore)
            .acquire_owned()
            .await
            .map_err(|_| ApiError::Internal("Query semaphore closed".to_string()))?;

        let store = Arc::clone(&self.store);
        let result = tokio::time::timeout(
            self.query_timeout,
            tokio::task::spawn_blocking(move || {
                let _permit = permit;
                f(store.as_ref())
            }),
        )
        .await;

        match result {
            Ok(Ok(Ok(value))) => Ok(value),
            Ok(Ok(Err(store_err))) => Err(store_err.into()),
            Ok(Err(join_err)) => Err(ApiError::Internal(format!("Query task failed: {}", join_err))),
            Err(_elapsed) => Err(ApiError::Timeout(self.query_timeout.as_secs())),
        }
    }
}

/// Group label of an aggregation row
fn label(row: &Document) -> FieldValue {
    row.get("_id").cloned().unwrap_or(FieldValue::Null)
}

/// Render a numeric aggregate with exactly two decimals
fn fixed2(row: &Document, field: &str) -> Result<String> {
    row.get(field)
        .and_then(FieldValue::as_f64)
        .map(|v| format!("{:.2}", v))
        .ok_or_else(|| ApiError::Internal(format!("Aggregate '{}' is not numeric", field)))
}

fn count_of(row: &Document, field: &str) -> Result<u64> {
    row.get(field)
        .and_then(FieldValue::as_i64)
        .and_then(|n| u64::try_from(n).ok())
        .ok_or_else(|| ApiError::Internal(format!("Aggregate '{}' is not a count", field)))
}

/// Split rows into parallel label/value arrays
fn parallel<T>(
    rows: &[Document],
    value: impl Fn(&Document) -> Result<T>,
) -> Result<(Vec<FieldValue>, Vec<T>)> {
    let mut labels = Vec::with_capacity(rows.len());
    let mut values = Vec::with_capacity(rows.len());
    for row in rows {
        labels.push(label(row));
        values.push(value(row)?);
    }
    Ok((labels, values))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TopicIntensityResponse {
    pub topics: Vec<FieldValue>,
    pub intensity: Vec<String>,
}

/// Average intensity per topic, highest first
pub async fn average_intensity_by_topic(
    State(state): State<Arc<AppState>>,
) -> Result<Json<TopicIntensityResponse>> {
    let pipeline = queries::average_intensity_by_topic()?;
    let rows = state.run(move |store| store.aggregate(&pipeline)).await?;

    let (topics, intensity) = parallel(&rows, |row| fixed2(row, "averageIntensity"))?;
    Ok(Json(TopicIntensityResponse { topics, intensity }))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegionRelevanceResponse {
    pub regions: Vec<FieldValue>,
    pub relevance: Vec<String>,
}

/// Total relevance per region, highest first
pub async fn most_relevant_insights_by_region(
    State(state): State<Arc<AppState>>,
) -> Result<Json<RegionRelevanceResponse>> {
    let pipeline = queries::most_relevant_insights_by_region()?;
    let rows = state.run(move |store| store.aggregate(&pipeline)).await?;

    let (regions, relevance) = parallel(&rows, |row| fixed2(row, "totalRelevance"))?;
    Ok(Json(RegionRelevanceResponse { regions, relevance }))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CountryLikelihoodResponse {
    pub countries: Vec<FieldValue>,
    pub likelihood: Vec<String>,
}

/// Average likelihood per country, highest first
pub async fn likelihood_by_country(
    State(state): State<Arc<AppState>>,
) -> Result<Json<CountryLikelihoodResponse>> {
    let pipeline = queries::likelihood_by_country()?;
    let rows = state.run(move |store| store.aggregate(&pipeline)).await?;

    let (countries, likelihood) = parallel(&rows, |row| fixed2(row, "averageLikelihood"))?;
    Ok(Json(CountryLikelihoodResponse {
        countries,
        likelihood,
    }))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct YearIntensityResponse {
    pub years: Vec<i64>,
    pub intensity: Vec<String>,
}

/// Average intensity per publication year, oldest first
pub async fn intensity_over_years(
    State(state): State<Arc<AppState>>,
) -> Result<Json<YearIntensityResponse>> {
    let pipeline = queries::intensity_over_years()?;
    let rows = state.run(move |store| store.aggregate(&pipeline)).await?;

    let mut years = Vec::with_capacity(rows.len());
    let mut intensity = Vec::with_capacity(rows.len());
    for row in &rows {
        let year = label(row)
            .as_i64()
            .ok_or_else(|| ApiError::Internal("Year group key is not an integer".to_string()))?;
        years.push(year);
        intensity.push(fixed2(row, "averageIntensity")?);
    }
    Ok(Json(YearIntensityResponse { years, intensity }))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CountryCountResponse {
    pub countries: Vec<FieldValue>,
    pub count: Vec<u64>,
}

/// Number of records per country, largest first
pub async fn insights_count_by_country(
    State(state): State<Arc<AppState>>,
) -> Result<Json<CountryCountResponse>> {
    let pipeline = queries::insights_count_by_country()?;
    let rows = state.run(move |store| store.aggregate(&pipeline)).await?;

    let (countries, count) = parallel(&rows, |row| count_of(row, "count"))?;
    Ok(Json(CountryCountResponse { countries, count }))
}

/// Topic counts nested under each region
pub async fn prevalent_topics_by_region(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Document>>> {
    let pipeline = queries::prevalent_topics_by_region()?;
    let rows = state.run(move |store| store.aggregate(&pipeline)).await?;
    Ok(Json(rows))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TopicRelevanceResponse {
    pub topics: Vec<FieldValue>,
    pub relevance: Vec<String>,
}

/// Average relevance per topic, highest first
pub async fn most_relevant_topics(
    State(state): State<Arc<AppState>>,
) -> Result<Json<TopicRelevanceResponse>> {
    let pipeline = queries::most_relevant_topics()?;
    let rows = state.run(move |store| store.aggregate(&pipeline)).await?;

    let (topics, relevance) = parallel(&rows, |row| fixed2(row, "averageRelevance"))?;
    Ok(Json(TopicRelevanceResponse { topics, relevance }))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PestleCountResponse {
    pub pestle: Vec<FieldValue>,
    pub count: Vec<u64>,
}

/// Number of records per PESTLE category, largest first
pub async fn distribution_by_pestle(
    State(state): State<Arc<AppState>>,
) -> Result<Json<PestleCountResponse>> {
    let pipeline = queries::distribution_by_pestle()?;
    let rows = state.run(move |store| store.aggregate(&pipeline)).await?;

    let (pestle, count) = parallel(&rows, |row| count_of(row, "count"))?;
    Ok(Json(PestleCountResponse { pestle, count }))
}

/// Query string of the search endpoint.
///
/// Values stay strings so a malformed number is reported by `positive`.
/// Query strings that do not deserialize at all (repeated keys) are
/// mapped from the extractor rejection into the same error shape.
#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    pub search: Option<String>,
    pub page: Option<String>,
    pub limit: Option<String>,
}

/// Parse an optional positive integer parameter
fn positive(name: &str, raw: Option<&str>, default: u64) -> Result<u64> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(default);
    };
    match raw.parse::<u64>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(ApiError::InvalidParameter {
            name: name.to_string(),
            reason: format!("expected a positive integer, got '{}'", raw),
        }),
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    pub status: u8,
    pub data: Vec<Document>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
    pub total_pages: u64,
}

/// Paginated case-insensitive search over `title` and `insight`
pub async fn search(
    State(state): State<Arc<AppState>>,
    params: std::result::Result<Query<SearchParams>, QueryRejection>,
) -> Result<Json<SearchResponse>> {
    let Query(params) = params?;
    let page = positive("page", params.page.as_deref(), DEFAULT_PAGE)?;
    let per_page = positive("limit", params.limit.as_deref(), DEFAULT_PER_PAGE)?;
    let skip = (page - 1)
        .checked_mul(per_page)
        .and_then(|s| usize::try_from(s).ok())
        .ok_or_else(|| ApiError::InvalidParameter {
            name: "page".to_string(),
            reason: "page offset out of range".to_string(),
        })?;
    let limit = usize::try_from(per_page).map_err(|_| ApiError::InvalidParameter {
        name: "limit".to_string(),
        reason: "limit out of range".to_string(),
    })?;

    let search = params.search.unwrap_or_default();
    let query = queries::search(&search, skip, limit)?;

    let (data, total) = state
        .run(move |store| {
            let data = store.find(&query)?;
            let total = store.count_documents(&query.filter)?;
            Ok((data, total))
        })
        .await?;

    Ok(Json(SearchResponse {
        status: 1,
        data,
        total,
        page,
        per_page,
        total_pages: total.div_ceil(per_page),
    }))
}

#[derive(Debug, Default, Deserialize)]
pub struct CategoryParams {
    pub sector: Option<String>,
    pub topic: Option<String>,
    pub country: Option<String>,
    pub pestle: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CategoryResponse {
    pub status: u8,
    pub data: Vec<Document>,
}

/// Up to ten records matching the highest-priority category given
pub async fn get_insights_by_categories(
    State(state): State<Arc<AppState>>,
    params: std::result::Result<Query<CategoryParams>, QueryRejection>,
) -> Result<Json<CategoryResponse>> {
    let Query(params) = params?;
    let (category, value) = queries::select_category(
        params.sector.as_deref(),
        params.topic.as_deref(),
        params.country.as_deref(),
        params.pestle.as_deref(),
    );
    let query = queries::insights_by_category(category, &value)?;
    let data = state.run(move |store| store.find(&query)).await?;

    Ok(Json(CategoryResponse { status: 1, data }))
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CountResponse {
    pub insights_count: u64,
    pub topics_count: u64,
    pub sectors_count: u64,
    pub published_count: u64,
}

/// Read `field` of the first document in a facet; empty facets count as zero
fn facet_value(row: &Document, facet: &str, field: &str) -> u64 {
    match row.get(facet) {
        Some(FieldValue::Array(items)) => items
            .first()
            .and_then(FieldValue::as_document)
            .and_then(|doc| doc.get(field))
            .and_then(FieldValue::as_i64)
            .and_then(|n| u64::try_from(n).ok())
            .unwrap_or(0),
        _ => 0,
    }
}

/// Total records plus distinct topic, sector and published counts
pub async fn get_count(State(state): State<Arc<AppState>>) -> Result<Json<CountResponse>> {
    let pipeline = queries::counts()?;
    let rows = state.run(move |store| store.aggregate(&pipeline)).await?;
    let row = rows.first().cloned().unwrap_or_default();

    Ok(Json(CountResponse {
        insights_count: facet_value(&row, "insights", "count"),
        topics_count: facet_value(&row, "topics", "total"),
        sectors_count: facet_value(&row, "sectors", "total"),
        published_count: facet_value(&row, "published", "total"),
    }))
}

/// Record count per distinct likelihood value
pub async fn insights_with_different_likelihood(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Document>>> {
    let pipeline = queries::insights_with_different_likelihood()?;
    let rows = state.run(move |store| store.aggregate(&pipeline)).await?;
    Ok(Json(rows))
}

/// The five countries with the most records
pub async fn top_countries_with_highest_number_of_insights(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Document>>> {
    let pipeline = queries::top_countries_by_insights(TOP_COUNTRIES)?;
    let rows = state.run(move |store| store.aggregate(&pipeline)).await?;
    Ok(Json(rows))
}
