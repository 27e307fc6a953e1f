//! Google Trends connector.
//!
//! Owns the provider's wire quirks: the `)]}'` anti-JSON prefix on every
//! API body, the explore → widget-token → widget-data request sequence,
//! epoch-second timestamps, and the `geo`/`hl`/`tz` parameters. No retries
//! here; failures surface raw to the retry envelope.

use crate::types::{ByCountryPoint, Country, SeriesPoint};
use crate::upstream::{epoch_to_date, TrendsProvider, UpstreamError};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://trends.google.com/trends/api";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Range used for the worldwide country comparison; the widget answers for
/// all supported countries in one query.
const BY_COUNTRY_RANGE: &str = "today 12-m";

// Served-browser UA: the API answers consent pages to unknown clients.
const USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64; rv:128.0) Gecko/20100101 Firefox/128.0";

#[derive(Debug, Clone)]
pub struct GoogleTrendsClient {
    http: reqwest::Client,
    base_url: String,
    hl: String,
    tz: i32,
}

impl GoogleTrendsClient {
    pub fn new() -> Result<Self, UpstreamError> {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    /// Point the client at a different endpoint root (tests, proxies).
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self, UpstreamError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self { http, base_url: base_url.into(), hl: "en-US".to_string(), tz: 0 })
    }

    async fn get_text(
        &self,
        endpoint: &'static str,
        query: &[(&str, String)],
    ) -> Result<String, UpstreamError> {
        let url = format!("{}/{}", self.base_url, endpoint);
        let response = self.http.get(&url).query(query).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(UpstreamError::Status { status: status.as_u16(), endpoint });
        }
        Ok(response.text().await?)
    }

    /// First leg of every query: resolve the widget tokens for a keyword.
    async fn explore(
        &self,
        keyword: &str,
        geo: &str,
        time: &str,
    ) -> Result<Vec<Widget>, UpstreamError> {
        let req = serde_json::json!({
            "comparisonItem": [{ "keyword": keyword, "geo": geo, "time": time }],
            "category": 0,
            "property": "",
        });
        let body = self
            .get_text(
                "explore",
                &[
                    ("hl", self.hl.clone()),
                    ("tz", self.tz.to_string()),
                    ("req", req.to_string()),
                ],
            )
            .await?;
        let explore: ExploreResponse = parse_api_body(&body)?;
        Ok(explore.widgets)
    }

    async fn widget_data(
        &self,
        endpoint: &'static str,
        widget: &Widget,
    ) -> Result<String, UpstreamError> {
        self.get_text(
            endpoint,
            &[
                ("hl", self.hl.clone()),
                ("tz", self.tz.to_string()),
                ("req", widget.request.to_string()),
                ("token", widget.token.clone()),
            ],
        )
        .await
    }
}

#[async_trait]
impl TrendsProvider for GoogleTrendsClient {
    async fn fetch_series(
        &self,
        keyword: &str,
        country: Country,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<SeriesPoint>, UpstreamError> {
        let time = format!("{} {}", start.format("%Y-%m-%d"), end.format("%Y-%m-%d"));
        let widgets = self.explore(keyword, country.as_str(), &time).await?;
        let widget = find_widget(&widgets, "TIMESERIES")?;
        let body = self.widget_data("widgetdata/multiline", widget).await?;
        parse_series_payload(&body)
    }

    async fn fetch_by_country(
        &self,
        keyword: &str,
    ) -> Result<Vec<ByCountryPoint>, UpstreamError> {
        let widgets = self.explore(keyword, "", BY_COUNTRY_RANGE).await?;
        let widget = find_widget(&widgets, "GEO_MAP")?;
        let body = self.widget_data("widgetdata/comparedgeo", widget).await?;
        parse_geo_payload(&body)
    }
}

#[derive(Debug, Deserialize)]
struct ExploreResponse {
    #[serde(default)]
    widgets: Vec<Widget>,
}

#[derive(Debug, Deserialize)]
struct Widget {
    id: String,
    token: String,
    request: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct MultilineResponse {
    default: MultilineData,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MultilineData {
    #[serde(default)]
    timeline_data: Vec<TimelinePoint>,
}

#[derive(Debug, Deserialize)]
struct TimelinePoint {
    time: String,
    #[serde(default)]
    value: Vec<u32>,
}

#[derive(Debug, Deserialize)]
struct GeoResponse {
    default: GeoData,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeoData {
    #[serde(default)]
    geo_map_data: Vec<GeoPoint>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeoPoint {
    geo_code: String,
    #[serde(default)]
    value: Vec<u32>,
}

fn find_widget<'a>(widgets: &'a [Widget], kind: &'static str) -> Result<&'a Widget, UpstreamError> {
    widgets
        .iter()
        .find(|widget| widget.id == kind)
        .ok_or(UpstreamError::MissingWidget { kind })
}

/// Every trends API body opens with a `)]}'`-style garbage line before the
/// JSON document.
fn strip_antijson_prefix(body: &str) -> &str {
    match body.find(['{', '[']) {
        Some(start) => &body[start..],
        None => body,
    }
}

fn parse_api_body<T: DeserializeOwned>(body: &str) -> Result<T, UpstreamError> {
    serde_json::from_str(strip_antijson_prefix(body))
        .map_err(|_| UpstreamError::invalid_payload(body))
}

/// Multiline widget payload → ascending, de-duplicated calendar series.
fn parse_series_payload(body: &str) -> Result<Vec<SeriesPoint>, UpstreamError> {
    let parsed: MultilineResponse = parse_api_body(body)?;
    if parsed.default.timeline_data.is_empty() {
        return Err(UpstreamError::NoData);
    }

    let mut by_date: BTreeMap<NaiveDate, u32> = BTreeMap::new();
    for point in &parsed.default.timeline_data {
        let epoch: i64 = point
            .time
            .parse()
            .map_err(|_| UpstreamError::invalid_payload(&point.time))?;
        let date =
            epoch_to_date(epoch).ok_or_else(|| UpstreamError::invalid_payload(&point.time))?;
        let value = point.value.first().copied().unwrap_or(0).min(100);
        by_date.insert(date, value);
    }

    Ok(by_date.into_iter().map(|(date, value)| SeriesPoint { date, value }).collect())
}

/// Comparedgeo widget payload → the three supported countries, zero-filled,
/// sorted descending by value with ties broken by country code.
fn parse_geo_payload(body: &str) -> Result<Vec<ByCountryPoint>, UpstreamError> {
    let parsed: GeoResponse = parse_api_body(body)?;

    let mut points: Vec<ByCountryPoint> = Country::ALL
        .iter()
        .map(|&country| {
            let value = parsed
                .default
                .geo_map_data
                .iter()
                .find(|geo| geo.geo_code == country.as_str())
                .and_then(|geo| geo.value.first().copied())
                .unwrap_or(0)
                .min(100);
            ByCountryPoint { country, value }
        })
        .collect();

    points.sort_by(|a, b| {
        b.value.cmp(&a.value).then_with(|| a.country.as_str().cmp(b.country.as_str()))
    });
    Ok(points)
}
