//! Query parameters and response payload types.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Keyword length bounds (after trimming).
pub const KEYWORD_MIN_CHARS: usize = 2;
pub const KEYWORD_MAX_CHARS: usize = 60;

/// Baseline bounds, and the cap on the total requested range in days.
pub const BASELINE_MIN_DAYS: u32 = 30;
pub const MAX_RANGE_DAYS: u32 = 1825;

/// One of the three markets the service compares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Country {
    MX,
    CR,
    ES,
}

impl Country {
    /// All supported countries, in canonical (code) order.
    pub const ALL: [Country; 3] = [Country::CR, Country::ES, Country::MX];

    pub fn as_str(&self) -> &'static str {
        match self {
            Country::MX => "MX",
            Country::CR => "CR",
            Country::ES => "ES",
        }
    }

    pub fn parse(code: &str) -> Result<Self, ValidationError> {
        match code.trim().to_ascii_uppercase().as_str() {
            "MX" => Ok(Country::MX),
            "CR" => Ok(Country::CR),
            "ES" => Ok(Country::ES),
            other => Err(ValidationError::UnsupportedCountry(other.to_string())),
        }
    }
}

impl std::fmt::Display for Country {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Allowed query windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WindowDays {
    Week,
    Month,
    Quarter,
    Year,
}

impl WindowDays {
    pub fn days(&self) -> u32 {
        match self {
            WindowDays::Week => 7,
            WindowDays::Month => 30,
            WindowDays::Quarter => 90,
            WindowDays::Year => 365,
        }
    }
}

impl TryFrom<u32> for WindowDays {
    type Error = ValidationError;

    fn try_from(days: u32) -> Result<Self, Self::Error> {
        match days {
            7 => Ok(WindowDays::Week),
            30 => Ok(WindowDays::Month),
            90 => Ok(WindowDays::Quarter),
            365 => Ok(WindowDays::Year),
            other => Err(ValidationError::UnsupportedWindow(other)),
        }
    }
}

/// Rejections produced while constructing [`QueryParams`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("keyword must be {KEYWORD_MIN_CHARS}-{KEYWORD_MAX_CHARS} characters, got {0}")]
    KeywordLength(usize),
    #[error("unsupported country {0:?}, expected one of MX, CR, ES")]
    UnsupportedCountry(String),
    #[error("unsupported window of {0} days, expected 7, 30, 90 or 365")]
    UnsupportedWindow(u32),
    #[error("baseline must be at least {BASELINE_MIN_DAYS} days, got {0}")]
    BaselineTooShort(u32),
    #[error("baseline ({baseline} days) must cover the window ({window} days)")]
    BaselineShorterThanWindow { window: u32, baseline: u32 },
    #[error("window plus baseline must not exceed {MAX_RANGE_DAYS} days, got {0}")]
    RangeTooLong(u32),
}

/// A validated trend query.
///
/// Construction is the validation boundary: a `QueryParams` in hand is known
/// to satisfy every parameter constraint. The keyword keeps its original
/// casing for display; [`QueryParams::keyword_key`] is the lowercased form
/// used for cache fingerprints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryParams {
    keyword: String,
    country: Country,
    window: WindowDays,
    baseline_days: u32,
}

impl QueryParams {
    pub fn new(
        keyword: &str,
        country: Country,
        window_days: u32,
        baseline_days: u32,
    ) -> Result<Self, ValidationError> {
        let keyword = keyword.trim().to_string();
        let chars = keyword.chars().count();
        if !(KEYWORD_MIN_CHARS..=KEYWORD_MAX_CHARS).contains(&chars) {
            return Err(ValidationError::KeywordLength(chars));
        }

        let window = WindowDays::try_from(window_days)?;
        if baseline_days < BASELINE_MIN_DAYS {
            return Err(ValidationError::BaselineTooShort(baseline_days));
        }
        if baseline_days < window_days {
            return Err(ValidationError::BaselineShorterThanWindow {
                window: window_days,
                baseline: baseline_days,
            });
        }
        let total = window_days + baseline_days;
        if total > MAX_RANGE_DAYS {
            return Err(ValidationError::RangeTooLong(total));
        }

        Ok(Self { keyword, country, window, baseline_days })
    }

    pub fn keyword(&self) -> &str {
        &self.keyword
    }

    /// Lowercased keyword, used for cache keying.
    pub fn keyword_key(&self) -> String {
        self.keyword.to_lowercase()
    }

    pub fn country(&self) -> Country {
        self.country
    }

    pub fn window_days(&self) -> u32 {
        self.window.days()
    }

    pub fn baseline_days(&self) -> u32 {
        self.baseline_days
    }

    /// Total span of the requested series in days.
    pub fn range_days(&self) -> u32 {
        self.window.days() + self.baseline_days
    }
}

/// One datum of the interest-over-time series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub date: NaiveDate,
    pub value: u32,
}

/// One datum of the cross-country comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ByCountryPoint {
    pub country: Country,
    pub value: u32,
}

/// The three scored signals.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Signals {
    pub growth_7_vs_30: f64,
    pub slope_14d: f64,
    pub recent_peak_30d: f64,
}

/// Cache metadata attached to every response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheInfo {
    pub hit: bool,
    pub ttl_seconds: i64,
}

/// The full query response, as returned to the HTTP layer and as cached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendResponse {
    pub keyword: String,
    pub country: Country,
    pub window_days: u32,
    pub baseline_days: u32,
    pub generated_at: DateTime<Utc>,
    pub sources_used: Vec<String>,
    pub trend_score: f64,
    pub signals: Signals,
    pub series: Vec<SeriesPoint>,
    pub by_country: Vec<ByCountryPoint>,
    pub explain: Vec<String>,
    pub cache: CacheInfo,
    pub request_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age_seconds: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cached_at: Option<DateTime<Utc>>,
}
