use std::time::Duration;

use market_client::domain::{CapacityTable, Region};
use reqwest::StatusCode;
use time::{
    format_description::FormatItem, macros::format_description, Date, Month, OffsetDateTime, UtcOffset,
};
use time_tz::{timezones, Offset, OffsetDateTimeExt, TimeZone, Tz};

use super::parser::{self, ParseError};
use crate::config::{secret_from_env, EntsoeConfig};

const API_TS: &[FormatItem<'static>] = format_description!("[year][month][day][hour][minute]");

/// Installed generation capacity per production type.
const DOC_INSTALLED_CAPACITY: &str = "A68";
/// Year-ahead process.
const PROCESS_YEAR_AHEAD: &str = "A33";

#[derive(thiserror::Error, Debug)]
pub enum CapacityError {
    #[error("ENTSO-E rejected the security token")]
    Unauthorized,
    #[error("ENTSO-E request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("ENTSO-E returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("no matching data: {0}")]
    NoMatchingData(String),
    #[error("invalid capacity document: {0}")]
    Parse(ParseError),
    #[error("unknown time zone '{0}'")]
    UnknownTimeZone(String),
    #[error("invalid query window: {0}")]
    Window(#[from] time::error::ComponentRange),
    #[error("cannot format query timestamp: {0}")]
    Format(#[from] time::error::Format),
}

impl From<ParseError> for CapacityError {
    fn from(e: ParseError) -> Self {
        match e {
            ParseError::Acknowledgement(reason) => Self::NoMatchingData(reason),
            other => Self::Parse(other),
        }
    }
}

/// Reference capacity data for a region.
#[async_trait::async_trait]
pub trait CapacitySource: Send + Sync {
    async fn installed_capacity(&self, region: &Region) -> Result<CapacityTable, CapacityError>;
}

/// Client for the ENTSO-E Transparency Platform REST API.
pub struct EntsoeClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    time_zone: &'static Tz,
}

impl EntsoeClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        time_zone: &str,
        timeout: Duration,
    ) -> Result<Self, CapacityError> {
        let time_zone =
            timezones::get_by_name(time_zone).ok_or_else(|| CapacityError::UnknownTimeZone(time_zone.to_string()))?;
        let http = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            http,
            base_url: base_url.into(),
            api_key: api_key.into(),
            time_zone,
        })
    }

    pub fn from_config(cfg: &EntsoeConfig) -> anyhow::Result<Self> {
        let api_key = secret_from_env(&cfg.api_key_env)?;
        let client = Self::new(
            cfg.base_url.clone(),
            api_key,
            &cfg.time_zone,
            Duration::from_millis(cfg.request_timeout_ms),
        )?;
        Ok(client)
    }

    /// Installed capacity per production type for `area_code` in `[start, end)`.
    pub async fn query_installed_generation_capacity(
        &self,
        area_code: &str,
        start: OffsetDateTime,
        end: OffsetDateTime,
    ) -> Result<CapacityTable, CapacityError> {
        let period_start = api_timestamp(start)?;
        let period_end = api_timestamp(end)?;

        let resp = self
            .http
            .get(&self.base_url)
            .query(&[
                ("securityToken", self.api_key.as_str()),
                ("documentType", DOC_INSTALLED_CAPACITY),
                ("processType", PROCESS_YEAR_AHEAD),
                ("in_Domain", area_code),
                ("periodStart", period_start.as_str()),
                ("periodEnd", period_end.as_str()),
            ])
            .send()
            .await
            .map_err(|e| CapacityError::Http(e.without_url()))?;

        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(CapacityError::Unauthorized);
        }

        let body = resp.text().await.map_err(|e| CapacityError::Http(e.without_url()))?;
        if !status.is_success() {
            // The API reports empty query results as a 4xx acknowledgement document.
            return match parser::parse_generation_series(&body) {
                Err(ParseError::Acknowledgement(reason)) => Err(CapacityError::NoMatchingData(reason)),
                _ => Err(CapacityError::Status {
                    status: status.as_u16(),
                    body,
                }),
            };
        }

        let mut table = CapacityTable::new();
        for series in parser::parse_generation_series(&body)? {
            let column = series.name().to_string();
            for point in &series.points {
                table.insert(column.clone(), point.ts, point.mw);
            }
        }
        Ok(table)
    }
}

#[async_trait::async_trait]
impl CapacitySource for EntsoeClient {
    async fn installed_capacity(&self, region: &Region) -> Result<CapacityTable, CapacityError> {
        let (start, end) = year_to_date(OffsetDateTime::now_utc(), self.time_zone)?;

        match self.query_installed_generation_capacity(&region.code, start, end).await {
            Err(CapacityError::Unauthorized) => {
                tracing::warn!(
                    region = %region.code,
                    "ENTSO-E rejected the security token, continuing without capacity data"
                );
                metrics::counter!("capacity_fetch_unauthorized_total").increment(1);
                Ok(CapacityTable::default())
            }
            other => other,
        }
    }
}

/// January 1st 00:00 of the current year in `tz`, and `now` in `tz`.
pub fn year_to_date<Z: TimeZone>(
    now: OffsetDateTime,
    tz: &Z,
) -> Result<(OffsetDateTime, OffsetDateTime), CapacityError> {
    let local_now = now.to_timezone(tz);
    let new_year = Date::from_calendar_date(local_now.year(), Month::January, 1)?.midnight();
    // No European zone switches DST around new year, so the offset at UTC midnight holds.
    let offset = tz.get_offset_utc(&new_year.assume_utc()).to_utc();
    Ok((new_year.assume_offset(offset), local_now))
}

/// `yyyyMMddHHmm` in UTC as the API expects.
pub fn api_timestamp(ts: OffsetDateTime) -> Result<String, CapacityError> {
    Ok(ts.to_offset(UtcOffset::UTC).format(API_TS)?)
}
