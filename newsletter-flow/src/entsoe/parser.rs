//! Parser for ENTSO-E `GL_MarketDocument` time series.
//!
//! Both the pushed generation forecasts and the installed capacity answers
//! of the REST API use this document layout:
//!
//! ```text
//! GL_MarketDocument
//!   TimeSeries*
//!     curveType
//!     MktPSRType/psrType
//!     Period*
//!       timeInterval/{start,end}
//!       resolution
//!       Point*/{position,quantity}
//! ```
//!
//! An `Acknowledgement_MarketDocument` (the API's "no data" answer) is
//! reported as [`ParseError::Acknowledgement`] carrying the reason text.

use market_client::domain::{GenerationPoint, GenerationSeries};
use quick_xml::{events::Event, Reader};
use time::{
    format_description::{well_known::Rfc3339, FormatItem},
    macros::format_description,
    Duration, Month, OffsetDateTime, PrimitiveDateTime,
};

const MINUTE_TS: &[FormatItem<'static>] = format_description!("[year]-[month]-[day]T[hour]:[minute]Z");

#[derive(thiserror::Error, Debug)]
pub enum ParseError {
    #[error("malformed xml: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("acknowledgement: {0}")]
    Acknowledgement(String),
    #[error("invalid {field} '{value}'")]
    InvalidValue { field: &'static str, value: String },
    #[error("period is missing {0}")]
    Missing(&'static str),
}

/// Sampling resolution of a period, e.g. `PT15M` or `P1Y`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Minutes(i64),
    Day,
    Week,
    Month,
    Year,
}

impl Resolution {
    pub fn parse(s: &str) -> Result<Self, ParseError> {
        let invalid = || ParseError::InvalidValue {
            field: "resolution",
            value: s.to_string(),
        };
        match s {
            "P1D" => Ok(Self::Day),
            "P7D" => Ok(Self::Week),
            "P1M" => Ok(Self::Month),
            "P1Y" => Ok(Self::Year),
            _ => {
                let minutes = s
                    .strip_prefix("PT")
                    .and_then(|rest| rest.strip_suffix('M'))
                    .and_then(|m| m.parse::<i64>().ok())
                    .filter(|m| *m > 0)
                    .ok_or_else(invalid)?;
                Ok(Self::Minutes(minutes))
            }
        }
    }

    /// Timestamp of the slot `steps` resolutions after `start`.
    pub fn step(&self, start: OffsetDateTime, steps: i64) -> Result<OffsetDateTime, ParseError> {
        let overflow = || ParseError::InvalidValue {
            field: "position",
            value: steps.to_string(),
        };
        let by_seconds = |unit: i64| {
            steps
                .checked_mul(unit)
                .and_then(|secs| start.checked_add(Duration::seconds(secs)))
                .ok_or_else(overflow)
        };
        match self {
            Self::Minutes(m) => by_seconds(m.checked_mul(60).ok_or_else(overflow)?),
            Self::Day => by_seconds(86_400),
            Self::Week => by_seconds(604_800),
            Self::Month => {
                let total = steps
                    .checked_add(i64::from(u8::from(start.month())) - 1)
                    .ok_or_else(overflow)?;
                let year = i64::from(start.year())
                    .checked_add(total.div_euclid(12))
                    .and_then(|y| i32::try_from(y).ok())
                    .ok_or_else(overflow)?;
                let month = Month::try_from((total.rem_euclid(12) + 1) as u8).map_err(|_| overflow())?;
                start
                    .replace_year(year)
                    .and_then(|t| t.replace_month(month))
                    .map_err(|_| overflow())
            }
            Self::Year => {
                let year = i64::from(start.year())
                    .checked_add(steps)
                    .and_then(|y| i32::try_from(y).ok())
                    .ok_or_else(overflow)?;
                start.replace_year(year).map_err(|_| overflow())
            }
        }
    }

    /// Timestamp of the 1-based `position` of a period starting at `start`.
    pub fn at_position(&self, start: OffsetDateTime, position: i64) -> Result<OffsetDateTime, ParseError> {
        let steps = position.checked_sub(1).ok_or_else(|| ParseError::InvalidValue {
            field: "position",
            value: position.to_string(),
        })?;
        self.step(start, steps)
    }
}

/// Parses an ENTSO-E timestamp (`2024-03-01T00:00Z`, seconds optional).
pub fn parse_timestamp(s: &str) -> Result<OffsetDateTime, ParseError> {
    let s = s.trim();
    if let Ok(ts) = OffsetDateTime::parse(s, &Rfc3339) {
        return Ok(ts);
    }
    PrimitiveDateTime::parse(s, MINUTE_TS)
        .map(PrimitiveDateTime::assume_utc)
        .map_err(|_| ParseError::InvalidValue {
            field: "timestamp",
            value: s.to_string(),
        })
}

#[derive(Default)]
struct RawPeriod {
    start: Option<String>,
    end: Option<String>,
    resolution: Option<String>,
    points: Vec<(i64, f64)>,
    position: Option<i64>,
    quantity: Option<f64>,
}

#[derive(Default)]
struct RawSeries {
    psr_type: String,
    curve_type: Option<String>,
    periods: Vec<RawPeriod>,
}

/// Parses every time series of a market document. Series with the same
/// production type are merged; points come back sorted by timestamp.
pub fn parse_generation_series(xml: &str) -> Result<Vec<GenerationSeries>, ParseError> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);
    // Event payloads are cut out of an envelope and still carry its closing tags.
    reader.check_end_names(false);

    let mut stack: Vec<String> = Vec::new();
    let mut root: Option<String> = None;
    let mut reason: Option<String> = None;
    let mut series: Vec<RawSeries> = Vec::new();

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                if root.is_none() {
                    root = Some(name.clone());
                }
                match name.as_str() {
                    "TimeSeries" => series.push(RawSeries::default()),
                    "Period" => {
                        if let Some(s) = series.last_mut() {
                            s.periods.push(RawPeriod::default());
                        }
                    }
                    "Point" => {
                        if let Some(p) = current_period(&mut series) {
                            p.position = None;
                            p.quantity = None;
                        }
                    }
                    _ => {}
                }
                stack.push(name);
            }
            Event::End(e) => {
                if e.local_name().as_ref() == b"Point" {
                    if let Some(p) = current_period(&mut series) {
                        if let (Some(pos), Some(qty)) = (p.position.take(), p.quantity.take()) {
                            p.points.push((pos, qty));
                        }
                    }
                }
                stack.pop();
                if stack.is_empty() && root.is_some() {
                    break;
                }
            }
            Event::Text(t) => {
                let text = t.unescape()?.into_owned();
                let n = stack.len();
                let (parent, name) = match n {
                    0 => continue,
                    1 => ("", stack[0].as_str()),
                    _ => (stack[n - 2].as_str(), stack[n - 1].as_str()),
                };
                let in_period = stack.iter().any(|s| s == "Period");
                match (parent, name) {
                    ("MktPSRType", "psrType") => {
                        if let Some(s) = series.last_mut() {
                            s.psr_type = text;
                        }
                    }
                    ("TimeSeries", "curveType") => {
                        if let Some(s) = series.last_mut() {
                            s.curve_type = Some(text);
                        }
                    }
                    ("timeInterval", "start") if in_period => {
                        if let Some(p) = current_period(&mut series) {
                            p.start = Some(text);
                        }
                    }
                    ("timeInterval", "end") if in_period => {
                        if let Some(p) = current_period(&mut series) {
                            p.end = Some(text);
                        }
                    }
                    ("Period", "resolution") => {
                        if let Some(p) = current_period(&mut series) {
                            p.resolution = Some(text);
                        }
                    }
                    ("Point", "position") => {
                        let pos = text.parse().map_err(|_| ParseError::InvalidValue {
                            field: "position",
                            value: text.clone(),
                        })?;
                        if let Some(p) = current_period(&mut series) {
                            p.position = Some(pos);
                        }
                    }
                    ("Point", "quantity") => {
                        let qty = text.parse().map_err(|_| ParseError::InvalidValue {
                            field: "quantity",
                            value: text.clone(),
                        })?;
                        if let Some(p) = current_period(&mut series) {
                            p.quantity = Some(qty);
                        }
                    }
                    ("Reason", "text") => reason = Some(text),
                    _ => {}
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if root.as_deref() == Some("Acknowledgement_MarketDocument") {
        return Err(ParseError::Acknowledgement(
            reason.unwrap_or_else(|| "no reason given".to_string()),
        ));
    }

    let mut merged: Vec<GenerationSeries> = Vec::new();
    for raw in series {
        let points = series_points(&raw)?;
        match merged.iter_mut().find(|s| s.psr_type == raw.psr_type) {
            Some(existing) => existing.points.extend(points),
            None => merged.push(GenerationSeries {
                psr_type: raw.psr_type,
                points,
            }),
        }
    }
    for s in &mut merged {
        // Stable sort, so for duplicate timestamps the later point wins after dedup.
        s.points.sort_by_key(|p| p.ts);
        s.points.reverse();
        s.points.dedup_by_key(|p| p.ts);
        s.points.reverse();
    }

    Ok(merged)
}

fn current_period(series: &mut [RawSeries]) -> Option<&mut RawPeriod> {
    series.last_mut().and_then(|s| s.periods.last_mut())
}

fn series_points(raw: &RawSeries) -> Result<Vec<GenerationPoint>, ParseError> {
    let forward_fill = raw.curve_type.as_deref() == Some("A03");
    let mut out = Vec::new();

    for period in &raw.periods {
        let start = parse_timestamp(period.start.as_deref().ok_or(ParseError::Missing("timeInterval/start"))?)?;
        let resolution = Resolution::parse(period.resolution.as_deref().ok_or(ParseError::Missing("resolution"))?)?;

        let mut points = period.points.clone();
        points.sort_by_key(|(pos, _)| *pos);

        let slots = match (forward_fill, resolution, period.end.as_deref()) {
            (true, Resolution::Minutes(m), Some(end)) => Some((parse_timestamp(end)? - start).whole_minutes() / m),
            _ => None,
        };

        match slots {
            // A03 curves only list positions where the value changes.
            Some(slots) => {
                let mut iter = points.iter().peekable();
                let mut current: Option<f64> = None;
                for pos in 1..=slots {
                    while let Some((_, qty)) = iter.next_if(|(p, _)| *p <= pos) {
                        current = Some(*qty);
                    }
                    if let Some(mw) = current {
                        out.push(GenerationPoint {
                            ts: resolution.at_position(start, pos)?,
                            mw,
                        });
                    }
                }
            }
            None => {
                for (pos, mw) in points {
                    out.push(GenerationPoint {
                        ts: resolution.at_position(start, pos)?,
                        mw,
                    });
                }
            }
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    const FORECAST: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<GL_MarketDocument xmlns="urn:iec62325.351:tc57wg16:451-6:generationloaddocument:3:0">
  <mRID>5a1b</mRID>
  <type>A69</type>
  <time_Period.timeInterval><start>2024-03-01T00:00Z</start><end>2024-03-01T01:00Z</end></time_Period.timeInterval>
  <TimeSeries>
    <mRID>1</mRID>
    <inBiddingZone_Domain.mRID codingScheme="A01">10YDE-VE-------2</inBiddingZone_Domain.mRID>
    <curveType>A01</curveType>
    <MktPSRType><psrType>B18</psrType></MktPSRType>
    <Period>
      <timeInterval><start>2024-03-01T00:00Z</start><end>2024-03-01T01:00Z</end></timeInterval>
      <resolution>PT15M</resolution>
      <Point><position>1</position><quantity>1200</quantity></Point>
      <Point><position>2</position><quantity>1210</quantity></Point>
      <Point><position>3</position><quantity>1220</quantity></Point>
      <Point><position>4</position><quantity>1230</quantity></Point>
    </Period>
  </TimeSeries>
  <TimeSeries>
    <mRID>2</mRID>
    <curveType>A01</curveType>
    <MktPSRType><psrType>B19</psrType></MktPSRType>
    <Period>
      <timeInterval><start>2024-03-01T00:00Z</start><end>2024-03-01T01:00Z</end></timeInterval>
      <resolution>PT60M</resolution>
      <Point><position>1</position><quantity>15000</quantity></Point>
    </Period>
  </TimeSeries>
</GL_MarketDocument></msg:Payload></msg:Message>"#;

    #[test]
    fn parses_series_per_production_type() {
        let series = parse_generation_series(FORECAST).unwrap();

        assert_eq!(series.len(), 2);
        assert_eq!(series[0].name(), "Wind Offshore");
        assert_eq!(series[0].points.len(), 4);
        assert_eq!(series[0].points[1].ts, datetime!(2024-03-01 00:15:00 UTC));
        assert_eq!(series[0].points[3].mw, 1230.0);
        assert_eq!(series[1].name(), "Wind Onshore");
        assert_eq!(series[1].points[0].mw, 15000.0);
    }

    #[test]
    fn a03_curve_forward_fills_omitted_positions() {
        let xml = r#"<GL_MarketDocument><TimeSeries>
            <curveType>A03</curveType>
            <MktPSRType><psrType>B16</psrType></MktPSRType>
            <Period>
              <timeInterval><start>2024-03-01T00:00Z</start><end>2024-03-01T01:00Z</end></timeInterval>
              <resolution>PT15M</resolution>
              <Point><position>1</position><quantity>10</quantity></Point>
              <Point><position>3</position><quantity>30</quantity></Point>
            </Period>
        </TimeSeries></GL_MarketDocument>"#;

        let series = parse_generation_series(xml).unwrap();
        let mw: Vec<f64> = series[0].points.iter().map(|p| p.mw).collect();
        assert_eq!(mw, vec![10.0, 10.0, 30.0, 30.0]);
    }

    #[test]
    fn acknowledgement_is_reported_with_reason() {
        let xml = r#"<Acknowledgement_MarketDocument xmlns="urn:iec62325.351:tc57wg16:451-1:acknowledgementdocument:7:0">
            <mRID>1</mRID>
            <Reason><code>999</code><text>No matching data found for Data item Installed Generation Capacity Aggregated</text></Reason>
        </Acknowledgement_MarketDocument>"#;

        match parse_generation_series(xml) {
            Err(ParseError::Acknowledgement(reason)) => assert!(reason.starts_with("No matching data")),
            other => panic!("expected acknowledgement, got {other:?}"),
        }
    }

    #[test]
    fn bad_quantity_is_rejected() {
        let xml = FORECAST.replace("<quantity>1210</quantity>", "<quantity>n/a</quantity>");
        assert!(matches!(
            parse_generation_series(&xml),
            Err(ParseError::InvalidValue { field: "quantity", .. })
        ));
    }

    #[test]
    fn out_of_range_position_is_rejected() {
        let xml = FORECAST.replace("<position>2</position>", "<position>1000000000000000000</position>");
        assert!(matches!(
            parse_generation_series(&xml),
            Err(ParseError::InvalidValue { field: "position", .. })
        ));

        let start = datetime!(2024-03-01 00:00:00 UTC);
        for res in [Resolution::Minutes(15), Resolution::Day, Resolution::Week, Resolution::Month, Resolution::Year] {
            assert!(res.step(start, i64::MAX).is_err());
            assert!(res.at_position(start, i64::MIN).is_err());
        }
    }

    #[test]
    fn yearly_and_monthly_steps() {
        let start = datetime!(2023-12-31 23:00:00 UTC);
        assert_eq!(Resolution::Year.step(start, 1).unwrap(), datetime!(2024-12-31 23:00:00 UTC));
        assert_eq!(
            Resolution::Month.step(datetime!(2024-11-01 00:00:00 UTC), 3).unwrap(),
            datetime!(2025-02-01 00:00:00 UTC)
        );
        assert_eq!(Resolution::parse("PT30M").unwrap(), Resolution::Minutes(30));
        assert!(Resolution::parse("PT0M").is_err());
        assert!(Resolution::parse("hourly").is_err());
    }

    #[test]
    fn timestamps_with_and_without_seconds() {
        assert_eq!(parse_timestamp("2024-03-01T00:00Z").unwrap(), datetime!(2024-03-01 00:00:00 UTC));
        assert_eq!(parse_timestamp("2024-03-01T00:00:00Z").unwrap(), datetime!(2024-03-01 00:00:00 UTC));
        assert!(parse_timestamp("01.03.2024").is_err());
    }
}
