use std::fmt::Write as _;

use market_client::domain::{CapacityTable, GenerationSeries};
use time::{format_description::FormatItem, macros::format_description, OffsetDateTime};

use crate::{
    config::TransformConfig,
    entsoe::{parse_generation_series, ParseError},
};

const ROW_TS: &[FormatItem<'static>] = format_description!("[year]-[month]-[day] [hour]:[minute] UTC");
const BAR_WIDTH: usize = 100;

#[derive(thiserror::Error, Debug)]
pub enum TransformError {
    #[error("unparsable forecast payload: {0}")]
    Parse(#[from] ParseError),
    #[error("payload contains no generation series")]
    NoSeries,
    #[error("series '{0}' has no points left after filtering")]
    NoPoints(String),
    #[error("cannot format timestamp: {0}")]
    Format(#[from] time::error::Format),
    #[error("cannot render table: {0}")]
    Render(#[from] std::fmt::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformOptions {
    /// Generation category to report, e.g. `Wind Offshore`.
    pub category: String,
    /// Keep only full-hour points.
    pub hourly_only: bool,
}

impl From<&TransformConfig> for TransformOptions {
    fn from(cfg: &TransformConfig) -> Self {
        Self {
            category: cfg.category.clone(),
            hourly_only: cfg.hourly_only,
        }
    }
}

impl Default for TransformOptions {
    fn default() -> Self {
        Self::from(&TransformConfig::default())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SummaryRow {
    pub ts: OffsetDateTime,
    pub forecast_mw: f64,
    pub installed_mw: Option<f64>,
    /// `trunc(forecast / installed * 100)`; None without capacity data.
    pub utilisation_pct: Option<i64>,
}

/// Display-ready summary of one event: one per flow run.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformedResult {
    pub title: String,
    /// `<br>` separated text bar chart.
    pub chart: String,
    pub table: Vec<SummaryRow>,
}

impl TransformedResult {
    /// Renders the table with timestamps as row headers.
    pub fn table_html(&self) -> Result<String, TransformError> {
        let mut out = String::from(
            "<table border=\"1\" class=\"dataframe\">\n  <thead>\n    <tr style=\"text-align: right;\">\n      \
             <th></th>\n      <th>forecast</th>\n      <th>installed</th>\n    </tr>\n  </thead>\n  <tbody>\n",
        );
        for row in &self.table {
            let installed = row
                .installed_mw
                .map(|mw| mw.to_string())
                .unwrap_or_else(|| "n/a".to_string());
            write!(
                out,
                "    <tr>\n      <th>{}</th>\n      <td>{}</td>\n      <td>{}</td>\n    </tr>\n",
                row.ts.format(ROW_TS)?,
                row.forecast_mw,
                installed
            )?;
        }
        out.push_str("  </tbody>\n</table>");
        Ok(out)
    }
}

/// Merges the forecast carried by `payload` with the installed capacity
/// reference into a [`TransformedResult`].
///
/// The series matching `opts.category` is used; when the document has no
/// such series the first one is used instead. Installed capacity is the
/// first value of the same category in `capacity`.
pub fn transform(
    payload: &str,
    capacity: &CapacityTable,
    opts: &TransformOptions,
) -> Result<TransformedResult, TransformError> {
    let series = parse_generation_series(payload)?;
    let selected = select_series(&series, &opts.category)?;
    let name = selected.name().to_string();
    let label = if name.is_empty() { opts.category.as_str() } else { name.as_str() };

    let installed = capacity.first_value(&name);
    if installed.is_none() {
        tracing::warn!(category = label, "no installed capacity reference, utilisation left blank");
    }

    let table: Vec<SummaryRow> = selected
        .points
        .iter()
        .filter(|p| !opts.hourly_only || (p.ts.minute() == 0 && p.ts.second() == 0))
        .map(|p| SummaryRow {
            ts: p.ts,
            forecast_mw: p.mw,
            installed_mw: installed,
            utilisation_pct: installed
                .filter(|i| *i > 0.0)
                .map(|i| (p.mw / i * 100.0) as i64),
        })
        .collect();

    if table.is_empty() {
        return Err(TransformError::NoPoints(label.to_string()));
    }

    let chart = table
        .iter()
        .map(chart_line)
        .collect::<Result<Vec<_>, _>>()?
        .join("<br>");

    Ok(TransformedResult {
        title: format!("Intraday Generation Forecasts {label}"),
        chart,
        table,
    })
}

fn select_series<'a>(series: &'a [GenerationSeries], category: &str) -> Result<&'a GenerationSeries, TransformError> {
    if let Some(s) = series.iter().find(|s| s.name() == category) {
        return Ok(s);
    }
    let first = series.first().ok_or(TransformError::NoSeries)?;
    tracing::warn!(
        requested = category,
        using = first.name(),
        "requested category not in payload, falling back to first series"
    );
    Ok(first)
}

fn chart_line(row: &SummaryRow) -> Result<String, TransformError> {
    let ts = row.ts.format(ROW_TS)?;
    let line = match (row.installed_mw, row.utilisation_pct) {
        (Some(installed), Some(pct)) => {
            let filled = pct.clamp(0, BAR_WIDTH as i64) as usize;
            format!(
                "{ts} | {}{}  => {pct}% ({}MW/{}MW)",
                "#".repeat(filled),
                "_".repeat(BAR_WIDTH - filled),
                row.forecast_mw,
                installed
            )
        }
        (Some(installed), None) => format!(
            "{ts} | {}  => n/a ({}MW/{}MW)",
            "_".repeat(BAR_WIDTH),
            row.forecast_mw,
            installed
        ),
        (None, _) => format!("{ts} | {}  => n/a ({}MW/n/a)", "_".repeat(BAR_WIDTH), row.forecast_mw),
    };
    Ok(line)
}
