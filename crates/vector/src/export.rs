//! Flat tabular view of recommendation results

use serde::Serialize;
use skillmatch_common::Result;
use std::io::Write;

use crate::types::Recommendation;

/// Column order of exported results
pub const RESULT_COLUMNS: [&str; 7] = [
    "Rank",
    "Title",
    "Offered_by",
    "Domain",
    "Duration",
    "Price",
    "Similarity_Score",
];

/// One exported result; field order matches [`RESULT_COLUMNS`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultRow {
    /// 1-based position
    #[serde(rename = "Rank")]
    pub rank: usize,
    #[serde(rename = "Title")]
    pub title: String,
    #[serde(rename = "Offered_by")]
    pub offered_by: String,
    #[serde(rename = "Domain")]
    pub domain: String,
    #[serde(rename = "Duration")]
    pub duration: String,
    /// Empty when unknown
    #[serde(rename = "Price")]
    pub price: Option<f64>,
    #[serde(rename = "Similarity_Score")]
    pub similarity_score: f32,
}

/// Rows in result order
pub fn to_rows(results: &[Recommendation]) -> Vec<ResultRow> {
    results
        .iter()
        .enumerate()
        .map(|(i, r)| ResultRow {
            rank: i + 1,
            title: r.item.title.clone(),
            offered_by: r.item.offered_by.clone(),
            domain: r.item.domain.clone(),
            duration: r.item.duration.clone(),
            price: r.item.price.amount(),
            similarity_score: r.score,
        })
        .collect()
}

/// Write results as CSV with a header row
pub fn write_csv<W: Write>(writer: W, results: &[Recommendation]) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    if results.is_empty() {
        csv_writer.write_record(RESULT_COLUMNS).map_err(std::io::Error::from)?;
    }
    for row in to_rows(results) {
        csv_writer.serialize(row).map_err(std::io::Error::from)?;
    }
    csv_writer.flush()?;
    Ok(())
}

/// Aggregate figures over one result set
#[derive(Debug, Clone, PartialEq)]
pub struct ResultSummary {
    pub count: usize,

    /// Mean over results with a known price
    pub average_price: Option<f64>,

    pub best_score: Option<f32>,
}

pub fn summarize(results: &[Recommendation]) -> ResultSummary {
    let prices: Vec<f64> = results.iter().filter_map(|r| r.item.price.amount()).collect();
    let average_price = (!prices.is_empty()).then(|| prices.iter().sum::<f64>() / prices.len() as f64);
    let best_score = results.iter().map(|r| r.score).reduce(f32::max);

    ResultSummary {
        count: results.len(),
        average_price,
        best_score,
    }
}
