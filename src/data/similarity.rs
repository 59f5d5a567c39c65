//! CSV codecs for the similarity service: seed rows out, candidate rows in.

use serde::{Deserialize, Serialize};

use crate::detection::{SeedRow, SimilarityResult};
use crate::error::DataError;

#[derive(Serialize)]
struct SeedRecord<'a> {
    label: &'a str,
    x: f32,
    y: f32,
    score: f32,
    selected: u8,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct ResultRecord {
    x: Option<String>,
    y: Option<String>,
    score: Option<String>,
    label: Option<String>,
}

/// Encode seeds as `label,x,y,score,selected` CSV (selected is 0 or 1).
pub fn encode_seeds_csv(seeds: &[SeedRow]) -> Result<String, DataError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for seed in seeds {
        writer.serialize(SeedRecord {
            label: &seed.label,
            x: seed.x,
            y: seed.y,
            score: seed.score,
            selected: u8::from(seed.selected),
        })?;
    }
    let bytes = writer.into_inner()?;
    Ok(String::from_utf8(bytes)?)
}

/// Decode the service's `x,y,score,label` CSV.
///
/// Rows whose x or y is missing or not a number are dropped; a bad score
/// reads as 0.
pub fn parse_similarity_csv(text: &str) -> Result<Vec<SimilarityResult>, DataError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let mut results = Vec::new();
    for (i, record) in reader.deserialize::<ResultRecord>().enumerate() {
        let record = match record {
            Ok(record) => record,
            Err(e) => {
                log::warn!("Skipping unreadable similarity record {}: {}", i, e);
                continue;
            }
        };

        let x = record.x.as_deref().and_then(|v| v.parse::<f32>().ok());
        let y = record.y.as_deref().and_then(|v| v.parse::<f32>().ok());
        let (Some(x), Some(y)) = (x, y) else {
            log::debug!("Similarity record {} has no numeric position", i);
            continue;
        };
        if !(x.is_finite() && y.is_finite()) {
            continue;
        }

        let score = record
            .score
            .as_deref()
            .and_then(|v| v.parse::<f32>().ok())
            .unwrap_or(0.0);
        let mut result = SimilarityResult::new(x, y, score);
        result.label = record.label.filter(|l| !l.is_empty());
        results.push(result);
    }
    Ok(results)
}
