use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::RelayError;

/// Class label every backend uses for powdery mildew.
pub const POWDERY_MILDEW: &str = "うどんこ病";

/// Maps a raw classifier response to the powdery mildew confidence.
pub type ResponseParser = fn(&Value) -> Result<f64, RelayError>;

#[derive(Deserialize)]
struct Envelope<I> {
    assets: Vec<Asset<I>>,
}

#[derive(Deserialize)]
struct Asset<I> {
    images: Vec<I>,
}

fn first_image<I: DeserializeOwned>(raw: &Value) -> Result<I, RelayError> {
    let envelope: Envelope<I> = serde_json::from_value(raw.clone())
        .map_err(|e| RelayError::MalformedUpstreamResponse(e.to_string()))?;
    envelope
        .assets
        .into_iter()
        .next()
        .and_then(|asset| asset.images.into_iter().next())
        .ok_or_else(|| RelayError::MalformedUpstreamResponse("response carries no image".into()))
}

fn first<T>(items: Vec<T>, what: &str) -> Result<T, RelayError> {
    items
        .into_iter()
        .next()
        .ok_or_else(|| RelayError::MalformedUpstreamResponse(format!("response carries no {}", what)))
}

/// Score of the powdery mildew entry, or 0.0 when no entry carries that label.
/// Entries with other labels are never inspected beyond their label.
fn target_score(entries: &[Value], label_key: &str, score_key: &str) -> Result<f64, RelayError> {
    let Some(entry) = entries
        .iter()
        .find(|entry| entry.get(label_key).and_then(Value::as_str) == Some(POWDERY_MILDEW))
    else {
        return Ok(0.0);
    };
    entry.get(score_key).and_then(Value::as_f64).ok_or_else(|| {
        RelayError::MalformedUpstreamResponse(format!("{} entry has no numeric {}", POWDERY_MILDEW, score_key))
    })
}

#[derive(Deserialize)]
struct RankedImage {
    results: Vec<RankedResult>,
}

#[derive(Deserialize)]
struct RankedResult {
    ranking: Vec<Value>,
}

/// Hosei cucumber leaf v4: `assets[0].images[0].results[0].ranking[]`.
pub fn parse_ranking(raw: &Value) -> Result<f64, RelayError> {
    let image: RankedImage = first_image(raw)?;
    let result = first(image.results, "result")?;
    target_score(&result.ranking, "estimated", "probability")
}

#[derive(Deserialize)]
struct CandidateImage {
    results: Vec<CandidateResult>,
}

#[derive(Deserialize)]
struct CandidateResult {
    candidates: Vec<Value>,
}

/// NARO edge v1: `assets[0].images[0].results[0].candidates[]`.
pub fn parse_candidates(raw: &Value) -> Result<f64, RelayError> {
    let image: CandidateImage = first_image(raw)?;
    let result = first(image.results, "result")?;
    log::debug!("Edge classifier returned {} candidates", result.candidates.len());
    target_score(&result.candidates, "estimated", "probability")
}

#[derive(Deserialize)]
struct AnnotatedImage {
    annotations: Vec<Annotation>,
}

#[derive(Deserialize)]
struct Annotation {
    labels: Labels,
}

#[derive(Deserialize)]
struct Labels {
    disease: Vec<Value>,
}

/// NARO pumpkin v1: `assets[0].images[0].annotations[0].labels.disease[]`.
pub fn parse_disease_labels(raw: &Value) -> Result<f64, RelayError> {
    let image: AnnotatedImage = first_image(raw)?;
    let annotation = first(image.annotations, "annotation")?;
    target_score(&annotation.labels.disease, "class", "score")
}
