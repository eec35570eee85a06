use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

/// Decimal-degree position read from an image geotag.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

/// One entry of the `/api/diagnose/{backend}` response, in upload order.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct DiagnosisResult {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<Coordinates>,
    pub powdery_mildew_score: f64,
}

/// Classifier backends the relay knows how to call and parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter)]
pub enum ClassifierKind {
    #[strum(serialize = "naroPumpkinV1")]
    NaroPumpkinV1,
    #[strum(serialize = "hoseiCucumberV4")]
    HoseiCucumberV4,
    #[strum(serialize = "naroEdgeV1")]
    NaroEdgeV1,
}
