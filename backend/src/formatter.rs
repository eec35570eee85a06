use shared::DiagnosisResult;

use crate::endpoints::parsers::ResponseParser;
use crate::error::RelayError;
use crate::relay::client::ClassifierOutcome;
use crate::upload::LeafImage;

/// Zips each image with its classifier outcome into the response shape.
pub fn format_results(
    images: &[LeafImage],
    outcomes: &[ClassifierOutcome],
    parser: ResponseParser,
) -> Result<Vec<DiagnosisResult>, RelayError> {
    debug_assert_eq!(images.len(), outcomes.len());
    images
        .iter()
        .zip(outcomes)
        .map(|(image, outcome)| {
            Ok(DiagnosisResult {
                name: image.filename.clone(),
                coordinates: image.coordinates,
                powdery_mildew_score: parser(outcome)?,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoints::parsers::parse_ranking;
    use serde_json::json;
    use shared::Coordinates;

    fn ranking(entries: serde_json::Value) -> ClassifierOutcome {
        json!({"assets": [{"images": [{"results": [{"ranking": entries}]}]}]})
    }

    #[test]
    fn only_geotagged_image_gets_coordinates() {
        let mut tagged = LeafImage::from_bytes("with_gps_0.JPG", vec![1]);
        tagged.coordinates = Some(Coordinates {
            latitude: 36.01258,
            longitude: 140.09635,
        });
        let images = vec![LeafImage::from_bytes("no_gps_0.JPG", vec![0]), tagged];
        let outcomes = vec![
            ranking(json!([{"estimated": "うどんこ病", "probability": 0.9}])),
            ranking(json!([{"estimated": "健全", "probability": 0.99}])),
        ];

        let results = format_results(&images, &outcomes, parse_ranking).unwrap();

        assert_eq!(
            results,
            vec![
                DiagnosisResult {
                    name: "no_gps_0.JPG".into(),
                    coordinates: None,
                    powdery_mildew_score: 0.9,
                },
                DiagnosisResult {
                    name: "with_gps_0.JPG".into(),
                    coordinates: Some(Coordinates {
                        latitude: 36.01258,
                        longitude: 140.09635,
                    }),
                    powdery_mildew_score: 0.0,
                },
            ]
        );

        let body = serde_json::to_value(&results).unwrap();
        assert!(body[0].get("coordinates").is_none());
        assert_eq!(body[1]["coordinates"]["latitude"], 36.01258);
    }

    #[test]
    fn parser_failure_propagates() {
        let images = vec![LeafImage::from_bytes("leaf.jpg", vec![0])];
        let outcomes = vec![json!({"assets": []})];
        assert!(matches!(
            format_results(&images, &outcomes, parse_ranking),
            Err(RelayError::MalformedUpstreamResponse(_))
        ));
    }
}
