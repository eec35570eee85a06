use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Serialize;
use uuid::Uuid;

pub const JPEG_DATA_URL_PREFIX: &str = "data:image/jpeg;base64,";
pub const PLACEHOLDER_FILEDATE: &str = "1970/01/01";

/// Body of a single-image classifier request.
#[derive(Debug, Serialize)]
pub struct DiagnosisRequest {
    pub assets: Vec<Asset>,
}

#[derive(Debug, Serialize)]
pub struct Asset {
    pub id: String,
    #[serde(rename = "X-User-Id", skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub images: Vec<AssetImage>,
}

#[derive(Debug, Serialize)]
pub struct AssetImage {
    pub filename: String,
    pub filedate: String,
    pub data: String,
}

impl DiagnosisRequest {
    pub fn single_image(
        id_prefix: &str,
        user_id: Option<&str>,
        filename: &str,
        bytes: &[u8],
    ) -> Self {
        Self {
            assets: vec![Asset {
                id: format!("{}-{}", id_prefix, Uuid::new_v4()),
                user_id: user_id.map(str::to_string),
                images: vec![AssetImage {
                    filename: filename.to_string(),
                    filedate: PLACEHOLDER_FILEDATE.to_string(),
                    data: encode_jpeg_data_url(bytes),
                }],
            }],
        }
    }
}

pub fn encode_jpeg_data_url(bytes: &[u8]) -> String {
    let mut encoded = String::with_capacity(JPEG_DATA_URL_PREFIX.len() + bytes.len() * 4 / 3 + 4);
    encoded.push_str(JPEG_DATA_URL_PREFIX);
    STANDARD.encode_string(bytes, &mut encoded);
    encoded
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_jpeg_data_url(data_url: &str) -> Option<Vec<u8>> {
        let body = data_url.strip_prefix(JPEG_DATA_URL_PREFIX)?;
        STANDARD.decode(body).ok()
    }

    #[test]
    fn data_url_round_trips_bytes() {
        let bytes: Vec<u8> = (0..=255u8).chain([0xFF, 0xD8, 0xFF, 0xD9]).collect();
        let encoded = encode_jpeg_data_url(&bytes);
        assert!(encoded.starts_with("data:image/jpeg;base64,"));
        assert_eq!(decode_jpeg_data_url(&encoded).unwrap(), bytes);
    }

    #[test]
    fn authenticated_payload_shape() {
        let request =
            DiagnosisRequest::single_image("naro-pumpkin-system", Some("naro-pumpkin-system"), "leaf.jpg", b"jpeg");
        let json = serde_json::to_value(&request).unwrap();
        let asset = &json["assets"][0];
        assert!(asset["id"].as_str().unwrap().starts_with("naro-pumpkin-system-"));
        assert_eq!(asset["X-User-Id"], "naro-pumpkin-system");
        let image = &asset["images"][0];
        assert_eq!(image["filename"], "leaf.jpg");
        assert_eq!(image["filedate"], "1970/01/01");
        assert_eq!(image["data"], "data:image/jpeg;base64,anBlZw==");
    }

    #[test]
    fn unauthenticated_payload_omits_user_id() {
        let request = DiagnosisRequest::single_image("naro-pumpkin-system", None, "leaf.jpg", b"jpeg");
        let json = serde_json::to_value(&request).unwrap();
        assert!(json["assets"][0].get("X-User-Id").is_none());
        assert_eq!(json["assets"][0]["images"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn asset_ids_differ_per_request() {
        let a = DiagnosisRequest::single_image("p", None, "a.jpg", b"x");
        let b = DiagnosisRequest::single_image("p", None, "a.jpg", b"x");
        assert_ne!(a.assets[0].id, b.assets[0].id);
    }
}
