pub mod parsers;

use std::collections::HashMap;
use std::str::FromStr;

use shared::ClassifierKind;
use thiserror::Error;
use url::Url;

use parsers::ResponseParser;

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("no classifier registered under the name {0:?}")]
    UnknownClassifier(String),
    #[error("invalid URL for classifier {0}: {1}")]
    InvalidUrl(ClassifierKind, url::ParseError),
}

/// How requests to a classifier are authorised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    None,
    WagriBearer,
}

#[derive(Debug, Clone)]
pub struct EndpointDescriptor {
    pub kind: ClassifierKind,
    pub url: Url,
    pub parser: ResponseParser,
    pub auth_mode: AuthMode,
}

struct Registration {
    kind: ClassifierKind,
    url: &'static str,
    parser: ResponseParser,
    auth_mode: AuthMode,
}

const REGISTRATIONS: &[Registration] = &[
    Registration {
        kind: ClassifierKind::NaroPumpkinV1,
        url: "https://api.wagri.net/API/Individual/Naro/PPAPI/plant_disease/naro/rcait-v1/pumpkin",
        parser: parsers::parse_disease_labels,
        auth_mode: AuthMode::WagriBearer,
    },
    Registration {
        kind: ClassifierKind::HoseiCucumberV4,
        url: "https://api.wagri.net/API/Individual/Naro/PRISM/plant_disease/hosei/v4/cucumber/haomote",
        parser: parsers::parse_ranking,
        auth_mode: AuthMode::WagriBearer,
    },
    Registration {
        kind: ClassifierKind::NaroEdgeV1,
        url: "http://ai/wsgi",
        parser: parsers::parse_candidates,
        auth_mode: AuthMode::None,
    },
];

/// Static lookup from configured classifier names to their descriptors.
#[derive(Debug, Clone)]
pub struct EndpointRegistry {
    descriptors: HashMap<ClassifierKind, EndpointDescriptor>,
}

impl EndpointRegistry {
    /// Builds the registry, replacing the default URL of any classifier named
    /// in `url_overrides`.
    pub fn new(url_overrides: &HashMap<ClassifierKind, String>) -> Result<Self, RegistryError> {
        let mut descriptors = HashMap::with_capacity(REGISTRATIONS.len());
        for registration in REGISTRATIONS {
            let raw_url = url_overrides
                .get(&registration.kind)
                .map(String::as_str)
                .unwrap_or(registration.url);
            let url = Url::parse(raw_url)
                .map_err(|e| RegistryError::InvalidUrl(registration.kind, e))?;
            descriptors.insert(
                registration.kind,
                EndpointDescriptor {
                    kind: registration.kind,
                    url,
                    parser: registration.parser,
                    auth_mode: registration.auth_mode,
                },
            );
        }
        Ok(Self { descriptors })
    }

    pub fn resolve(&self, classifier_name: &str) -> Result<EndpointDescriptor, RegistryError> {
        ClassifierKind::from_str(classifier_name)
            .ok()
            .and_then(|kind| self.descriptors.get(&kind))
            .cloned()
            .ok_or_else(|| RegistryError::UnknownClassifier(classifier_name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn resolves_every_registered_backend() {
        let registry = EndpointRegistry::new(&HashMap::new()).unwrap();

        let pumpkin = registry.resolve("naroPumpkinV1").unwrap();
        assert_eq!(pumpkin.auth_mode, AuthMode::WagriBearer);
        assert!(pumpkin.url.as_str().ends_with("/rcait-v1/pumpkin"));

        let cucumber = registry.resolve("hoseiCucumberV4").unwrap();
        assert_eq!(cucumber.auth_mode, AuthMode::WagriBearer);

        let edge = registry.resolve("naroEdgeV1").unwrap();
        assert_eq!(edge.auth_mode, AuthMode::None);
        assert_eq!(edge.url.as_str(), "http://ai/wsgi");
    }

    #[test]
    fn descriptor_carries_matching_parser() {
        let registry = EndpointRegistry::new(&HashMap::new()).unwrap();
        let edge = registry.resolve("naroEdgeV1").unwrap();
        let raw = json!({"assets": [{"images": [{"results": [{"candidates": [
            {"estimated": "うどんこ病", "probability": 0.65}
        ]}]}]}]});
        assert_eq!((edge.parser)(&raw).unwrap(), 0.65);
    }

    #[test]
    fn unknown_name_is_rejected() {
        let registry = EndpointRegistry::new(&HashMap::new()).unwrap();
        assert!(matches!(
            registry.resolve("naroTomatoV9"),
            Err(RegistryError::UnknownClassifier(name)) if name == "naroTomatoV9"
        ));
    }

    #[test]
    fn url_override_replaces_default() {
        let overrides = HashMap::from([(
            ClassifierKind::NaroEdgeV1,
            "http://127.0.0.1:8500/wsgi".to_string(),
        )]);
        let registry = EndpointRegistry::new(&overrides).unwrap();
        assert_eq!(
            registry.resolve("naroEdgeV1").unwrap().url.as_str(),
            "http://127.0.0.1:8500/wsgi"
        );

        let broken = HashMap::from([(ClassifierKind::NaroEdgeV1, "not a url".to_string())]);
        assert!(matches!(
            EndpointRegistry::new(&broken),
            Err(RegistryError::InvalidUrl(ClassifierKind::NaroEdgeV1, _))
        ));
    }
}
