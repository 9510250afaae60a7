//! The field names and payloads of the registry's wire protocol.

use serde::Serialize;

use crate::{CommsErr, Result};

/// The json key holding an error value, both in queries and in publishes.
pub const RATING_KEY: &str = "rating";

/// The json key holding the serialized model of a publish.
pub const OBJECT_KEY: &str = "object";

/// The form field of the best error query.
pub const QUERY_FIELD: &str = "best_rating";

/// The form field of the publish request.
pub const PUBLISH_FIELD: &str = "save_neural_network";

/// The worst possible error, stands for "unknown" when the registry can't be queried.
pub const WORST_RATING: f64 = f64::MAX;

/// The json object sent under `PUBLISH_FIELD`.
#[derive(Debug, Serialize)]
pub struct PublishPayload<'a> {
    pub object: &'a str,
    pub rating: f64,
}

/// Builds the json carried by the best error query. It is always an empty object.
pub fn query_payload() -> String {
    serde_json::Value::Object(Default::default()).to_string()
}

/// Builds the json carried by a publish.
///
/// # Arguments
/// * `object` - The serialized model.
/// * `rating` - The error of the model.
pub fn publish_payload(object: &str, rating: f64) -> Result<String> {
    serde_json::to_string(&PublishPayload { object, rating }).map_err(CommsErr::Encode)
}

/// Reads the registry's best error out of a query response body.
///
/// # Returns
/// The rating or an error if the body isn't json or has no numeric `RATING_KEY`.
pub fn parse_rating(body: &str) -> Result<f64> {
    let value: serde_json::Value = serde_json::from_str(body).map_err(CommsErr::Parse)?;

    value
        .get(RATING_KEY)
        .and_then(serde_json::Value::as_f64)
        .ok_or(CommsErr::MissingKey(RATING_KEY))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_payload_is_an_empty_object() {
        assert_eq!(query_payload(), "{}");
    }

    #[test]
    fn publish_payload_uses_wire_keys() {
        let json = publish_payload("{\"params\":[]}", 0.25).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value[OBJECT_KEY], "{\"params\":[]}");
        assert_eq!(value[RATING_KEY], 0.25);
    }

    #[test]
    fn rating_is_parsed() {
        assert_eq!(parse_rating(r#"{"rating": 0.5}"#).unwrap(), 0.5);
        assert_eq!(parse_rating(r#"{"rating": 3, "other": "x"}"#).unwrap(), 3.);
    }

    #[test]
    fn bad_bodies_are_rejected() {
        assert!(matches!(parse_rating("<html>"), Err(CommsErr::Parse(_))));
        assert!(matches!(parse_rating("{}"), Err(CommsErr::MissingKey(RATING_KEY))));
        assert!(matches!(
            parse_rating(r#"{"rating": "low"}"#),
            Err(CommsErr::MissingKey(_))
        ));
    }
}
