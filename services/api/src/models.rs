//! API Models
//!
//! Request and response bodies for the REST API, annotated for OpenAPI
//! generation with `utoipa`.

use relay_core::SessionId;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use utoipa::ToSchema;

/// Returned by `GET /api/session`: the session id plus the provider payload,
/// flattened into one object.
#[derive(Serialize, ToSchema, Debug)]
pub struct CreateSessionResponse {
    #[schema(value_type = String, example = "550e8400-e29b-41d4-a716-446655440000")]
    pub session_id: SessionId,
    #[serde(flatten)]
    pub provider_data: HashMap<String, Value>,
}

impl CreateSessionResponse {
    pub fn new(session_id: SessionId, provider_data: Value) -> Self {
        let mut provider_data: HashMap<String, Value> = match provider_data {
            Value::Object(map) => map.into_iter().collect(),
            _ => HashMap::new(),
        };
        // Our id always wins over a provider field of the same name.
        provider_data.remove("session_id");
        Self {
            session_id,
            provider_data,
        }
    }
}

#[derive(Serialize, ToSchema, Debug, PartialEq)]
pub struct CloseSessionResponse {
    #[schema(example = "success")]
    pub status: String,
}

impl CloseSessionResponse {
    pub fn success() -> Self {
        Self {
            status: "success".to_string(),
        }
    }
}

#[derive(Serialize, ToSchema, Debug)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_create_session_response_flattens_provider_data() {
        let response = CreateSessionResponse::new(
            "abc".into(),
            json!({
                "object": "realtime.session",
                "client_secret": {"value": "ek_123", "expires_at": 1700000000}
            }),
        );

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["session_id"], "abc");
        assert_eq!(json["object"], "realtime.session");
        assert_eq!(json["client_secret"]["value"], "ek_123");
    }

    #[test]
    fn test_provider_session_id_does_not_shadow_ours() {
        let response =
            CreateSessionResponse::new("ours".into(), json!({"session_id": "theirs", "id": "x"}));

        let json = serde_json::to_string(&response).unwrap();
        assert_eq!(json.matches("session_id").count(), 1);
        let value: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["session_id"], "ours");
        assert_eq!(value["id"], "x");
    }

    #[test]
    fn test_close_session_response_serialization() {
        let json = serde_json::to_string(&CloseSessionResponse::success()).unwrap();
        assert_eq!(json, r#"{"status":"success"}"#);
    }

    #[test]
    fn test_error_response_serialization() {
        let error = ErrorResponse {
            error: "Not found".to_string(),
            message: "Session with id 'abc' not found".to_string(),
        };

        let json = serde_json::to_string(&error).unwrap();
        let expected = r#"{"error":"Not found","message":"Session with id 'abc' not found"}"#;
        assert_eq!(json, expected);
    }
}
