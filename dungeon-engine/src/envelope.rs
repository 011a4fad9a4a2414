//! JSON response envelopes for the boundary layer.
use serde::Serialize;
use serde_json::{Map, Value, json};

use crate::error::{EngineError, Result};

/// A response body plus its HTTP-equivalent status.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub status: u16,
    pub body: Value,
}

impl Envelope {
    /// `{"success": true, ...payload}`. A payload that is not a JSON object
    /// is nested under `data`.
    #[must_use]
    pub fn ok<T: Serialize>(payload: &T) -> Self {
        match serde_json::to_value(payload) {
            Ok(Value::Object(fields)) => {
                let mut body = Map::with_capacity(fields.len() + 1);
                body.insert(String::from("success"), Value::Bool(true));
                body.extend(fields);
                Self {
                    status: 200,
                    body: Value::Object(body),
                }
            }
            Ok(other) => Self {
                status: 200,
                body: json!({ "success": true, "data": other }),
            },
            Err(err) => Self::error(&EngineError::Internal(err.to_string())),
        }
    }

    /// `{"success": false, "error": message, "code": code}`.
    #[must_use]
    pub fn error(err: &EngineError) -> Self {
        Self {
            status: err.status_code(),
            body: json!({
                "success": false,
                "error": err.to_string(),
                "code": err.code(),
            }),
        }
    }

    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status < 400
    }

    #[must_use]
    pub fn to_json_string(&self) -> String {
        self.body.to_string()
    }
}

/// Wrap an operation result in its envelope.
pub fn respond<T: Serialize>(result: &Result<T>) -> Envelope {
    match result {
        Ok(payload) => Envelope::ok(payload),
        Err(err) => Envelope::error(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Entity;

    #[derive(Serialize)]
    #[serde(rename_all = "camelCase")]
    struct Payload {
        run_id: String,
        current_floor: u32,
    }

    #[test]
    fn success_flattens_payload_fields() {
        let env = respond(&Ok(Payload {
            run_id: String::from("run-1"),
            current_floor: 1,
        }));
        assert_eq!(env.status, 200);
        assert_eq!(env.body["success"], true);
        assert_eq!(env.body["runId"], "run-1");
        assert_eq!(env.body["currentFloor"], 1);
    }

    #[test]
    fn scalar_payload_nests_under_data() {
        let env = Envelope::ok(&vec![1, 2]);
        assert_eq!(env.body["data"], json!([1, 2]));
    }

    #[test]
    fn errors_carry_message_code_and_status() {
        let env = respond::<Payload>(&Err(EngineError::not_found(Entity::Dungeon, "nowhere")));
        assert_eq!(env.status, 404);
        assert!(!env.is_success());
        assert_eq!(env.body["success"], false);
        assert_eq!(env.body["code"], "DungeonNotFound");
        assert_eq!(env.body["error"], "Dungeon not found: nowhere");

        let env = Envelope::error(&EngineError::RunAlreadyActive {
            character_id: String::from("c1"),
        });
        assert_eq!(env.status, 409);
        assert!(env.to_json_string().contains("\"RunAlreadyActive\""));
    }
}
