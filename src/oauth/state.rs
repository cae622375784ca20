//! Application state carried through the login redirect

use actix_web::HttpRequest;
use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use serde_json::{Map, Value};

use crate::errors::ConfigError;

pub const RETURN_TO: &str = "returnTo";
pub const NONCE: &str = "nonce";

/// Produces the application state stored with a login attempt
///
/// The value must be a JSON object. The orchestrator adds a fresh `nonce`
/// and, when missing, `returnTo`.
#[async_trait(?Send)]
pub trait LoginStateHook: Send + Sync {
    async fn login_state(&self, req: &HttpRequest, return_to: &str) -> Value;
}

/// Stores only the post-login destination
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultLoginState;

#[async_trait(?Send)]
impl LoginStateHook for DefaultLoginState {
    async fn login_state(&self, _req: &HttpRequest, return_to: &str) -> Value {
        serde_json::json!({ "returnTo": return_to })
    }
}

/// Require an object and inject `nonce` and a default `returnTo`
///
/// # Errors
///
/// Returns [`ConfigError::InvalidLoginState`] if `state` is not an object.
pub fn prepare_state(
    state: Value,
    nonce: &str,
    return_to: &str,
) -> Result<Map<String, Value>, ConfigError> {
    let Value::Object(mut state) = state else {
        return Err(ConfigError::InvalidLoginState);
    };
    state.insert(NONCE.to_string(), Value::String(nonce.to_string()));
    state
        .entry(RETURN_TO)
        .or_insert_with(|| Value::String(return_to.to_string()));
    Ok(state)
}

/// Encode state as base64url JSON
///
/// # Errors
///
/// Returns an error if the state cannot be serialized.
pub fn encode_state(state: &Map<String, Value>) -> Result<String, serde_json::Error> {
    Ok(URL_SAFE_NO_PAD.encode(serde_json::to_vec(state)?))
}

/// Decode a state value produced by [`encode_state`]
///
/// Anything that is not base64url JSON of an object yields an empty map.
#[must_use]
pub fn decode_state(encoded: &str) -> Map<String, Value> {
    URL_SAFE_NO_PAD
        .decode(encoded)
        .ok()
        .and_then(|bytes| serde_json::from_slice::<Map<String, Value>>(&bytes).ok())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;
    use serde_json::json;

    #[actix_web::test]
    async fn test_default_hook_returns_return_to() {
        let req = TestRequest::default().to_http_request();
        let state = DefaultLoginState.login_state(&req, "/profile").await;
        assert_eq!(state, json!({"returnTo": "/profile"}));
    }

    #[test]
    fn test_prepare_state_keeps_custom_return_to() {
        let state = prepare_state(json!({"returnTo": "/custom", "tab": 2}), "n-1", "/").unwrap();
        assert_eq!(state["returnTo"], "/custom");
        assert_eq!(state["nonce"], "n-1");
        assert_eq!(state["tab"], 2);

        let state = prepare_state(json!({}), "n-2", "/home").unwrap();
        assert_eq!(state["returnTo"], "/home");
    }

    #[test]
    fn test_prepare_state_rejects_non_objects() {
        for state in [json!("text"), json!([1, 2]), json!(null), json!(3)] {
            assert!(matches!(
                prepare_state(state, "n", "/"),
                Err(ConfigError::InvalidLoginState)
            ));
        }
    }

    #[test]
    fn test_state_encoding() {
        let state = prepare_state(json!({"returnTo": "/a?b=c"}), "n", "/").unwrap();
        let encoded = encode_state(&state).unwrap();
        assert!(!encoded.contains('='));
        assert_eq!(decode_state(&encoded), state);
        assert!(decode_state("%%%").is_empty());
    }
}
