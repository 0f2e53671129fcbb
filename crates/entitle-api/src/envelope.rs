// Result/error envelope codec
//
// Every wire response is either `{ "data": <T> }` or an error object
// `{ "err_type": "...", "message": "...", "code"?: int, "data"?: "<aux>" }`.
// The two markers are mutually exclusive: an object carrying neither, or
// carrying `err_type` next to a structured success payload, is a protocol
// violation and fails loudly instead of producing a result.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{Error, SslError};

// Canonical err_type literals. Older revisions of the wire protocol used
// "MalformedSccCredentialsFile"; only the spellings below are emitted.
pub const ERR_API: &str = "APIError";
pub const ERR_NET: &str = "NetError";
pub const ERR_TIMEOUT: &str = "Timeout";
pub const ERR_SSL: &str = "SSLError";
pub const ERR_JSON: &str = "JSONError";
pub const ERR_MISSING_CREDENTIALS: &str = "MissingCredentialsFile";
pub const ERR_MALFORMED_CREDENTIALS: &str = "MalformedCredentialsFile";

/// Error arm of the wire envelope.
#[derive(Debug, Clone, Serialize)]
pub struct WireError {
    pub err_type: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<u16>,
    /// Auxiliary string payload; the PEM peer certificate for `SSLError`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
}

/// Decode a response body into the typed success payload.
///
/// Returns the decoded `T` from the `data` arm, or the mapped [`Error`]
/// from the error arm. Envelope-shape violations map to
/// [`Error::Protocol`].
pub fn decode<T: DeserializeOwned>(body: &[u8]) -> Result<T, Error> {
    match split(body)? {
        Ok(data) => serde_json::from_value(data).map_err(Error::Json),
        Err(wire) => Err(wire.into_error()),
    }
}

/// Split a response body into its success or error arm without decoding
/// the success payload. Used by operations that discard the payload.
pub fn split(body: &[u8]) -> Result<Result<Value, WireError>, Error> {
    let value: Value = serde_json::from_slice(body)?;
    let Value::Object(mut obj) = value else {
        return Err(Error::Protocol("envelope is not a JSON object".into()));
    };

    let err_type = obj.remove("err_type");
    let data = obj.remove("data");

    match (err_type, data) {
        // Error arm. The aux payload must be a string -- anything
        // structured next to err_type is a smuggled success payload.
        (Some(Value::String(err_type)), data) => {
            let data = match data {
                None | Some(Value::Null) => None,
                Some(Value::String(s)) => Some(s),
                Some(_) => {
                    return Err(Error::Protocol(
                        "envelope carries both err_type and a success payload".into(),
                    ));
                }
            };
            let Some(message) = obj.get("message").and_then(Value::as_str) else {
                return Err(Error::Protocol("error envelope without message".into()));
            };
            let code = obj
                .get("code")
                .and_then(Value::as_u64)
                .and_then(|c| u16::try_from(c).ok());
            Ok(Err(WireError {
                err_type,
                message: message.to_owned(),
                code,
                data,
            }))
        }
        (Some(_), _) => Err(Error::Protocol("err_type is not a string".into())),
        // Success arm.
        (None, Some(data)) => Ok(Ok(data)),
        (None, None) => Err(Error::Protocol(
            "envelope carries neither err_type nor data".into(),
        )),
    }
}

impl WireError {
    /// Map the wire error into the crate taxonomy.
    ///
    /// Unknown `err_type` values still surface the message instead of
    /// silently succeeding.
    pub fn into_error(self) -> Error {
        match self.err_type.as_str() {
            ERR_API => Error::Api {
                code: self.code.unwrap_or(0),
                message: self.message,
            },
            ERR_TIMEOUT => Error::Timeout {
                timeout_secs: u64::from(self.code.unwrap_or(0)),
            },
            ERR_SSL => Error::Ssl(SslError {
                code: self.code.unwrap_or(0),
                message: self.message,
                peer_cert: self.data,
            }),
            ERR_MISSING_CREDENTIALS => Error::MissingCredentialsFile { path: self.message },
            ERR_MALFORMED_CREDENTIALS => Error::MalformedCredentialsFile { path: self.message },
            ERR_NET | ERR_JSON => Error::Unknown {
                message: format!("{}: {}", self.err_type, self.message),
            },
            _ => Error::Unknown {
                message: self.message,
            },
        }
    }

    /// Render a crate error back into the envelope shape.
    ///
    /// The reverse direction of [`WireError::into_error`]; used by callers
    /// that speak the envelope outwards (e.g. the CLI `--json` mode).
    pub fn from_error(err: &Error) -> Self {
        match err {
            Error::Api { code, message } => Self {
                err_type: ERR_API.into(),
                message: message.clone(),
                code: Some(*code),
                data: None,
            },
            Error::Timeout { timeout_secs } => Self {
                err_type: ERR_TIMEOUT.into(),
                message: format!("request timed out after {timeout_secs}s"),
                code: None,
                data: None,
            },
            Error::Ssl(ssl) => Self {
                err_type: ERR_SSL.into(),
                message: ssl.message.clone(),
                code: Some(ssl.code),
                data: ssl.peer_cert.clone(),
            },
            Error::MissingCredentialsFile { path } => Self {
                err_type: ERR_MISSING_CREDENTIALS.into(),
                message: path.clone(),
                code: None,
                data: None,
            },
            Error::MalformedCredentialsFile { path } => Self {
                err_type: ERR_MALFORMED_CREDENTIALS.into(),
                message: path.clone(),
                code: None,
                data: None,
            },
            Error::Network(e) => Self {
                err_type: ERR_NET.into(),
                message: e.to_string(),
                code: None,
                data: None,
            },
            Error::Json(e) => Self {
                err_type: ERR_JSON.into(),
                message: e.to_string(),
                code: None,
                data: None,
            },
            other => Self {
                err_type: String::new(),
                message: other.to_string(),
                code: None,
                data: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use super::*;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Pair {
        login: String,
        password: String,
    }

    #[test]
    fn decodes_success_payload() {
        let body = br#"{"data": {"login": "SCC_a", "password": "s3cr3t"}}"#;
        let pair: Pair = decode(body).expect("success arm");
        assert_eq!(
            pair,
            Pair {
                login: "SCC_a".into(),
                password: "s3cr3t".into()
            }
        );
    }

    #[test]
    fn decodes_api_error() {
        let body = br#"{"err_type": "APIError", "code": 403, "message": "invalid token"}"#;
        let err = decode::<Pair>(body).expect_err("error arm");
        match err {
            Error::Api { code, message } => {
                assert_eq!(code, 403);
                assert_eq!(message, "invalid token");
            }
            other => panic!("expected Api error, got: {other:?}"),
        }
    }

    #[test]
    fn decodes_ssl_error_with_peer_cert() {
        let body = br#"{"err_type": "SSLError", "code": 19, "message": "self signed", "data": "-----BEGIN CERTIFICATE-----"}"#;
        let err = decode::<Pair>(body).expect_err("error arm");
        match err {
            Error::Ssl(ssl) => {
                assert_eq!(ssl.code, 19);
                assert!(ssl.peer_cert.as_deref().is_some_and(|c| c.contains("BEGIN")));
            }
            other => panic!("expected Ssl error, got: {other:?}"),
        }
    }

    #[test]
    fn distinguishes_credential_error_kinds() {
        let missing = br#"{"err_type": "MissingCredentialsFile", "message": "/etc/zypp/credentials.d/SCCcredentials"}"#;
        let malformed = br#"{"err_type": "MalformedCredentialsFile", "message": "/etc/zypp/credentials.d/SCCcredentials"}"#;
        assert!(matches!(
            decode::<Pair>(missing),
            Err(Error::MissingCredentialsFile { .. })
        ));
        assert!(matches!(
            decode::<Pair>(malformed),
            Err(Error::MalformedCredentialsFile { .. })
        ));
    }

    #[test]
    fn unknown_err_type_surfaces_message() {
        let body = br#"{"err_type": "SomethingNew", "message": "future failure"}"#;
        let err = decode::<Pair>(body).expect_err("error arm");
        match err {
            Error::Unknown { message } => assert_eq!(message, "future failure"),
            other => panic!("expected Unknown, got: {other:?}"),
        }
    }

    #[test]
    fn rejects_both_arms_present() {
        let body = br#"{"err_type": "APIError", "message": "x", "data": {"login": "a", "password": "b"}}"#;
        assert!(matches!(decode::<Pair>(body), Err(Error::Protocol(_))));
    }

    #[test]
    fn rejects_neither_arm_present() {
        let body = br#"{"message": "looks like an error but is not one"}"#;
        assert!(matches!(decode::<Pair>(body), Err(Error::Protocol(_))));
    }

    #[test]
    fn rejects_error_arm_without_message() {
        let body = br#"{"err_type": "APIError", "code": 500}"#;
        assert!(matches!(decode::<Pair>(body), Err(Error::Protocol(_))));
    }

    #[test]
    fn rejects_non_object_envelope() {
        assert!(matches!(decode::<Pair>(b"[1, 2]"), Err(Error::Protocol(_))));
    }

    #[test]
    fn error_round_trips_through_wire_shape() {
        let err = Error::Api {
            code: 422,
            message: "No subscription with this Registration Code found".into(),
        };
        let wire = WireError::from_error(&err);
        let body = serde_json::to_vec(&wire).expect("serialize");
        let back = decode::<Pair>(&body).expect_err("error arm");
        match back {
            Error::Api { code, message } => {
                assert_eq!(code, 422);
                assert!(message.contains("Registration Code"));
            }
            other => panic!("expected Api error, got: {other:?}"),
        }
    }
}
