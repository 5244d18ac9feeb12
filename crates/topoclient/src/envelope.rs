//! Topology server response envelope and error mapping.
//!
//! Every endpoint answers with the same JSON envelope:
//!
//! ```json
//! {"result": true, "bk_error_code": 0, "bk_error_msg": "success", "data": ...}
//! ```

use reconcile::{ApiResponse, Error, RequestContext, Result};
use serde::Deserialize;

/// Response envelope carrying an optional `data` payload.
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    /// Application-level success flag.
    pub result: bool,
    /// Zero on success.
    #[serde(default)]
    pub bk_error_code: i64,
    /// Human-readable failure reason.
    #[serde(default)]
    pub bk_error_msg: String,
    /// Endpoint-specific payload.
    pub data: Option<T>,
}

impl<T> Envelope<T> {
    /// The envelope's status without its payload.
    pub fn status(&self) -> ApiResponse {
        ApiResponse {
            result: self.result,
            code: self.bk_error_code,
            message: self.bk_error_msg.clone(),
        }
    }

    /// Payload of a successful envelope.
    ///
    /// An application failure becomes `Error::Remote`; success without a
    /// payload is an invalid response.
    pub fn into_data(self) -> Result<T> {
        self.status().into_result()?;
        self.data
            .ok_or_else(|| Error::InvalidResponse("response has no data".to_string()))
    }
}

/// Map a `ureq` failure onto a reconcile error.
///
/// While `ctx` is cancelled or expired the failure is reported as the
/// cancellation: a request cut short by the deadline timeout must not look
/// like an unreachable server.
pub fn map_ureq_error(ctx: &RequestContext, err: ureq::Error) -> Error {
    if let Err(done) = ctx.check() {
        return done;
    }
    match err {
        ureq::Error::StatusCode(code) => Error::transport(format!("HTTP {code}"), Some(code)),
        ureq::Error::Json(e) => Error::InvalidResponse(e.to_string()),
        other => Error::transport(other.to_string(), None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reconcile::{ErrorCategory, ServiceTemplate};
    use std::time::Instant;

    #[test]
    fn test_envelope_success_data() {
        let envelope: Envelope<ServiceTemplate> = serde_json::from_str(
            r#"{"result": true, "bk_error_code": 0, "bk_error_msg": "success",
                "data": {"id": 9, "name": "web", "service_category_id": 31}}"#,
        )
        .unwrap();
        assert!(envelope.status().is_success());
        assert_eq!(envelope.into_data().unwrap().service_category_id, 31);
    }

    #[test]
    fn test_envelope_failure_becomes_remote_error() {
        let envelope: Envelope<ServiceTemplate> = serde_json::from_str(
            r#"{"result": false, "bk_error_code": 1199019, "bk_error_msg": "no permission", "data": null}"#,
        )
        .unwrap();
        let err = envelope.into_data().unwrap_err();
        assert!(matches!(err, Error::Remote { code: 1199019, .. }));
    }

    #[test]
    fn test_envelope_without_data_is_invalid() {
        let envelope: Envelope<ServiceTemplate> =
            serde_json::from_str(r#"{"result": true, "bk_error_code": 0}"#).unwrap();
        let err = envelope.into_data().unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Format);
    }

    #[test]
    fn test_envelope_status_ignores_payload_type() {
        let envelope: Envelope<serde_json::Value> = serde_json::from_str(
            r#"{"result": true, "bk_error_code": 0, "bk_error_msg": "success", "data": {"bk_module_id": 3}}"#,
        )
        .unwrap();
        assert!(envelope.status().is_success());
    }

    #[test]
    fn test_map_status_code() {
        let ctx = RequestContext::new("rid-1");
        let err = map_ureq_error(&ctx, ureq::Error::StatusCode(502));
        assert!(matches!(err, Error::Transport { status: Some(502), .. }));
    }

    #[test]
    fn test_map_error_prefers_cancellation() {
        let ctx = RequestContext::new("rid-1").with_deadline(Instant::now());
        let err = map_ureq_error(&ctx, ureq::Error::StatusCode(504));
        assert!(matches!(err, Error::DeadlineExceeded));
    }
}
