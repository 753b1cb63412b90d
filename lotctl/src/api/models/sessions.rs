//! API models for the session scan endpoints.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::engine::billing::BillingBreakdown;

use super::reservations::ReservationResponse;

/// The versioned scannable-code payload. A single opaque token and nothing
/// else: validity is solely a function of current reservation status, never
/// of embedded reservation data.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(tag = "v")]
pub enum ScanPayload {
    #[serde(rename = "1")]
    V1 { session_token: Uuid },
}

impl ScanPayload {
    pub fn session_token(&self) -> Uuid {
        match self {
            ScanPayload::V1 { session_token } => *session_token,
        }
    }

    /// One-way migration for codes printed before the payload was versioned:
    /// a bare token string, or `{"sessionToken": "..."}`. New codes are
    /// always emitted as V1; this only reads, never writes, the old shapes.
    pub fn upgrade_legacy(raw: &str) -> Option<Self> {
        if let Ok(session_token) = raw.trim().parse::<Uuid>() {
            return Some(ScanPayload::V1 { session_token });
        }

        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct LegacyTokenObject {
            session_token: Uuid,
        }

        serde_json::from_str::<LegacyTokenObject>(raw)
            .ok()
            .map(|legacy| ScanPayload::V1 {
                session_token: legacy.session_token,
            })
    }
}

/// Body of the session start/end endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SessionScanRequest {
    #[serde(flatten)]
    pub payload: ScanPayload,
    /// Operator or kiosk performing the scan, recorded in the audit log.
    #[serde(default)]
    pub validated_by: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SessionEndResponse {
    pub reservation: ReservationResponse,
    pub billing: BillingBreakdown,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_v1_payload_parses() {
        let token = Uuid::new_v4();
        let raw = format!(r#"{{"v":"1","session_token":"{token}"}}"#);
        let payload: ScanPayload = serde_json::from_str(&raw).unwrap();
        assert_eq!(payload.session_token(), token);
    }

    #[test]
    fn test_unknown_version_rejected() {
        let raw = r#"{"v":"2","session_token":"8e2d9f5c-0cf5-4c1a-a64c-1c2f9f1f4a3b"}"#;
        assert!(serde_json::from_str::<ScanPayload>(raw).is_err());
    }

    #[test]
    fn test_legacy_bare_token_upgrades() {
        let token = Uuid::new_v4();
        let payload = ScanPayload::upgrade_legacy(&token.to_string()).unwrap();
        assert_eq!(payload.session_token(), token);
    }

    #[test]
    fn test_legacy_token_object_upgrades() {
        let token = Uuid::new_v4();
        let raw = format!(r#"{{"sessionToken":"{token}"}}"#);
        let payload = ScanPayload::upgrade_legacy(&raw).unwrap();
        assert_eq!(payload.session_token(), token);
    }

    #[test]
    fn test_legacy_garbage_rejected() {
        assert!(ScanPayload::upgrade_legacy("not-a-token").is_none());
        assert!(ScanPayload::upgrade_legacy(r#"{"other":"shape"}"#).is_none());
    }

    #[test]
    fn test_scan_request_with_validator() {
        let token = Uuid::new_v4();
        let validator = Uuid::new_v4();
        let raw = format!(r#"{{"v":"1","session_token":"{token}","validated_by":"{validator}"}}"#);
        let request: SessionScanRequest = serde_json::from_str(&raw).unwrap();
        assert_eq!(request.payload.session_token(), token);
        assert_eq!(request.validated_by, Some(validator));
    }
}
