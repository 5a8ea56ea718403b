//! Inbound requests and the decorated switch outcome.

use crate::error::{AllocationError, AllocationResult};
use cardpool_core::status::UNKNOWN_STATUS;
use cardpool_core::wire::de;
use cardpool_core::{Payload, PhoneNumber, RemoteResponse, StatusCode};
use serde::{Deserialize, Serialize};

/// Body of a switch request
///
/// Fields are optional so that a missing one is reported as a validation
/// failure naming it rather than as a malformed body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwitchRequest {
    #[serde(default, deserialize_with = "de::opt_stringish")]
    pub user_id: Option<String>,

    #[serde(default, deserialize_with = "de::opt_stringish")]
    pub phone_number: Option<String>,

    #[serde(default, deserialize_with = "de::opt_stringish")]
    pub device_id: Option<String>,
}

/// Validated switch request, trimmed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwitchTarget<'a> {
    pub user_id: &'a str,
    pub phone_number: PhoneNumber,
    pub device_id: &'a str,
}

impl SwitchRequest {
    pub fn new(
        user_id: impl Into<String>,
        phone_number: impl Into<String>,
        device_id: impl Into<String>,
    ) -> Self {
        Self {
            user_id: Some(user_id.into()),
            phone_number: Some(phone_number.into()),
            device_id: Some(device_id.into()),
        }
    }

    /// Check that all three fields are present and non-blank
    pub fn validate(&self) -> AllocationResult<SwitchTarget<'_>> {
        let user_id = present(&self.user_id);
        let phone_number = present(&self.phone_number).and_then(|p| PhoneNumber::new(p).ok());
        let device_id = present(&self.device_id);

        match (user_id, phone_number, device_id) {
            (Some(user_id), Some(phone_number), Some(device_id)) => Ok(SwitchTarget {
                user_id,
                phone_number,
                device_id,
            }),
            (user_id, phone_number, device_id) => {
                let mut missing = Vec::new();
                if user_id.is_none() {
                    missing.push("userId");
                }
                if phone_number.is_none() {
                    missing.push("phoneNumber");
                }
                if device_id.is_none() {
                    missing.push("deviceId");
                }
                Err(AllocationError::Validation { missing })
            }
        }
    }
}

/// Body of a forced-return request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReturnRequest {
    #[serde(default, deserialize_with = "de::opt_stringish")]
    pub user_id: Option<String>,

    #[serde(default, deserialize_with = "de::opt_flag")]
    pub need_adjust: Option<bool>,
}

impl ReturnRequest {
    pub fn new(user_id: impl Into<String>, need_adjust: Option<bool>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            need_adjust,
        }
    }

    pub fn validate(&self) -> AllocationResult<&str> {
        present(&self.user_id).ok_or(AllocationError::Validation {
            missing: vec!["userId"],
        })
    }
}

fn present(field: &Option<String>) -> Option<&str> {
    field.as_deref().map(str::trim).filter(|value| !value.is_empty())
}

/// Remote switch response decorated with the translated status
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SwitchOutcome {
    pub code: String,
    pub msg: String,
    pub detail_msg: String,
    pub data: Payload,

    #[serde(skip)]
    pub status_code: Option<StatusCode>,
}

impl SwitchOutcome {
    pub fn from_remote(response: &RemoteResponse) -> Self {
        let status_code = response.status_code();
        let detail_msg = status_code
            .as_ref()
            .map(StatusCode::describe)
            .unwrap_or(UNKNOWN_STATUS);

        Self {
            code: response.code.clone(),
            msg: response.msg.clone(),
            detail_msg: detail_msg.to_string(),
            data: response.data.clone(),
            status_code,
        }
    }

    /// Audit remark: normalized code followed by its message
    pub fn remarks(&self) -> String {
        match &self.status_code {
            Some(code) => format!("{code} {}", self.detail_msg),
            None => self.detail_msg.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_validate_names_missing_fields() {
        let request = SwitchRequest {
            user_id: Some("u1".to_string()),
            phone_number: Some("   ".to_string()),
            device_id: None,
        };

        match request.validate() {
            Err(AllocationError::Validation { missing }) => {
                assert_eq!(missing, vec!["phoneNumber", "deviceId"]);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_validate_trims() {
        let request = SwitchRequest::new(" u1 ", "13800000000", "d1\n");
        let target = request.validate().unwrap();
        assert_eq!(target.user_id, "u1");
        assert_eq!(target.device_id, "d1");
        assert_eq!(target.phone_number.as_str(), "13800000000");
    }

    #[test]
    fn test_numeric_fields_are_accepted() {
        let request: SwitchRequest =
            serde_json::from_value(json!({"userId": 42, "phoneNumber": 13800000000u64, "deviceId": "d1"}))
                .unwrap();
        assert_eq!(request.user_id.as_deref(), Some("42"));
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_return_requires_user() {
        assert!(ReturnRequest::default().validate().is_err());
        assert_eq!(ReturnRequest::new("u1", None).validate().unwrap(), "u1");

        let request: ReturnRequest =
            serde_json::from_value(json!({"userId": "u1", "needAdjust": 1})).unwrap();
        assert_eq!(request.need_adjust, Some(true));
    }

    #[test]
    fn test_outcome_translates_embedded_code() {
        let response = RemoteResponse::new(
            "3810000",
            "ok",
            Payload::Raw(r#"{"code":"0x03840335"}"#.to_string()),
        );
        let outcome = SwitchOutcome::from_remote(&response);

        assert_eq!(outcome.detail_msg, "账户余额不足");
        assert_eq!(outcome.remarks(), "0x03840335 账户余额不足");

        let body = serde_json::to_value(&outcome).unwrap();
        assert_eq!(body["detailMsg"], "账户余额不足");
        assert!(body.get("statusCode").is_none());
    }

    #[test]
    fn test_outcome_without_payload_code_is_unknown() {
        let response = RemoteResponse::new("3810000", "ok", Payload::default());
        let outcome = SwitchOutcome::from_remote(&response);
        assert_eq!(outcome.detail_msg, UNKNOWN_STATUS);
        assert_eq!(outcome.status_code, None);
    }

    #[test]
    fn test_outcome_ignores_unparseable_payload_codes() {
        for data in [
            Payload::Raw(r#"{"code":3810004,"msg":"no card"}"#.to_string()),
            Payload::Raw("switch accepted".to_string()),
            Payload::Structured(json!({"code": "E_POOL_BUSY"})),
        ] {
            let outcome = SwitchOutcome::from_remote(&RemoteResponse::new("3810000", "ok", data));
            assert_eq!(outcome.detail_msg, UNKNOWN_STATUS);
            assert_eq!(outcome.remarks(), UNKNOWN_STATUS);
        }
    }

    #[test]
    fn test_outcome_with_unknown_code() {
        let response = RemoteResponse::new("not-a-code", "?", Payload::default());
        let outcome = SwitchOutcome::from_remote(&response);
        assert_eq!(outcome.detail_msg, UNKNOWN_STATUS);
        assert_eq!(outcome.remarks(), UNKNOWN_STATUS);
    }
}
