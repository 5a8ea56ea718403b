use cardpool_core::{Payload, RemoteResponse, RemoteSms, SendSmsRequest};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// SMS sent or received through the remote card pool
///
/// Serialized with the column names, the shape local callers already read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct SmsRecord {
    pub id: i64,
    pub msg_id: Option<String>,
    pub sender: Option<String>,
    pub receiver: Option<String>,
    pub content: Option<String>,
    pub user_id: Option<String>,

    /// IMSI of the card bound to `user_id` when the record was written
    pub imsi: Option<String>,

    pub send_time: DateTime<Utc>,

    /// One of `success`, `failed`, `received`, `delivered`
    pub status: String,

    pub is_outgoing: bool,
}

impl SmsRecord {
    /// Record of a `sendSms` call; the remote `data` stands in for a missing msg id
    pub fn outgoing(request: &SendSmsRequest, response: &RemoteResponse) -> Self {
        let msg_id = request
            .msg_id
            .clone()
            .or_else(|| match (&response.data, response.data.decode()) {
                (_, Some(Value::String(id))) => Some(id),
                (_, Some(Value::Number(id))) => Some(id.to_string()),
                (Payload::Raw(text), None) => Some(text.trim().to_string()),
                _ => None,
            })
            .filter(|id| !id.is_empty());
        let status = if response.is_success() {
            SmsStatus::Success
        } else {
            SmsStatus::Failed
        };

        Self {
            id: 0,
            msg_id,
            sender: Some(String::new()),
            receiver: request.sms_receiver.clone(),
            content: request.content.clone(),
            user_id: request.user_id.clone(),
            imsi: None,
            send_time: Utc::now(),
            status: status.as_str().to_string(),
            is_outgoing: true,
        }
    }

    /// Record of a message returned by `getSms`
    pub fn incoming(user_id: Option<&str>, sms: &RemoteSms) -> Self {
        Self {
            id: 0,
            msg_id: sms.msg_id.clone(),
            sender: sms.sender.clone(),
            receiver: sms.receiver.clone(),
            content: sms.content.clone(),
            user_id: user_id.map(str::to_string),
            imsi: None,
            send_time: sms.date.as_deref().and_then(parse_sms_time).unwrap_or_else(Utc::now),
            status: SmsStatus::Received.as_str().to_string(),
            is_outgoing: false,
        }
    }

    pub fn status(&self) -> Option<SmsStatus> {
        SmsStatus::parse(&self.status)
    }
}

/// Remote dates are RFC 3339 or `YYYY-MM-DD HH:MM:SS` in UTC
fn parse_sms_time(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
                .ok()
                .map(|t| t.and_utc())
        })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SmsStatus {
    /// Accepted by the remote pool
    Success,
    Failed,
    /// Pulled from the pool inbox
    Received,
    /// Confirmed by a delivery report
    Delivered,
}

impl SmsStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SmsStatus::Success => "success",
            SmsStatus::Failed => "failed",
            SmsStatus::Received => "received",
            SmsStatus::Delivered => "delivered",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "success" => Some(SmsStatus::Success),
            "failed" => Some(SmsStatus::Failed),
            "received" => Some(SmsStatus::Received),
            "delivered" => Some(SmsStatus::Delivered),
            _ => None,
        }
    }
}
