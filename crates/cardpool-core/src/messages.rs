//! Response messages for gateway-generated bodies
//!
//! Callers of the card pool are Chinese-speaking operators, and the remote
//! service answers in Chinese, so locally generated messages are Chinese too.
//!
//! # Usage
//!
//! ```
//! use cardpool_core::messages::ResponseMessages;
//!
//! assert_eq!(ResponseMessages::INVALID_PHONE_NUMBER, "无效的手机号码");
//! ```

/// Messages placed in the `msg` member of locally generated responses
pub struct ResponseMessages;

impl ResponseMessages {
    /// `userId`, `phoneNumber` or `deviceId` missing from a switch request
    pub const MISSING_SWITCH_PARAMETERS: &'static str =
        "参数不完整，缺少userId、phoneNumber或deviceId";

    /// `userId` missing from a forced return request
    pub const MISSING_USER_ID: &'static str = "参数不完整，缺少userId";

    /// Phone number resolves to no card
    pub const INVALID_PHONE_NUMBER: &'static str = "无效的手机号码";

    /// Card is bound to a different device
    pub const CARD_OCCUPIED: &'static str = "该卡已被其他设备占用，无法切换";

    /// Storage failure while resolving the card
    pub const CARD_LOOKUP_FAILED: &'static str = "查询SIM卡信息失败";

    pub const SWITCH_FAILED: &'static str = "切卡失败";

    pub const RETURN_FAILED: &'static str = "还卡失败";

    /// Pass-through call to the remote service failed without an upstream body
    pub const REMOTE_REQUEST_FAILED: &'static str = "请求卡池服务失败";

    pub const LOCAL_QUERY_FAILED: &'static str = "查询本地数据失败";

    pub const GET_SMS_FAILED: &'static str = "收短信失败";

    pub const SEND_SMS_FAILED: &'static str = "发短信失败";

    pub const SEND_RESULT_FAILED: &'static str = "获取短信发送结果失败";

    /// No local record for the requested message id
    pub const SMS_NOT_FOUND: &'static str = "未找到指定的短信记录";

    pub const MISSING_API_KEY: &'static str = "未提供API密钥";

    pub const INVALID_API_KEY: &'static str = "API密钥无效";

    pub const NOT_FOUND: &'static str = "请求的资源不存在";

    /// Body could not be parsed as the expected JSON object
    pub const INVALID_BODY: &'static str = "请求体格式错误";

    pub const SUCCESS: &'static str = "success";

    pub const SERVICE_BANNER: &'static str = "卡池网关服务运行中";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_are_non_empty() {
        let messages = [
            ResponseMessages::MISSING_SWITCH_PARAMETERS,
            ResponseMessages::MISSING_USER_ID,
            ResponseMessages::INVALID_PHONE_NUMBER,
            ResponseMessages::CARD_OCCUPIED,
            ResponseMessages::CARD_LOOKUP_FAILED,
            ResponseMessages::SWITCH_FAILED,
            ResponseMessages::RETURN_FAILED,
            ResponseMessages::REMOTE_REQUEST_FAILED,
            ResponseMessages::LOCAL_QUERY_FAILED,
            ResponseMessages::GET_SMS_FAILED,
            ResponseMessages::SEND_SMS_FAILED,
            ResponseMessages::SEND_RESULT_FAILED,
            ResponseMessages::SMS_NOT_FOUND,
            ResponseMessages::MISSING_API_KEY,
            ResponseMessages::INVALID_API_KEY,
            ResponseMessages::NOT_FOUND,
            ResponseMessages::INVALID_BODY,
            ResponseMessages::SUCCESS,
            ResponseMessages::SERVICE_BANNER,
        ];

        for message in messages {
            assert!(!message.trim().is_empty());
        }
    }
}
