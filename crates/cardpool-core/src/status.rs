//! Status Translator.
//!
//! The remote card-pool service reports the detailed outcome of an operation
//! as a 32-bit hex status code (`0x03810000` on success). Codes arrive in
//! several spellings (`"3810001"`, `"0x3810001"`, `"0X03810001"`), so
//! they are normalized before lookup: trim, drop the `0x` prefix, lower-case
//! and left-pad to eight hex digits.
//!
//! # Examples
//!
//! ```
//! use cardpool_core::status::{translate, StatusCode, UNKNOWN_STATUS};
//!
//! assert_eq!(StatusCode::parse("3810001").unwrap().as_str(), "0x03810001");
//! assert_eq!(translate("3810001"), "用户未登录");
//! assert_eq!(translate("0xFFFFFFFF"), UNKNOWN_STATUS);
//! ```

use crate::{Error, Result};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

/// Message for codes missing from the table or impossible to parse
pub const UNKNOWN_STATUS: &str = "未知状态";

/// Normalized status code of a successful operation
pub const SUCCESS_STATUS: &str = "0x03810000";

static STATUS_TABLE: LazyLock<HashMap<&'static str, &'static str>> = LazyLock::new(|| {
    [
        ("0x03810000", "操作成功"),
        ("0x03810001", "用户未登录"),
        ("0x03810002", "simpool未登录"),
        ("0x03810003", "simpool不在线"),
        ("0x03810004", "用户未分卡"),
        ("0x03810005", "用户余额不足"),
        ("0x03810006", "用户自己操作"),
        ("0x03810007", "无效参数"),
        ("0x02810100", "包应答超时"),
        ("0x03810101", "包解析错误"),
        ("0x02810102", "socket异常"),
        ("0x01810103", "服务暂不可用"),
        ("0x01810104", "服务忙,稍候重试"),
        ("0x03810105", "服务异常终止"),
        ("0x02830000", "M网用户注册失败"),
        ("0x03830001", "登录密码错误"),
        ("0x03830002", "用户已被禁用"),
        ("0x03830003", "SP已被禁用"),
        ("0x03830004", "用户名不存在"),
        ("0x03830005", "用户修改密码"),
        ("0x03830006", "用户在其它设备登录"),
        ("0x01830007", "协议版本不兼容"),
        ("0x01830008", "软件版本错误"),
        ("0x03830009", "无效的session id"),
        ("0x0183000a", "mac地址错误"),
        ("0x0183000b", "卡池容量错误"),
        ("0x0183000c", "卡池硬件版本错误"),
        ("0x0183000d", "卡池软件版本错误"),
        ("0x03820000", "未绑卡用户无卡可分或换"),
        ("0x03820001", "已绑卡用户无卡可分或换"),
        ("0x03820002", "本地无服务"),
        ("0x03820003", "用户是rtu模式"),
        ("0x03820004", "sim卡余额不足"),
        ("0x03820005", "sim卡已不可用"),
        ("0x03820006", "vip用户抢占"),
        ("0x03840307", "云卡状态异常"),
        ("0x03840322", "镜像文件缺失"),
        ("0x03840327", "位置更新被拒绝"),
        ("0x03840328", "路由区更新被拒绝"),
        ("0x03840329", "跟踪区更新被拒绝"),
        ("0x0384032a", "附着被拒绝"),
        ("0x0384032b", "鉴权超时"),
        ("0x0384032d", "PDP激活被拒绝"),
        ("0x0384032e", "EPS承载激活被拒绝"),
        ("0x03840330", "服务被拒绝"),
        ("0x03840334", "云卡余额不足"),
        ("0x03840335", "账户余额不足"),
        ("0x01850000", "simpool离线"),
        ("0x02850001", "等待回应超时"),
        ("0x02850004", "数据包CRC校验失败"),
        ("0x01850104", "SIM卡异常"),
        ("0x01850105", "SIM卡丢失"),
    ]
    .into_iter()
    .collect()
});

/// Normalized status code, always `0x` followed by eight lower-case hex digits
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct StatusCode(String);

impl StatusCode {
    /// Normalize a raw code; fails when the digits are not 1 to 8 hex characters
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);

        if digits.is_empty() || digits.len() > 8 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(Error::InvalidStatusCode(raw.to_string()));
        }

        Ok(Self(format!("0x{:0>8}", digits.to_ascii_lowercase())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_success(&self) -> bool {
        self.0 == SUCCESS_STATUS
    }

    /// Table entry for this code, if it is a known one
    pub fn message(&self) -> Option<&'static str> {
        STATUS_TABLE.get(self.0.as_str()).copied()
    }

    /// Human-readable message, falling back to [`UNKNOWN_STATUS`]
    pub fn describe(&self) -> &'static str {
        self.message().unwrap_or(UNKNOWN_STATUS)
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Translate a raw status code into its message. Never fails.
pub fn translate(raw: &str) -> &'static str {
    StatusCode::parse(raw)
        .map(|code| code.describe())
        .unwrap_or(UNKNOWN_STATUS)
}

/// Number of known status codes
pub fn known_codes() -> usize {
    STATUS_TABLE.len()
}
