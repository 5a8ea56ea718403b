//! Constants shared by every layer of the gateway.
//!
//! # Response codes
//!
//! The remote card-pool service answers with a seven digit decimal `code`
//! (`"3810000"` on success) and an optional detailed status inside `data`.
//! The gateway adds its own codes for failures detected before the remote
//! round-trip:
//!
//! | Code | HTTP | Meaning |
//! |------|------|---------|
//! | `4000001` | 400 | required parameter missing |
//! | `4000002` | 400 | phone number resolves to no card |
//! | `4000003` | 400 | card held by another device |
//! | `4010000` | 401 | API key missing or rejected |
//! | `4040000` | 404 | resource or route not found |
//! | `5000000` | 500 | operation failed |
//! | `5000001` | 500 | card lookup failed |
//!
//! # Remote paths
//!
//! Paths are appended verbatim to the configured base URL. The spelling of
//! `clientsSpilt` and `simpoolsDeatil` is the remote service's own.

// ============================================================================
// Response Codes
// ============================================================================

/// Top-level code the remote service returns on success
pub const REMOTE_SUCCESS_CODE: &str = "3810000";

/// Code of locally served successful responses
pub const LOCAL_SUCCESS_CODE: &str = "3810000";

pub const CODE_MISSING_PARAMETER: &str = "4000001";
pub const CODE_INVALID_PHONE_NUMBER: &str = "4000002";
pub const CODE_CARD_OCCUPIED: &str = "4000003";
pub const CODE_UNAUTHORIZED: &str = "4010000";
pub const CODE_NOT_FOUND: &str = "4040000";
pub const CODE_OPERATION_FAILED: &str = "5000000";
pub const CODE_LOOKUP_FAILED: &str = "5000001";

// ============================================================================
// Remote API
// ============================================================================

pub const PATH_CLIENTS_SPLIT: &str = "/outbreak/clientsSpilt";
pub const PATH_USER_REVUIM: &str = "/outbreak/userRevuim";
pub const PATH_SIM_CARDS_LIST: &str = "/outbreak/simCardsList";
pub const PATH_CLIENTS: &str = "/outbreak/clients";
pub const PATH_CLIENTS_INFO: &str = "/outbreak/clientsInfo";
pub const PATH_SIMPOOLS_DETAIL: &str = "/outbreak/simpoolsDeatil";
pub const PATH_GET_SMS: &str = "/outbreak/getSms";
pub const PATH_SEND_SMS: &str = "/outbreak/sendSms";
pub const PATH_SEND_RESULT: &str = "/outbreak/sendResult";

/// Header carrying the API key, both towards the remote service and on the
/// local HTTP surface
pub const API_KEY_HEADER: &str = "key";

/// Default remote request timeout in milliseconds
pub const DEFAULT_REMOTE_TIMEOUT_MS: u64 = 10_000;

// ============================================================================
// Lookup & Paging
// ============================================================================

/// Minimum number of digits on both sides of a fuzzy phone-number match
pub const FUZZY_MIN_DIGITS: usize = 6;

pub const DEFAULT_PAGE: u32 = 1;
pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 500;
