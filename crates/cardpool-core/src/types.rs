use crate::constants::{DEFAULT_PAGE, DEFAULT_PAGE_SIZE, FUZZY_MIN_DIGITS, MAX_PAGE_SIZE};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Phone number as typed by a caller.
///
/// The raw form is kept for the exact lookup; [`PhoneNumber::search_key`]
/// yields the digit-only form used by the fuzzy fallback, so
/// `"+86 138-0000-0000"` and `"8613800000000"` share a key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PhoneNumber(String);

impl PhoneNumber {
    /// Wrap a raw phone number; it must be non-empty after trimming
    pub fn new(raw: impl Into<String>) -> Result<Self> {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(Error::InvalidPhoneNumber("empty phone number".to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Digit-only form of the number
    pub fn search_key(&self) -> String {
        digits_only(&self.0)
    }

    /// Whether the digit-only form is long enough for a fuzzy match
    pub fn supports_fuzzy_match(&self) -> bool {
        self.search_key().len() >= FUZZY_MIN_DIGITS
    }
}

impl fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Strip every non-digit character
pub fn digits_only(raw: &str) -> String {
    raw.chars().filter(char::is_ascii_digit).collect()
}

/// 1-based page request, clamped to sane bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    page: u32,
    size: u32,
}

impl Pagination {
    pub fn new(page: u32, size: u32) -> Self {
        Self {
            page: page.max(1),
            size: size.clamp(1, MAX_PAGE_SIZE),
        }
    }

    /// 1-based page number
    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    /// Row offset of the first item of the page
    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.size)
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE, DEFAULT_PAGE_SIZE)
    }
}
