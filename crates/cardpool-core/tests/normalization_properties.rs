//! Property tests for phone-number and status-code normalization.

use cardpool_core::PhoneNumber;
use cardpool_core::status::{StatusCode, UNKNOWN_STATUS, translate};
use proptest::prelude::*;

proptest! {
    #[test]
    fn search_key_contains_only_digits(raw in "\\PC{1,40}") {
        if let Ok(phone) = PhoneNumber::new(raw) {
            prop_assert!(phone.search_key().chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn formatting_noise_does_not_change_search_key(
        digits in "[0-9]{11}",
        sep in prop::sample::select(vec![" ", "-", ".", ""]),
    ) {
        let noisy = format!("+86 {}{}{}{}{}", &digits[..3], sep, &digits[3..7], sep, &digits[7..]);
        let noisy = PhoneNumber::new(noisy).unwrap();
        let plain = PhoneNumber::new(digits.clone()).unwrap();
        prop_assert_eq!(noisy.search_key(), format!("86{}", digits));
        prop_assert!(noisy.search_key().contains(&plain.search_key()));
    }

    #[test]
    fn translate_never_panics(raw in "\\PC{0,16}") {
        let message = translate(&raw);
        prop_assert!(!message.is_empty());
    }

    #[test]
    fn normalized_codes_are_stable(value in 0u32..=u32::MAX) {
        let code = StatusCode::parse(&format!("{:x}", value)).unwrap();
        prop_assert_eq!(code.as_str().len(), 10);
        let again = StatusCode::parse(code.as_str()).unwrap();
        prop_assert_eq!(&again, &code);
    }

    #[test]
    fn prefix_spelling_is_irrelevant(value in 0u32..=0x0fff_ffff) {
        let bare = translate(&format!("{:x}", value));
        let prefixed = translate(&format!("0X{:08X}", value));
        prop_assert_eq!(bare, prefixed);
        if bare != UNKNOWN_STATUS {
            let hex = format!("{:x}", value);
            prop_assert!(StatusCode::parse(&hex).unwrap().message().is_some());
        }
    }
}
