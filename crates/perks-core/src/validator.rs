// ── Field validation ──
//
// Pure checks that accumulate one message per field. Only the first
// failure recorded for a field is kept.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::CoreError;
use crate::model::Voucher;

#[allow(clippy::unwrap_used)] // literal pattern, covered by `email_rules`
static EMAIL_RX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$",
    )
    .unwrap()
});

pub const MAX_CODE_LEN: usize = 20;
pub const MAX_DESCRIPTION_LEN: usize = 500;
pub const MAX_NAME_BYTES: usize = 500;
pub const MIN_PASSWORD_BYTES: usize = 8;
pub const MAX_PASSWORD_BYTES: usize = 72;
pub const MAX_PAGE_SIZE: u32 = 100;

/// Accumulates field errors.
#[derive(Debug, Default)]
pub struct Validator {
    errors: BTreeMap<String, String>,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Record `message` for `field` unless the field already has an error.
    pub fn add_error(&mut self, field: &str, message: &str) {
        self.errors
            .entry(field.to_owned())
            .or_insert_with(|| message.to_owned());
    }

    pub fn check(&mut self, ok: bool, field: &str, message: &str) {
        if !ok {
            self.add_error(field, message);
        }
    }

    pub fn errors(&self) -> &BTreeMap<String, String> {
        &self.errors
    }

    /// `Ok(())` if no errors were recorded, else `ValidationFailed`.
    pub fn finish(self) -> Result<(), CoreError> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(CoreError::ValidationFailed {
                errors: self.errors,
            })
        }
    }
}

pub fn validate_email(v: &mut Validator, email: &str) {
    v.check(!email.is_empty(), "email", "must be provided");
    v.check(EMAIL_RX.is_match(email), "email", "must be a valid email address");
}

pub fn validate_password(v: &mut Validator, password: &str) {
    v.check(!password.is_empty(), "password", "must be provided");
    v.check(
        password.len() >= MIN_PASSWORD_BYTES,
        "password",
        "must be at least 8 bytes long",
    );
    v.check(
        password.len() <= MAX_PASSWORD_BYTES,
        "password",
        "must not be more than 72 bytes long",
    );
}

pub fn validate_name(v: &mut Validator, name: &str) {
    v.check(!name.is_empty(), "name", "must be provided");
    v.check(
        name.len() <= MAX_NAME_BYTES,
        "name",
        "must not be more than 500 bytes long",
    );
}

pub fn validate_points(v: &mut Validator, points: i64) {
    v.check(points >= 0, "points", "must be a positive integer");
}

pub fn validate_code(v: &mut Validator, code: &str) {
    v.check(!code.is_empty(), "code", "must be provided");
    v.check(
        code.chars().count() <= MAX_CODE_LEN,
        "code",
        "must not be more than 20 characters long",
    );
    v.check(
        code.chars().all(|c| c.is_ascii_alphanumeric()),
        "code",
        "must contain only letters and digits",
    );
}

pub fn validate_voucher(v: &mut Validator, voucher: &Voucher) {
    validate_code(v, &voucher.code);

    v.check(
        !voucher.description.is_empty(),
        "description",
        "must be provided",
    );
    v.check(
        voucher.description.chars().count() <= MAX_DESCRIPTION_LEN,
        "description",
        "must not be more than 500 characters long",
    );

    v.check(voucher.discount >= 0, "discount", "must be a positive number");
    v.check(voucher.discount <= 100, "discount", "must not be more than 100");

    v.check(
        voucher.usage_limit >= 0,
        "usage_limit",
        "must be a positive number",
    );
    v.check(voucher.min_spend >= 0, "min_spend", "must be a positive number");

    v.check(
        voucher.starts < voucher.expires,
        "starts",
        "must be before the expiry date",
    );
}

/// Page size within `1..=100` and `sort` drawn from `safelist`.
pub fn validate_page(v: &mut Validator, page_size: u32, sort: &str, safelist: &[&str]) {
    v.check(page_size > 0, "page_size", "must be greater than 0");
    v.check(
        page_size <= MAX_PAGE_SIZE,
        "page_size",
        "must be a maximum of 100",
    );
    v.check(safelist.contains(&sort), "sort", "invalid sort value");
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::{Duration, Utc};

    use super::*;

    fn voucher() -> Voucher {
        let now = Utc::now();
        Voucher {
            code: "SAVE10".into(),
            created_at: now,
            updated_at: now,
            description: "Ten percent off".into(),
            discount: 10,
            is_percentage: true,
            starts: now,
            expires: now + Duration::days(30),
            active: true,
            usage_limit: 1,
            usage_count: 0,
            min_spend: 0,
            category: String::new(),
        }
    }

    #[test]
    fn keeps_first_error_per_field() {
        let mut v = Validator::new();
        v.add_error("email", "must be provided");
        v.add_error("email", "must be a valid email address");
        assert_eq!(v.errors()["email"], "must be provided");
    }

    #[test]
    fn accepts_a_well_formed_voucher() {
        let mut v = Validator::new();
        validate_voucher(&mut v, &voucher());
        assert!(v.valid(), "{:?}", v.errors());
    }

    #[test]
    fn rejects_voucher_field_by_field() {
        let mut bad = voucher();
        bad.code = "X".repeat(21);
        bad.description = String::new();
        bad.discount = 101;
        bad.usage_limit = -1;
        bad.expires = bad.starts;

        let mut v = Validator::new();
        validate_voucher(&mut v, &bad);
        let fields: Vec<_> = v.errors().keys().map(String::as_str).collect();
        assert_eq!(
            fields,
            ["code", "description", "discount", "starts", "usage_limit"]
        );
    }

    #[test]
    fn code_must_be_alphanumeric() {
        let mut v = Validator::new();
        validate_code(&mut v, "SAVE-10");
        assert!(!v.valid());
    }

    #[test]
    fn email_rules() {
        for (email, ok) in [
            ("alice@example.com", true),
            ("a.b+tag@sub.example.org", true),
            ("", false),
            ("no-at-sign", false),
            ("two@@example.com", false),
        ] {
            let mut v = Validator::new();
            validate_email(&mut v, email);
            assert_eq!(v.valid(), ok, "{email}");
        }
    }

    #[test]
    fn password_length_is_in_bytes() {
        let mut v = Validator::new();
        validate_password(&mut v, "short");
        assert!(!v.valid());

        let mut v = Validator::new();
        validate_password(&mut v, &"p".repeat(73));
        assert!(!v.valid());

        let mut v = Validator::new();
        validate_password(&mut v, "correct horse");
        assert!(v.valid());
    }

    #[test]
    fn page_bounds_and_safelist() {
        let safelist = ["code", "-code"];
        let mut v = Validator::new();
        validate_page(&mut v, 0, "code", &safelist);
        validate_page(&mut v, 101, "name", &safelist);
        assert_eq!(v.errors().len(), 2);

        let mut v = Validator::new();
        validate_page(&mut v, 100, "-code", &safelist);
        assert!(v.valid());
    }

    #[test]
    fn finish_wraps_errors() {
        let mut v = Validator::new();
        validate_points(&mut v, -5);
        let err = v.finish().unwrap_err();
        assert_eq!(
            err.field_errors().unwrap()["points"],
            "must be a positive integer"
        );
    }
}
