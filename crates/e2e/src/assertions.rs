//! Assertion rules for observed DOM values
//!
//! Addresses compare case-insensitively; balances below [`DUST_THRESHOLD`]
//! read as `"0"`.

use serde::{Deserialize, Serialize};

use crate::error::{E2eError, E2eResult};

/// Balances below this are rounding residue of on-chain amounts
pub const DUST_THRESHOLD: f64 = 1e-6;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AssertionOutcome {
    Pass,
    Fail {
        description: String,
        expected: String,
        actual: String,
    },
}

impl AssertionOutcome {
    fn check(ok: bool, description: &str, expected: &str, actual: &str) -> Self {
        if ok {
            AssertionOutcome::Pass
        } else {
            AssertionOutcome::Fail {
                description: description.to_string(),
                expected: expected.to_string(),
                actual: actual.to_string(),
            }
        }
    }

    pub fn is_pass(&self) -> bool {
        matches!(self, AssertionOutcome::Pass)
    }

    pub fn into_result(self) -> E2eResult<()> {
        match self {
            AssertionOutcome::Pass => Ok(()),
            AssertionOutcome::Fail {
                description,
                expected,
                actual,
            } => Err(E2eError::AssertionFailed {
                description,
                expected,
                actual,
            }),
        }
    }
}

/// Parse a displayed number. Blank text reads as zero, as a browser's
/// `Number("")` does; anything unparseable or infinite is `None`.
pub fn parse_number(text: &str) -> Option<f64> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Some(0.0);
    }
    trimmed.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Apply the dust rule: a balance below [`DUST_THRESHOLD`] becomes `"0"`,
/// anything else is returned unchanged.
pub fn normalize_balance(displayed: &str) -> String {
    match parse_number(displayed) {
        Some(value) if value < DUST_THRESHOLD => "0".to_string(),
        _ => displayed.to_string(),
    }
}

pub fn normalize_address(address: &str) -> String {
    address.trim().to_lowercase()
}

pub fn addresses_match(a: &str, b: &str) -> bool {
    normalize_address(a) == normalize_address(b)
}

pub fn assert_text_eq(description: &str, expected: &str, actual: &str) -> AssertionOutcome {
    AssertionOutcome::check(expected.trim() == actual.trim(), description, expected, actual)
}

pub fn assert_contains(description: &str, needle: &str, haystack: &str) -> AssertionOutcome {
    AssertionOutcome::check(haystack.contains(needle), description, needle, haystack)
}

pub fn assert_not_empty(description: &str, actual: &str) -> AssertionOutcome {
    AssertionOutcome::check(!actual.trim().is_empty(), description, "<non-empty>", actual)
}

pub fn assert_address_eq(description: &str, expected: &str, actual: &str) -> AssertionOutcome {
    AssertionOutcome::check(
        addresses_match(expected, actual),
        description,
        &normalize_address(expected),
        &normalize_address(actual),
    )
}

/// Compare a displayed balance with the expected literal after the dust rule.
pub fn assert_balance_eq(expected: &str, displayed: &str) -> AssertionOutcome {
    let normalized = normalize_balance(displayed);
    AssertionOutcome::check(
        normalized.trim() == expected.trim(),
        "token balance",
        expected,
        normalized.trim(),
    )
}

/// After spending, the balance must have dropped or be dust; an unchanged
/// balance means the transaction never landed.
pub fn assert_balance_reduced(before: &str, after: &str) -> AssertionOutcome {
    let normalized = normalize_balance(after);
    let reduced = normalized == "0"
        || matches!(
            (parse_number(before), parse_number(&normalized)),
            (Some(b), Some(a)) if a < b
        );
    AssertionOutcome::check(
        reduced,
        "balance after deposit",
        &format!("< {}", before.trim()),
        normalized.trim(),
    )
}

pub fn assert_visible(description: &str, visible: bool) -> AssertionOutcome {
    AssertionOutcome::check(
        visible,
        description,
        "visible",
        if visible { "visible" } else { "not visible" },
    )
}

pub fn assert_hidden(description: &str, hidden: bool) -> AssertionOutcome {
    AssertionOutcome::check(
        hidden,
        description,
        "not visible",
        if hidden { "not visible" } else { "visible" },
    )
}
