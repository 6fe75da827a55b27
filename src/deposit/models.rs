//! Deposit data models and memo tag parsing.

use crate::ledger::UserId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Nanounits per whole unit of the external currency.
pub const NANO: f64 = 1e9;

/// An inbound transaction as reported by the feed, before reconciliation.
#[derive(Debug, Clone, PartialEq)]
pub struct DepositCandidate {
    pub tx_id: String,
    pub memo: String,
    pub value_nano: i64,
}

impl DepositCandidate {
    /// External amount in whole units.
    pub fn external_amount(&self) -> f64 {
        self.value_nano as f64 / NANO
    }
}

/// A credited deposit, recorded durably for the audit trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepositRecord {
    pub tx_id: String,
    pub user_id: UserId,
    pub external_amount: f64,
    pub credited_coins: i64,
    pub note: String,
    pub seen_at: DateTime<Utc>,
}

/// Extract the user tag from a deposit memo.
///
/// The tag is the literal `ID` followed by 5 to 15 digits, anywhere in the
/// memo. A longer digit run does not match; the first well-formed tag wins.
pub fn parse_user_tag(memo: &str) -> Option<UserId> {
    let bytes = memo.as_bytes();
    let mut i = 0;
    while i + 2 < bytes.len() {
        if &bytes[i..i + 2] == b"ID" {
            let digits_start = i + 2;
            let mut end = digits_start;
            while end < bytes.len() && bytes[end].is_ascii_digit() {
                end += 1;
            }
            let len = end - digits_start;
            if (5..=15).contains(&len) {
                if let Ok(uid) = memo[digits_start..end].parse() {
                    return Some(uid);
                }
            }
            i = end.max(i + 1);
        } else {
            i += 1;
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_is_found_anywhere_in_the_memo() {
        assert_eq!(parse_user_tag("ID123456789"), Some(123456789));
        assert_eq!(parse_user_tag("deposit for ID54321, thanks"), Some(54321));
        assert_eq!(parse_user_tag("prefix ID12345"), Some(12345));
    }

    #[test]
    fn tag_digit_count_is_bounded() {
        assert_eq!(parse_user_tag("ID1234"), None);
        assert_eq!(parse_user_tag("ID123456789012345"), Some(123456789012345));
        assert_eq!(parse_user_tag("ID1234567890123456"), None);
    }

    #[test]
    fn malformed_memos_yield_nothing() {
        assert_eq!(parse_user_tag(""), None);
        assert_eq!(parse_user_tag("no tag here"), None);
        assert_eq!(parse_user_tag("id12345"), None);
        assert_eq!(parse_user_tag("ID"), None);
    }

    #[test]
    fn first_well_formed_tag_wins() {
        assert_eq!(parse_user_tag("ID12 then ID67890"), Some(67890));
        assert_eq!(parse_user_tag("ID11111 and ID22222"), Some(11111));
    }

    #[test]
    fn external_amount_converts_from_nano() {
        let candidate = DepositCandidate {
            tx_id: "t".to_string(),
            memo: String::new(),
            value_nano: 1_500_000_000,
        };
        assert!((candidate.external_amount() - 1.5).abs() < f64::EPSILON);
    }
}
