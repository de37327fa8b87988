//! Human-readable batch numbers: `<PREFIX>-<REF>-<YYYYMMDD>-<SEQ>`.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use stockfifo_core::{DomainError, DomainResult, ValueObject};

/// Unique, human-readable batch number.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BatchNumber(String);

impl BatchNumber {
    pub fn new(value: impl Into<String>) -> DomainResult<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(DomainError::validation("batch number cannot be empty"));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl ValueObject for BatchNumber {}

impl core::fmt::Display for BatchNumber {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// The per-product, per-day namespace a sequence number is allocated in.
///
/// Sequences are scoped to the scope string, so two products (or two days)
/// never compete for the same counter.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BatchNumberScope(String);

impl BatchNumberScope {
    /// `ref_chars` leading alphanumeric characters of the product reference
    /// are kept, upper-cased.
    pub fn new(
        prefix: &str,
        product_reference: &str,
        ref_chars: usize,
        date: NaiveDate,
    ) -> DomainResult<Self> {
        if prefix.trim().is_empty() {
            return Err(DomainError::validation("batch prefix cannot be empty"));
        }
        let code: String = product_reference
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .take(ref_chars)
            .collect::<String>()
            .to_ascii_uppercase();
        if code.is_empty() {
            return Err(DomainError::validation(format!(
                "product reference '{product_reference}' has no usable characters for a batch number"
            )));
        }

        Ok(Self(format!("{}-{}-{}", prefix.trim(), code, date.format("%Y%m%d"))))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn number(&self, sequence: u32) -> BatchNumber {
        BatchNumber(format!("{}-{:04}", self.0, sequence))
    }

    /// Sequence component of `number`, if it was allocated in this scope.
    pub fn sequence_of(&self, number: &BatchNumber) -> Option<u32> {
        number
            .as_str()
            .strip_prefix(self.0.as_str())?
            .strip_prefix('-')?
            .parse()
            .ok()
    }

    /// Next free sequence given the numbers already allocated.
    pub fn next_sequence<'a>(
        &self,
        existing: impl IntoIterator<Item = &'a BatchNumber>,
    ) -> DomainResult<u32> {
        match existing.into_iter().filter_map(|n| self.sequence_of(n)).max() {
            None => Ok(1),
            Some(max) => self.after(max),
        }
    }

    /// Sequence following `sequence`, or an error once the scope is exhausted.
    pub fn after(&self, sequence: u32) -> DomainResult<u32> {
        sequence.checked_add(1).ok_or_else(|| {
            DomainError::validation(format!("batch number sequence exhausted for {}", self.0))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 18).unwrap()
    }

    #[test]
    fn formats_prefix_reference_date_and_padded_sequence() {
        let scope = BatchNumberScope::new("LOT", "prod-001", 4, day()).unwrap();
        assert_eq!(scope.as_str(), "LOT-PROD-20261018");
        assert_eq!(scope.number(7).as_str(), "LOT-PROD-20261018-0007");
    }

    #[test]
    fn short_references_are_kept_whole() {
        let scope = BatchNumberScope::new("LOT", "ab", 4, day()).unwrap();
        assert_eq!(scope.number(1).as_str(), "LOT-AB-20261018-0001");
    }

    #[test]
    fn next_sequence_ignores_other_scopes() {
        let scope = BatchNumberScope::new("LOT", "PROD", 4, day()).unwrap();
        let other_day = BatchNumberScope::new("LOT", "PROD", 4, day().succ_opt().unwrap()).unwrap();

        let existing = vec![scope.number(1), scope.number(3), other_day.number(9)];
        assert_eq!(scope.next_sequence(&existing).unwrap(), 4);
        assert_eq!(other_day.next_sequence(&existing).unwrap(), 10);
    }

    #[test]
    fn empty_scope_starts_at_one() {
        let scope = BatchNumberScope::new("LOT", "PROD", 4, day()).unwrap();
        assert_eq!(scope.next_sequence(std::iter::empty()).unwrap(), 1);
    }

    #[test]
    fn exhausted_scope_is_rejected_instead_of_reusing_the_last_number() {
        let scope = BatchNumberScope::new("LOT", "PROD", 4, day()).unwrap();
        let existing = vec![scope.number(u32::MAX)];

        let err = scope.next_sequence(&existing).unwrap_err();
        assert!(matches!(err, DomainError::Validation(ref msg) if msg.contains("exhausted")));
        assert_eq!(scope.after(u32::MAX - 1).unwrap(), u32::MAX);
    }

    #[test]
    fn unusable_reference_is_rejected() {
        let err = BatchNumberScope::new("LOT", "--", 4, day()).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }
}
