//! Go/no-go status values and the reducer shared by every report level.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Outcome of a check, a team, or a whole report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Status {
    /// Passed.
    #[serde(rename = "GO")]
    Go,
    /// Passed with a soft problem worth reporting.
    #[serde(rename = "WARN")]
    Warn,
    /// Failed; blocks the release.
    #[serde(rename = "NO-GO")]
    NoGo,
    /// Not evaluated.
    #[serde(rename = "SKIP")]
    Skip,
}

impl Status {
    /// Precedence rank. `Skip` has none and only wins when nothing else is present.
    fn rank(self) -> Option<u8> {
        match self {
            Status::Skip => None,
            Status::Go => Some(0),
            Status::Warn => Some(1),
            Status::NoGo => Some(2),
        }
    }

    /// Combines two statuses: `NoGo > Warn > Go`, with `Skip` as the identity.
    pub fn combine(self, other: Status) -> Status {
        match (self.rank(), other.rank()) {
            (None, _) => other,
            (_, None) => self,
            (Some(a), Some(b)) if b > a => other,
            _ => self,
        }
    }

    /// Returns true when a release may proceed. `Skip` means nothing was
    /// evaluated, which never counts as a pass.
    pub fn is_go(self) -> bool {
        matches!(self, Status::Go | Status::Warn)
    }

    /// Label used in reports.
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Go => "GO",
            Status::Warn => "WARN",
            Status::NoGo => "NO-GO",
            Status::Skip => "SKIP",
        }
    }

    /// Icon used in text reports.
    pub fn icon(self) -> &'static str {
        match self {
            Status::Go => "\u{1F7E2}",
            Status::Warn => "\u{1F7E1}",
            Status::NoGo => "\u{1F534}",
            Status::Skip => "\u{26AA}",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reduces a sequence of statuses to one.
///
/// An empty or all-`Skip` sequence yields `Skip`. Otherwise `Skip` entries are
/// ignored and the highest of `NoGo > Warn > Go` wins.
pub fn aggregate<I>(statuses: I) -> Status
where
    I: IntoIterator<Item = Status>,
{
    statuses.into_iter().fold(Status::Skip, Status::combine)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn any_status() -> impl Strategy<Value = Status> {
        prop_oneof![
            Just(Status::Go),
            Just(Status::Warn),
            Just(Status::NoGo),
            Just(Status::Skip),
        ]
    }

    #[test]
    fn empty_is_skip() {
        assert_eq!(aggregate(Vec::new()), Status::Skip);
    }

    #[test]
    fn all_skip_is_skip() {
        assert_eq!(aggregate([Status::Skip, Status::Skip]), Status::Skip);
    }

    #[test]
    fn skip_is_ignored_next_to_real_results() {
        assert_eq!(aggregate([Status::Skip, Status::Go]), Status::Go);
        assert_eq!(aggregate([Status::Warn, Status::Skip]), Status::Warn);
    }

    #[test]
    fn no_go_beats_warn_beats_go() {
        assert_eq!(aggregate([Status::Go, Status::Warn]), Status::Warn);
        assert_eq!(
            aggregate([Status::Go, Status::NoGo, Status::Warn]),
            Status::NoGo
        );
        assert_eq!(aggregate([Status::Go, Status::Go]), Status::Go);
    }

    #[test]
    fn only_go_and_warn_permit_release() {
        assert!(Status::Go.is_go());
        assert!(Status::Warn.is_go());
        assert!(!Status::Skip.is_go());
        assert!(!Status::NoGo.is_go());
    }

    #[test]
    fn serializes_with_report_labels() {
        assert_eq!(serde_json::to_string(&Status::NoGo).unwrap(), "\"NO-GO\"");
        assert_eq!(serde_json::to_string(&Status::Go).unwrap(), "\"GO\"");
        let parsed: Status = serde_json::from_str("\"SKIP\"").unwrap();
        assert_eq!(parsed, Status::Skip);
    }

    proptest! {
        #[test]
        fn aggregate_is_order_independent(mut statuses in proptest::collection::vec(any_status(), 0..12)) {
            let forward = aggregate(statuses.clone());
            statuses.reverse();
            prop_assert_eq!(forward, aggregate(statuses));
        }

        #[test]
        fn aggregate_of_parts_equals_aggregate_of_whole(
            left in proptest::collection::vec(any_status(), 0..8),
            right in proptest::collection::vec(any_status(), 0..8),
        ) {
            let whole = aggregate(left.iter().chain(right.iter()).copied());
            let parts = aggregate([aggregate(left), aggregate(right)]);
            prop_assert_eq!(whole, parts);
        }

        #[test]
        fn combine_is_commutative_and_associative(a in any_status(), b in any_status(), c in any_status()) {
            prop_assert_eq!(a.combine(b), b.combine(a));
            prop_assert_eq!(a.combine(b).combine(c), a.combine(b.combine(c)));
        }
    }
}
