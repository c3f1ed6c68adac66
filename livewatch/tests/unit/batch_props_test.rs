//! 重複除去と振り分けの性質テスト

use std::collections::HashSet;

use livewatch::common::types::{dedup_preserving_order, ReconcileBatch, VerificationOutcome};
use proptest::prelude::*;

proptest! {
    #[test]
    fn dedup_keeps_first_occurrences_in_order(ids in proptest::collection::vec(-50i32..50, 0..200)) {
        let unique = dedup_preserving_order(&ids);

        let distinct: HashSet<_> = ids.iter().copied().collect();
        prop_assert_eq!(unique.len(), distinct.len());

        let mut seen = HashSet::new();
        let expected: Vec<_> = ids.iter().copied().filter(|id| seen.insert(*id)).collect();
        prop_assert_eq!(unique, expected);
    }

    #[test]
    fn partition_is_disjoint_and_covers_outcomes(
        outcomes in proptest::collection::vec((0i32..100, any::<bool>()), 0..200)
    ) {
        let outcomes: Vec<_> = outcomes
            .into_iter()
            .map(|(object_id, online)| VerificationOutcome { object_id, online })
            .collect();
        let batch = ReconcileBatch::from_outcomes(outcomes.clone());

        let online: HashSet<_> = batch.online.iter().copied().collect();
        let offline: HashSet<_> = batch.offline.iter().copied().collect();
        prop_assert!(online.is_disjoint(&offline));
        prop_assert_eq!(online.len(), batch.online.len());
        prop_assert_eq!(offline.len(), batch.offline.len());

        let input: HashSet<_> = outcomes.iter().map(|o| o.object_id).collect();
        let union: HashSet<_> = online.union(&offline).copied().collect();
        prop_assert_eq!(union, input);
    }

    #[test]
    fn first_outcome_decides_partition(id in 0i32..10, first in any::<bool>()) {
        let batch = ReconcileBatch::from_outcomes([
            VerificationOutcome { object_id: id, online: first },
            VerificationOutcome { object_id: id, online: !first },
        ]);
        prop_assert_eq!(batch.len(), 1);
        prop_assert_eq!(batch.online.contains(&id), first);
    }
}
