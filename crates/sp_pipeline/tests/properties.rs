//! Merge invariants over random collections.

use std::collections::BTreeSet;

use proptest::prelude::*;
use sp_core::{
    CollectionSpec, GeoLevel, GeoRule, GraftField, MergeConfig, RecordCollection, RoundSpec, Table, Value,
};
use sp_pipeline::{merge, MatchState};

const BLOCKS: [&str; 4] = ["060014001001000", "060014001001001", "060014001002000", "060015002001000"];
const SENTINEL: &str = "NA";

#[derive(Clone, Debug)]
struct Row {
    block: usize,
    sex: Option<u8>,
    age: u8,
}

fn row() -> impl Strategy<Value = Row> {
    (0usize..4, prop::option::weighted(0.9, 0u8..2), 0u8..3).prop_map(|(block, sex, age)| Row { block, sex, age })
}

fn collection(prefix: &str, rows: &[Row]) -> RecordCollection {
    let table = Table::from_columns([
        ("id", rows.iter().enumerate().map(|(i, _)| Value::text(format!("{prefix}{i}"))).collect::<Vec<_>>()),
        ("block", rows.iter().map(|r| Value::text(BLOCKS[r.block])).collect()),
        ("sex", rows.iter().map(|r| r.sex.map_or(Value::Null, |s| Value::Int(i64::from(s)))).collect()),
        ("age", rows.iter().map(|r| Value::Int(i64::from(r.age))).collect()),
        ("payload", rows.iter().enumerate().map(|(i, _)| Value::text(format!("{prefix}-payload-{i}"))).collect()),
    ])
    .unwrap();
    RecordCollection::new(table, CollectionSpec::new("id", GeoRule::block_column("block"))).unwrap()
}

fn config(seed: u64) -> MergeConfig {
    MergeConfig::new(
        seed,
        vec![
            RoundSpec::new("exact", &["sex", "age"], GeoLevel::Block).unwrap(),
            RoundSpec::new("age", &["age"], GeoLevel::BlockGroup).unwrap().stop_at(GeoLevel::Tract),
            RoundSpec::new("any", &[], GeoLevel::Tract).unwrap(),
        ],
        vec![GraftField::renamed("payload", "grafted")],
        SENTINEL,
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn merge_invariants(
        p in prop::collection::vec(row(), 0..30),
        d in prop::collection::vec(row(), 0..30),
        seed in any::<u64>(),
    ) {
        let primary = collection("p", &p);
        let donors = collection("d", &d);
        let out = merge(&primary, &donors, &config(seed)).unwrap();

        // cardinality
        prop_assert_eq!(out.primary.len(), primary.len());
        prop_assert_eq!(out.secondary.len(), donors.len());

        // donor exclusivity
        let used: Vec<_> = out.outcomes.iter().filter_map(|o| o.donor.clone()).collect();
        let distinct: BTreeSet<_> = used.iter().collect();
        prop_assert_eq!(used.len(), distinct.len());
        prop_assert_eq!(out.summary.donors_consumed, used.len());

        // exhaustive fallback and grafted values
        let grafted = out.primary.column("grafted").unwrap();
        for (row, o) in out.outcomes.iter().enumerate() {
            match &o.donor {
                Some(k) => {
                    let drow = donors.row_of(k).unwrap();
                    prop_assert_eq!(&grafted[row], &donors.column("payload").unwrap()[drow]);
                }
                None => {
                    prop_assert_eq!(&o.state, &MatchState::ExhaustedAllRounds);
                    prop_assert_eq!(&grafted[row], &Value::text(SENTINEL));
                }
            }
        }

        // monotonic resolution
        for w in out.summary.steps.windows(2) {
            prop_assert!(w[1].pending_before <= w[0].pending_after);
        }
        for s in &out.summary.steps {
            prop_assert_eq!(s.pending_before - s.matched, s.pending_after);
        }

        // one donor per match, one match per record
        prop_assert!(out.summary.matched <= donors.len().min(primary.len()));
    }

    #[test]
    fn reruns_are_identical(
        p in prop::collection::vec(row(), 0..20),
        d in prop::collection::vec(row(), 0..20),
        seed in any::<u64>(),
    ) {
        let primary = collection("p", &p);
        let donors = collection("d", &d);
        let a = merge(&primary, &donors, &config(seed)).unwrap();
        let b = merge(&primary, &donors, &config(seed)).unwrap();
        prop_assert_eq!(a.outcomes, b.outcomes);
        prop_assert_eq!(a.primary.table(), b.primary.table());
        prop_assert_eq!(a.summary, b.summary);
    }

    /// A record whose block had no same-group donor but whose block group did
    /// is matched at the block group.
    #[test]
    fn ladder_is_climbed(age in 0u8..3, seed in any::<u64>()) {
        let primary = collection("p", &[Row { block: 0, sex: Some(1), age }]);
        let donors = collection("d", &[
            Row { block: 0, sex: Some(0), age },
            Row { block: 1, sex: Some(1), age },
        ]);
        let out = merge(&primary, &donors, &config(seed)).unwrap();
        prop_assert_eq!(&out.outcomes[0].state, &MatchState::MatchedInRound { round: 0, level: GeoLevel::BlockGroup });
        prop_assert_eq!(out.outcomes[0].donor.as_ref().map(|k| k.as_str()), Some("d1"));
    }
}
