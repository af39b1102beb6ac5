//! Property-based tests for aggregation and resolution.
//!
//! These tests use proptest to verify invariants around:
//! - Aggregation independence from arrival order and shard grouping
//! - Deduplication keeping the minimum under the total order
//! - The severity gate

use crate::test_support::catalog;
use crate::{Finding, FindingSet, resolve};
use complyguard_types::{Coverage, FindingStatus, Location, OverallStatus, RepoPath, Severity};
use proptest::prelude::*;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

const RULES: [&str; 3] = ["AC-001", "EN-001", "MO-001"];

fn arb_status() -> impl Strategy<Value = FindingStatus> {
    prop_oneof![
        Just(FindingStatus::Passed),
        Just(FindingStatus::Failed),
        Just(FindingStatus::Warning),
        Just(FindingStatus::Skipped),
        Just(FindingStatus::Error),
    ]
}

fn arb_severity() -> impl Strategy<Value = Severity> {
    prop::sample::select(Severity::ALL.to_vec())
}

/// Small value spaces so duplicates on `(ruleId, location, status)` are common.
fn arb_finding() -> impl Strategy<Value = Finding> {
    (
        prop::sample::select(RULES.to_vec()),
        prop::option::of((prop::sample::select(vec!["a.py", "b.js"]), prop::option::of(1u32..4))),
        arb_status(),
        prop::sample::select(vec!["pattern_matched", "evaluator_error"]),
        prop::sample::select(vec!["m1", "m2"]),
        prop::option::of(prop::sample::select(vec!["e1", "e2"])),
    )
        .prop_map(|(rule, loc, status, code, message, evidence)| {
            let mut f = Finding::new(rule, code, status, message);
            f.location = loc.map(|(path, line)| Location {
                path: RepoPath::new(path),
                line,
            });
            f.evidence = evidence.map(str::to_string);
            f
        })
}

proptest! {
    #[test]
    fn aggregate_is_independent_of_arrival_order(
        findings in prop::collection::vec(arb_finding(), 0..40),
        seed in any::<u64>(),
    ) {
        let mut shuffled = findings.clone();
        shuffled.shuffle(&mut StdRng::seed_from_u64(seed));

        let a: FindingSet = findings.into_iter().collect();
        let b: FindingSet = shuffled.into_iter().collect();
        prop_assert_eq!(a.into_vec(), b.into_vec());
    }

    #[test]
    fn merge_is_commutative_and_associative(
        x in prop::collection::vec(arb_finding(), 0..15),
        y in prop::collection::vec(arb_finding(), 0..15),
        z in prop::collection::vec(arb_finding(), 0..15),
    ) {
        let set = |v: &Vec<Finding>| v.iter().cloned().collect::<FindingSet>();
        let left = set(&x).merge(set(&y)).merge(set(&z));
        let right = set(&z).merge(set(&y).merge(set(&x)));
        prop_assert_eq!(left, right);
    }

    #[test]
    fn dedup_keeps_the_minimum(findings in prop::collection::vec(arb_finding(), 1..30)) {
        let set: FindingSet = findings.iter().cloned().collect();
        for kept in set.iter() {
            let min = findings
                .iter()
                .filter(|f| f.rule_id == kept.rule_id && f.location == kept.location && f.status == kept.status)
                .min()
                .expect("kept finding came from the input");
            prop_assert_eq!(kept, min);
        }
    }

    #[test]
    fn output_is_sorted(findings in prop::collection::vec(arb_finding(), 0..40)) {
        let out = findings.into_iter().collect::<FindingSet>().into_vec();
        prop_assert!(out.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn severity_gate_iff(
        findings in prop::collection::vec(arb_finding(), 0..25),
        severities in prop::collection::vec(arb_severity(), 3),
    ) {
        let cat = catalog(&[
            (RULES[0], severities[0]),
            (RULES[1], severities[1]),
            (RULES[2], severities[2]),
        ]);
        let set: FindingSet = findings.iter().cloned().collect();
        let res = resolve(&cat, &set, &Coverage::default());

        let gating_failure = findings.iter().any(|f| {
            let idx = RULES.iter().position(|r| *r == f.rule_id).expect("known rule");
            f.status == FindingStatus::Failed && severities[idx].is_gating()
        });
        let expected = if gating_failure { OverallStatus::Failed } else { OverallStatus::Passed };
        prop_assert_eq!(res.overall, expected);
        prop_assert_eq!(res.summary.total as usize, res.findings.len());
    }
}
