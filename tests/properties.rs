use agro_report::{
    clean,
    dataset::{Dataset, MAX_PRODUCTIVITY, MIN_PRODUCTIVITY, Record},
    stats::{self, SummaryStats},
    validate::{DiagnosticKind, ValidationReport},
};
use proptest::prelude::*;

fn productivity() -> impl Strategy<Value = Option<f64>> {
    prop_oneof![
        8 => (-50.0f64..80.0).prop_map(Some),
        1 => Just(Some(f64::NAN)),
        1 => Just(None),
    ]
}

fn culture() -> impl Strategy<Value = Option<String>> {
    prop_oneof![
        Just(Some("Soja".to_string())),
        Just(Some("Milho".to_string())),
        Just(Some("Feijão".to_string())),
        Just(None),
    ]
}

fn dataset() -> impl Strategy<Value = Dataset> {
    proptest::collection::vec((productivity(), culture()), 0..60).prop_map(|rows| {
        let records = rows
            .into_iter()
            .map(|(produtividade_t_ha, cultura)| Record {
                produtividade_t_ha,
                cultura,
                ..Record::default()
            })
            .collect();
        Dataset::with_all_columns(records)
    })
}

proptest! {
    #[test]
    fn cleaned_values_are_present_and_in_range(input in dataset()) {
        let mut report = ValidationReport::new();
        let (cleaned, _) = clean::clean(input, &mut report);
        for record in &cleaned.records {
            let value = record.productivity();
            prop_assert!(value.is_some());
            let value = value.unwrap_or_default();
            prop_assert!((MIN_PRODUCTIVITY..=MAX_PRODUCTIVITY).contains(&value));
        }
    }

    #[test]
    fn cleaning_is_idempotent(input in dataset()) {
        let mut report = ValidationReport::new();
        let (once, _) = clean::clean(input, &mut report);
        let mut second = ValidationReport::new();
        let (twice, summary) = clean::clean(once.clone(), &mut second);
        prop_assert!(summary.is_noop());
        prop_assert_eq!(twice.records, once.records);
        prop_assert_eq!(second.latest_count(DiagnosticKind::MissingValues), Some(0));
        prop_assert_eq!(second.latest_count(DiagnosticKind::OutOfRange), Some(0));
    }

    #[test]
    fn cleaning_accounts_for_every_record(input in dataset()) {
        let before = input.len();
        let mut report = ValidationReport::new();
        let (cleaned, summary) = clean::clean(input, &mut report);
        prop_assert_eq!(cleaned.len() + summary.dropped, before);
        prop_assert_eq!(report.latest_count(DiagnosticKind::MissingValues), Some(summary.dropped));
        prop_assert_eq!(report.latest_count(DiagnosticKind::OutOfRange), Some(summary.clipped));
    }

    #[test]
    fn quantiles_are_ordered(values in proptest::collection::vec(0.0f64..20.0, 1..80)) {
        let stats = SummaryStats::from_values(&values);
        let ordered = [stats.min, stats.q1, stats.median, stats.q3, stats.max]
            .into_iter()
            .map(|v| v.unwrap_or(f64::NAN))
            .collect::<Vec<_>>();
        for pair in ordered.windows(2) {
            prop_assert!(pair[0] <= pair[1], "{:?}", ordered);
        }
        prop_assert_eq!(stats.count, values.len());
        prop_assert_eq!(stats.std_dev.is_some(), values.len() >= 2);
    }

    #[test]
    fn group_counts_sum_to_global_count(input in dataset()) {
        let mut report = ValidationReport::new();
        let (cleaned, _) = clean::clean(input, &mut report);
        let summary = stats::summarize(&cleaned, &mut report);
        let global = summary.global.map(|g| g.count).unwrap_or_default();
        let groups = summary.by_culture.unwrap_or_default();
        prop_assert_eq!(groups.iter().map(|g| g.stats.count).sum::<usize>(), global);
        prop_assert_eq!(global, cleaned.len());

        let mut keys = groups.iter().map(|g| g.group_key.clone()).collect::<Vec<_>>();
        keys.sort();
        keys.dedup();
        prop_assert_eq!(keys.len(), groups.len());
    }

    #[test]
    fn single_record_group_collapses_to_its_value(value in 0.0f64..20.0) {
        let stats = SummaryStats::from_values(&[value]);
        prop_assert_eq!(stats.mean, Some(value));
        prop_assert_eq!(stats.median, Some(value));
        prop_assert_eq!(stats.min, Some(value));
        prop_assert_eq!(stats.max, Some(value));
        prop_assert_eq!(stats.std_dev, None);
    }
}
