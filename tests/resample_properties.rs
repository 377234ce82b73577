use chrono::{Duration, NaiveDate, NaiveDateTime};
use household_energy_forecast::domain::{Channel, Frequency, Table};
use household_energy_forecast::resample::resample;
use household_energy_forecast::seasons::aggregate_by_season;
use proptest::prelude::*;

fn table_strategy() -> impl Strategy<Value = Table> {
    prop::collection::vec((1i64..600, -50.0f64..50.0, 0.0f64..10.0), 1..80).prop_map(|steps| {
        let start = NaiveDate::from_ymd_opt(2007, 11, 20)
            .unwrap()
            .and_hms_opt(6, 0, 0)
            .unwrap();
        let mut ts = start;
        let mut index: Vec<NaiveDateTime> = Vec::new();
        let mut residual = Vec::new();
        let mut kitchen = Vec::new();
        for (gap, r, k) in steps {
            ts += Duration::minutes(gap * 97);
            index.push(ts);
            residual.push(r);
            kitchen.push(k);
        }
        Table::new(index)
            .with_column(Channel::NotSubMetering, residual)
            .unwrap()
            .with_column(Channel::SubMetering1, kitchen)
            .unwrap()
    })
}

fn frequency_strategy() -> impl Strategy<Value = Frequency> {
    prop::sample::select(vec!["H", "3H", "D", "W", "M", "2M"])
        .prop_map(|alias| alias.parse::<Frequency>().unwrap())
}

proptest! {
    #[test]
    fn prop_resample_never_grows_and_means_stay_in_range(
        table in table_strategy(),
        frequency in frequency_strategy(),
    ) {
        let out = resample(&table, frequency).unwrap().into_inner();
        prop_assert!(out.len() <= table.len());

        let origin = frequency.origin(table.index()[0]);
        for (row, start) in out.index().iter().enumerate() {
            let members: Vec<usize> = (0..table.len())
                .filter(|&i| {
                    frequency.bucket_start(origin, frequency.bucket(origin, table.index()[i])).unwrap()
                        == *start
                })
                .collect();
            prop_assert!(!members.is_empty());
            for channel in [Channel::NotSubMetering, Channel::SubMetering1] {
                let values: Vec<f64> = members.iter().map(|&i| table.value(i, channel).unwrap()).collect();
                let lo = values.iter().cloned().fold(f64::INFINITY, f64::min);
                let hi = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
                let mean = out.value(row, channel).unwrap();
                prop_assert!(mean >= lo - 1e-9 && mean <= hi + 1e-9);
            }
        }
    }

    #[test]
    fn prop_resample_is_repeatable(table in table_strategy(), frequency in frequency_strategy()) {
        let first = resample(&table, frequency).unwrap();
        let second = resample(&table, frequency).unwrap();
        prop_assert_eq!(first.value, second.value);
        prop_assert_eq!(first.warnings, second.warnings);
    }

    #[test]
    fn prop_seasonal_sums_equal_table_sums(table in table_strategy()) {
        let seasons = aggregate_by_season(&table).into_inner();
        let rows: usize = seasons.rows.iter().map(|r| r.count).sum();
        prop_assert_eq!(rows, table.len());
        for channel in [Channel::NotSubMetering, Channel::SubMetering1] {
            let expected = table.column_sum(channel).unwrap();
            prop_assert!((seasons.total(channel) - expected).abs() < 1e-6);
        }
    }
}
