use chrono::{Datelike, Duration, NaiveDate};
use household_energy_forecast::domain::{
    season_interval_for, season_of, year_season_of, Season, YearSeason,
};
use proptest::prelude::*;

fn date_strategy() -> impl Strategy<Value = NaiveDate> {
    (1900i32..2200, 0i64..366).prop_map(|(year, offset)| {
        NaiveDate::from_ymd_opt(year, 1, 1).unwrap() + Duration::days(offset)
    })
}

proptest! {
    #[test]
    fn prop_exactly_one_season_contains_each_date(date in date_strategy()) {
        let containing: Vec<Season> = Season::ALL
            .into_iter()
            .filter(|s| season_interval_for(*s, date).is_some_and(|iv| iv.contains(date)))
            .collect();
        prop_assert_eq!(containing.len(), 1);
        prop_assert_eq!(containing[0], season_of(date));
    }

    #[test]
    fn prop_reference_year_intervals_tile_the_year(year in 1900i32..2200) {
        // Spring..fall of `year` plus the winter starting in `year` cover
        // 21 March of `year` up to 20 March of the next year.
        let intervals: Vec<_> = Season::ALL
            .into_iter()
            .map(|s| s.interval(year).unwrap())
            .collect();
        for pair in intervals.windows(2) {
            prop_assert_eq!(pair[0].end + Duration::days(1), pair[1].start);
        }
        let total: i64 = intervals.iter().map(|iv| iv.days()).sum();
        let next_spring = Season::Spring.interval(year + 1).unwrap().start;
        prop_assert_eq!(total, (next_spring - intervals[0].start).num_days());
    }

    #[test]
    fn prop_year_season_key_round_trips(date in date_strategy()) {
        let key = year_season_of(date);
        prop_assert_eq!(key.year, date.year());
        prop_assert_eq!(key.to_string().parse::<YearSeason>().unwrap(), key);
    }
}

#[test]
fn test_winter_seam_shares_one_interval() {
    for year in [2006, 2007, 2011, 2019] {
        let christmas = NaiveDate::from_ymd_opt(year, 12, 25).unwrap();
        let mid_january = NaiveDate::from_ymd_opt(year + 1, 1, 15).unwrap();

        assert_eq!(season_of(christmas), Season::Winter);
        assert_eq!(season_of(mid_january), Season::Winter);
        assert_eq!(
            season_interval_for(Season::Winter, christmas),
            season_interval_for(Season::Winter, mid_january)
        );
        assert_eq!(
            season_interval_for(Season::Winter, christmas),
            Season::Winter.interval(year)
        );
    }
}

#[test]
fn test_boundary_days() {
    let cases = [
        ((3, 20), Season::Winter),
        ((3, 21), Season::Spring),
        ((6, 20), Season::Spring),
        ((6, 21), Season::Summer),
        ((9, 22), Season::Summer),
        ((9, 23), Season::Fall),
        ((12, 20), Season::Fall),
        ((12, 21), Season::Winter),
    ];
    for ((month, day), expected) in cases {
        let date = NaiveDate::from_ymd_opt(2008, month, day).unwrap();
        assert_eq!(season_of(date), expected, "{date}");
    }
}
