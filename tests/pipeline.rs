//! End-to-end runs: a delimited file on disk through the engine's views.

use approx::assert_relative_eq;
use chrono::{Datelike, Months, NaiveDate};
use household_energy_forecast::domain::{Channel, Frequency, MeterSelection, Season};
use household_energy_forecast::forecast::{ForecastError, SearchBounds};
use household_energy_forecast::seasons::{SeasonGrouping, SeasonalSummary};
use household_energy_forecast::{Config, DataWarning, Engine, EngineError, View, ViewRequest};
use std::f64::consts::PI;
use std::io::Write;
use tempfile::NamedTempFile;

const HEADER: &str = "Date;Time;Global_active_power;Global_reactive_power;Voltage;Global_intensity;Sub_metering_1;Sub_metering_2;Sub_metering_3";

fn write_source(rows: &[String]) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "{HEADER}").unwrap();
    for row in rows {
        writeln!(file, "{row}").unwrap();
    }
    file.flush().unwrap();
    file
}

fn row(date: NaiveDate, time: &str, active: &str, voltage: &str, sub1: f64) -> String {
    format!(
        "{}/{}/{};{};{};0.100;{};10.000;{:.3};0.000;0.000",
        date.day(),
        date.month(),
        date.year(),
        time,
        active,
        voltage,
        sub1
    )
}

fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[test]
fn test_hourly_means_from_minute_rows() {
    let d = day(2007, 1, 1);
    let file = write_source(&[
        row(d, "00:00:00", "1.0", "240", 1.0),
        row(d, "00:30:00", "1.0", "240", 2.0),
        row(d, "01:00:00", "1.0", "240", 3.0),
        row(d, "01:30:00", "1.0", "240", 4.0),
    ]);
    let engine = Engine::from_path(file.path(), Config::default()).unwrap();

    let view = engine
        .render(&ViewRequest::AllData {
            frequency: Frequency::HOURLY,
            meters: MeterSelection::AllMeters,
        })
        .unwrap();
    let View::AllData(outcome) = view else {
        panic!("expected all-data view");
    };
    let table = outcome.value.table;
    assert_eq!(table.len(), 2);
    assert_eq!(table.column(Channel::SubMetering1).unwrap(), &[1.5, 3.5]);
    assert_eq!(table.column(Channel::SubMetering2).unwrap(), &[0.0, 0.0]);
    assert!(table.column(Channel::Voltage).is_none());
}

#[test]
fn test_missing_voltage_imputed_with_column_mean() {
    let d = day(2007, 3, 1);
    let mut valid = 100..109;
    let rows: Vec<String> = (0..10)
        .map(|minute| {
            let voltage = if minute == 4 {
                "?".to_string()
            } else {
                valid.next().unwrap().to_string()
            };
            row(d, &format!("00:{:02}:00", minute), "1.0", &voltage, 1.0)
        })
        .collect();
    let file = write_source(&rows);

    let engine = Engine::from_path(file.path(), Config::default()).unwrap();
    assert!(engine.ingest_warnings().is_empty());
    let voltage = engine.original().column(Channel::Voltage).unwrap();
    assert_eq!(voltage.len(), 10);
    assert_eq!(voltage[4], 104.0);
}

#[test]
fn test_resample_from_original_is_repeatable() {
    let d = day(2007, 6, 30);
    let rows: Vec<String> = (0..48)
        .map(|i| row(d, &format!("{:02}:{:02}:00", i / 2, (i % 2) * 30), "1.5", "235", i as f64))
        .collect();
    let file = write_source(&rows);
    let engine = Engine::from_path(file.path(), Config::default()).unwrap();

    let first = engine.all_data(Frequency::DAILY, MeterSelection::AllMeters).unwrap();
    let second = engine.all_data(Frequency::DAILY, MeterSelection::AllMeters).unwrap();
    assert_eq!(first.value.table, second.value.table);
    assert_relative_eq!(first.value.table.value(0, Channel::SubMetering1).unwrap(), 23.5);
}

#[test]
fn test_seasonal_sums_cover_every_row() {
    let rows: Vec<String> = [
        day(2006, 12, 25),
        day(2007, 1, 15),
        day(2007, 4, 1),
        day(2007, 7, 1),
        day(2007, 10, 1),
        day(2007, 12, 21),
    ]
    .into_iter()
    .enumerate()
    .map(|(i, d)| row(d, "12:00:00", "2.0", "240", (i + 1) as f64))
    .collect();
    let file = write_source(&rows);
    let engine = Engine::from_path(file.path(), Config::default()).unwrap();

    let outcome = engine.by_season(SeasonGrouping::Season);
    assert!(outcome.warnings.is_empty());
    let SeasonalSummary::BySeason(table) = outcome.value else {
        panic!("expected season grouping");
    };
    assert_eq!(table.keys(), Season::ALL.to_vec());
    assert_eq!(table.sum(Season::Winter, Channel::SubMetering1), Some(1.0 + 2.0 + 6.0));
    assert_relative_eq!(
        table.total(Channel::SubMetering1),
        engine.original().column_sum(Channel::SubMetering1).unwrap()
    );
    assert_relative_eq!(
        table.total(Channel::NotSubMetering),
        engine.original().column_sum(Channel::NotSubMetering).unwrap(),
        epsilon = 1e-9
    );
}

#[test]
fn test_year_season_grouping_reports_gaps() {
    let rows = vec![
        row(day(2007, 1, 15), "12:00:00", "2.0", "240", 1.0),
        row(day(2008, 10, 1), "12:00:00", "2.0", "240", 1.0),
    ];
    let file = write_source(&rows);
    let engine = Engine::from_path(file.path(), Config::default()).unwrap();

    let outcome = engine.by_season(SeasonGrouping::YearSeason);
    assert_eq!(outcome.value.len(), 2);
    assert!(matches!(
        outcome.warnings.as_slice(),
        [DataWarning::EmptyWindow { count: 2, .. }]
    ));
}

fn monthly_source(values: impl Iterator<Item = f64>) -> NamedTempFile {
    let start = day(2007, 1, 1);
    let rows: Vec<String> = values
        .enumerate()
        .map(|(i, total)| {
            let date = start.checked_add_months(Months::new(i as u32)).unwrap();
            // Monthly total of the meters equals active power in Wh per minute.
            let active = format!("{:.12}", total * 60.0 / 1000.0);
            row(date, "00:00:00", &active, "240", 0.0)
        })
        .collect();
    write_source(&rows)
}

#[test]
fn test_seasonal_forecast_end_to_end() {
    let file = monthly_source(
        (0..24).map(|t| 100.0 + 10.0 * t as f64 + 3.0 * (2.0 * PI * t as f64 / 12.0).sin()),
    );
    let engine = Engine::from_path(file.path(), Config::default()).unwrap();

    let View::Predictions(outcome) = engine.render(&ViewRequest::Predictions { horizon: 12 }).unwrap()
    else {
        panic!("expected predictions view");
    };
    let forecast = outcome.value.forecast;
    assert_eq!(forecast.len(), 12);

    let timestamps = forecast.timestamps();
    assert_eq!(timestamps[0].date(), day(2009, 1, 1));
    for pair in timestamps.windows(2) {
        assert!(pair[0] < pair[1]);
        assert_eq!(pair[0].date().checked_add_months(Months::new(1)).unwrap(), pair[1].date());
    }
    assert_eq!(outcome.value.report.winner, Some(forecast.order));
}

#[test]
fn test_infeasible_search_fails_only_the_prediction() {
    let file = monthly_source((0..120).map(|t| 500.0 + 100.0 * (2.0 * PI * t as f64 / 50.0).sin()));
    let mut config = Config::default();
    config.forecast.bounds = SearchBounds {
        max_p: 0,
        max_q: 0,
        max_seasonal_p: 0,
        max_seasonal_q: 0,
        fixed_d: Some(0),
        fixed_seasonal_d: Some(0),
        ..SearchBounds::default()
    };
    let engine = Engine::from_path(file.path(), config).unwrap();
    let before = engine.original().clone();

    match engine.render(&ViewRequest::Predictions { horizon: 6 }) {
        Err(EngineError::Forecast(ForecastError::ModelSelection { report, .. })) => {
            assert!(report.winner.is_none());
            assert_eq!(report.fitted(), 0);
        }
        other => panic!("expected model selection error, got {other:?}"),
    }

    assert_eq!(engine.original(), &before);
    assert!(engine
        .render(&ViewRequest::AllData {
            frequency: Frequency::MONTHLY,
            meters: MeterSelection::AllMeters,
        })
        .is_ok());
}

#[test]
fn test_month_without_readings_fails_only_the_prediction() {
    let start = day(2007, 1, 1);
    let rows: Vec<String> = (0..36u32)
        .filter(|t| *t != 20)
        .map(|t| {
            let date = start.checked_add_months(Months::new(t)).unwrap();
            row(date, "00:00:00", "1.0", "240", 0.0)
        })
        .collect();
    let file = write_source(&rows);
    let engine = Engine::from_path(file.path(), Config::default()).unwrap();

    match engine.render(&ViewRequest::Predictions { horizon: 12 }) {
        Err(EngineError::Forecast(ForecastError::IrregularSeries { expected, .. })) => {
            assert_eq!(expected.date(), day(2008, 9, 1));
        }
        other => panic!("expected irregular series error, got {other:?}"),
    }

    let monthly = engine.all_data(Frequency::MONTHLY, MeterSelection::AllMeters).unwrap();
    assert_eq!(monthly.value.table.len(), 35);
    assert!(matches!(
        monthly.warnings.as_slice(),
        [DataWarning::EmptyWindow { count: 1, .. }]
    ));
}

#[test]
fn test_missing_column_is_fatal() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "Date;Time;Voltage").unwrap();
    writeln!(file, "1/1/2007;00:00:00;240").unwrap();
    file.flush().unwrap();

    assert!(matches!(
        Engine::from_path(file.path(), Config::default()),
        Err(EngineError::Ingest(_))
    ));
}
