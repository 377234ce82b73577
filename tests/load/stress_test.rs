//! Load tests for the view engine.
//!
//! - Two years of minute readings through ingestion and every view
//! - Many threads rendering views from one shared engine
//!
//! Run with `--ignored`; they are slow in debug builds.

use std::f64::consts::PI;
use std::io::Write;
use std::time::{Duration, Instant};

use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};
use household_energy_forecast::domain::{Frequency, MeterSelection};
use household_energy_forecast::seasons::SeasonGrouping;
use household_energy_forecast::{Config, Engine, ViewKind, ViewRequest};
use strum::IntoEnumIterator;

const HEADER: &str = "Date;Time;Global_active_power;Global_reactive_power;Voltage;Global_intensity;Sub_metering_1;Sub_metering_2;Sub_metering_3";

fn minute_source(days: i64) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "{HEADER}").unwrap();
    let start = NaiveDate::from_ymd_opt(2006, 12, 16)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    for minute in 0..days * 24 * 60 {
        let ts: NaiveDateTime = start + chrono::Duration::minutes(minute);
        let daily = (2.0 * PI * ts.hour() as f64 / 24.0).sin();
        let yearly = (2.0 * PI * ts.ordinal() as f64 / 365.0).cos();
        let active = 1.0 + 0.5 * daily + 0.4 * yearly;
        // Every 997th reading is missing, as in the household dataset.
        if minute % 997 == 0 {
            writeln!(file, "{};{};?;?;?;?;?;?;?", ts.format("%d/%m/%Y"), ts.format("%H:%M:%S")).unwrap();
            continue;
        }
        writeln!(
            file,
            "{};{};{:.3};0.100;{:.2};{:.1};{:.1};{:.1};{:.1}",
            ts.format("%d/%m/%Y"),
            ts.format("%H:%M:%S"),
            active,
            240.0 + daily,
            active * 4.2,
            (minute % 3) as f64,
            1.0,
            (6.0 + 4.0 * yearly).max(0.0),
        )
        .unwrap();
    }
    file.flush().unwrap();
    file
}

/// Test: two years of minute readings through every view
#[test]
#[ignore] // Ignore by default as this is a slow test
fn test_two_years_of_minute_readings() {
    let file = minute_source(730);

    let start = Instant::now();
    let engine = Engine::from_path(file.path(), Config::default()).unwrap();
    let ingest = start.elapsed();
    assert_eq!(engine.original().len(), 730 * 24 * 60);

    let start = Instant::now();
    for frequency in [Frequency::HOURLY, Frequency::DAILY, Frequency::WEEKLY, Frequency::MONTHLY] {
        let chart = engine.all_data(frequency, MeterSelection::AllMeters).unwrap();
        assert!(chart.warnings.is_empty());
    }
    let resampling = start.elapsed();

    let start = Instant::now();
    let seasons = engine.by_season(SeasonGrouping::YearSeason);
    assert!(!seasons.value.is_empty());
    let aggregation = start.elapsed();

    let start = Instant::now();
    match engine.predictions(12) {
        Ok(run) => assert_eq!(run.value.forecast.len(), 12),
        Err(e) => println!("prediction failed: {e}"),
    }
    let prediction = start.elapsed();

    println!(
        "ingest: {:?}, resample x4: {:?}, year-season: {:?}, predict: {:?}",
        ingest, resampling, aggregation, prediction
    );
    assert!(resampling < Duration::from_secs(30), "resampling took {:?}", resampling);
}

/// Test: concurrent readers of one engine
///
/// Views never write to the original table, so any number of threads can
/// render from the same engine and all see identical results.
#[test]
#[ignore] // Ignore by default as this is a slow test
fn test_concurrent_views_share_original() {
    let file = minute_source(60);
    let engine = Engine::from_path(file.path(), Config::default()).unwrap();
    let before = engine.original().clone();
    let expected = serde_json::to_string(
        &engine
            .render(&ViewRequest::AllData {
                frequency: Frequency::DAILY,
                meters: MeterSelection::AllMeters,
            })
            .unwrap(),
    )
    .unwrap();

    let latencies: Vec<Duration> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..16)
            .map(|i| {
                let engine = &engine;
                let expected = &expected;
                scope.spawn(move || {
                    let mut worst = Duration::ZERO;
                    for kind in ViewKind::iter().cycle().skip(i % 3).take(9) {
                        let start = Instant::now();
                        let request = match kind {
                            ViewKind::AllData => ViewRequest::AllData {
                                frequency: Frequency::DAILY,
                                meters: MeterSelection::AllMeters,
                            },
                            other => engine.default_request(other),
                        };
                        let view = engine.render(&request);
                        worst = worst.max(start.elapsed());
                        if kind == ViewKind::AllData {
                            let json = serde_json::to_string(&view.unwrap()).unwrap();
                            assert_eq!(&json, expected);
                        }
                    }
                    worst
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let max_latency = latencies.iter().max().unwrap();
    println!("worst view latency across 16 threads: {:?}", max_latency);
    assert_eq!(engine.original(), &before);
}
