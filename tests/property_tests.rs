//! Property tests for the normalization invariants

use proptest::prelude::*;
use runningapp::models::Pace;
use runningapp::source::{DataSource, OnMoveDataSource, OnMoveFiles, SourceLifecycle};
use std::io::Write;
use tempfile::NamedTempFile;

#[derive(Debug, Clone)]
struct Row {
    time: i64,
    distance: f64,
    speed: f64,
    latitude: f64,
    longitude: f64,
}

/// Sessions with strictly increasing time and non-decreasing distance
fn session() -> impl Strategy<Value = Vec<Row>> {
    prop::collection::vec(
        (
            1i64..30,
            0.0f64..60.0,
            prop_oneof![1 => Just(0.0f64), 4 => 0.5f64..25.0],
            -60.0f64..60.0,
            -170.0f64..170.0,
        ),
        1..40,
    )
    .prop_map(|steps| {
        let mut time = 0;
        let mut distance = 0.0;
        steps
            .into_iter()
            .map(|(dt, dd, speed, latitude, longitude)| {
                time += dt;
                distance += dd;
                Row {
                    time,
                    distance,
                    speed,
                    latitude,
                    longitude,
                }
            })
            .collect()
    })
}

fn write_session(rows: &[Row], duplicate_every: usize) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "Time,Distance,Speed,Latitude,Longitude,").unwrap();
    for (i, row) in rows.iter().enumerate() {
        let line = format!(
            "{},{},{},{},{},",
            row.time, row.distance, row.speed, row.latitude, row.longitude
        );
        writeln!(file, "{}", line).unwrap();
        if duplicate_every > 0 && i % duplicate_every == 0 {
            writeln!(file, "{}", line).unwrap();
        }
    }
    file.flush().unwrap();
    file
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn every_row_is_fully_derived(rows in session()) {
        let file = write_session(&rows, 0);
        let source = OnMoveDataSource::new(&[file.path().to_path_buf()]).unwrap();
        let records = source.dataframe().records();

        prop_assert_eq!(records.len(), rows.len());
        for (record, row) in records.iter().zip(&rows) {
            prop_assert_eq!(record.pace.is_available(), row.speed > 0.0);
            prop_assert_eq!(record.raw_pace.is_some(), row.speed > 0.0);
            if record.pace == Pace::NotAvailable {
                prop_assert_eq!(record.speed, row.speed);
            }
            prop_assert_eq!(record.minute, row.time / 60);
            prop_assert_eq!(record.hour, row.time / 3600);
            prop_assert_eq!(record.km_1, (row.distance / 1000.0).floor() as i64);
            prop_assert_eq!(record.marathon, (row.distance / 42195.0).floor() as i64);
        }
    }

    #[test]
    fn normalization_preserves_order(rows in session(), every in 1usize..5) {
        let file = write_session(&rows, every);
        let source = OnMoveDataSource::new(&[file.path().to_path_buf()]).unwrap();

        let times: Vec<i64> = source.dataframe().records().iter().map(|r| r.time).collect();
        let expected: Vec<i64> = rows.iter().map(|r| r.time).collect();
        prop_assert_eq!(times, expected);
    }

    #[test]
    fn cleaning_is_idempotent(rows in session(), every in 0usize..4) {
        let file = write_session(&rows, every);
        let files = OnMoveFiles::from_list(&[file.path().to_path_buf()]).unwrap();

        let once = files.clean_data(files.read_data().unwrap()).unwrap();
        let twice = files.clean_data(once.clone()).unwrap();
        prop_assert_eq!(once.rows.len(), rows.len());
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn geometry_matches_positions(rows in session()) {
        let file = write_session(&rows, 0);
        let source = OnMoveDataSource::new(&[file.path().to_path_buf()]).unwrap();
        let (lat, lon) = source.run_centre().unwrap();

        let n = rows.len() as f64;
        let lat_sum: f64 = rows.iter().map(|r| r.latitude).sum();
        let lon_sum: f64 = rows.iter().map(|r| r.longitude).sum();
        prop_assert_eq!(lat, lat_sum / n);
        prop_assert_eq!(lon, lon_sum / n);

        let range = |values: Vec<f64>| {
            let max = values.iter().cloned().fold(f64::MIN, f64::max);
            let min = values.iter().cloned().fold(f64::MAX, f64::min);
            max - min
        };
        let lat_range = range(rows.iter().map(|r| r.latitude).collect());
        let lon_range = range(rows.iter().map(|r| r.longitude).collect());
        prop_assert_eq!(source.run_width().unwrap(), lat_range.max(lon_range));
    }
}
