//! Hourly-file ingestion: gap interpolation, rejection policies, ordering
//! errors, and FWI override columns.

use chrono::{NaiveDate, NaiveDateTime};
use fwi_weather_core::{
    import_text, ImportOptions, InvalidPolicy, Location, StartingCodes, StreamError, WeatherStream,
};

fn loc() -> Location {
    Location {
        latitude: 45.9,
        longitude: -77.3,
        timezone_offset_secs: -5 * 3600,
        ..Location::default()
    }
}

fn t(day: u32, hour: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2023, 7, day)
        .unwrap()
        .and_hms_opt(hour, 0, 0)
        .unwrap()
}

fn stream() -> WeatherStream {
    let mut s = WeatherStream::new(loc());
    s.set_starting_codes(StartingCodes {
        ffmc: Some(85.0),
        dc: Some(100.0),
        dmc: Some(20.0),
        ..StartingCodes::default()
    });
    s
}

/// A smooth synthetic day of hourly rows, optionally skipping some hours.
fn day_rows(day: u32, skip: &[u32]) -> Vec<String> {
    let mut rows = Vec::new();
    for h in 0..24u32 {
        if skip.contains(&h) {
            continue;
        }
        let temp = 12.0 + 8.0 * (f64::from(h) * std::f64::consts::PI / 24.0).sin();
        let rh = 80.0 - f64::from(h);
        let ws = 5.0 + f64::from(h) * 0.3;
        rows.push(format!("2023-07-{day:02},{h},{temp:.2},{rh:.1},{ws:.1},180,0"));
    }
    rows
}

fn with_header(mut rows: Vec<String>) -> Vec<String> {
    let mut lines = vec!["hourly,hour,temp,rh,ws,wd,precip".to_string()];
    lines.append(&mut rows);
    lines
}

#[test]
fn clean_hourly_day_imports() {
    let mut s = stream();
    let report = import_text(&mut s, &with_header(day_rows(1, &[])), &ImportOptions::default())
        .unwrap();
    assert_eq!(report.rows, 24);
    assert!(!report.interpolated);
    assert_eq!(s.is_hourly_observations(t(1, 0)), Some(true));
    assert_eq!(s.num_days(), 1);
    for h in 0..24 {
        assert!(s.hourly_ffmc(t(1, h)).is_some(), "hour {h} has no FFMC");
        assert!(s.hourly_isi(t(1, h)).is_some(), "hour {h} has no ISI");
        assert!(s.hourly_fwi(t(1, h)).is_some(), "hour {h} has no FWI");
    }
}

#[test]
fn short_gap_is_spline_filled_within_neighbour_bounds() {
    let mut s = stream();
    let report = import_text(
        &mut s,
        &with_header(day_rows(1, &[3, 4, 5])),
        &ImportOptions::default(),
    )
    .unwrap();
    assert!(report.interpolated);
    assert_eq!(report.rows, 24, "gap hours are committed too");

    let known2 = s.hourly_weather(t(1, 2)).unwrap();
    let known6 = s.hourly_weather(t(1, 6)).unwrap();
    let lo = known2.temp.min(known6.temp);
    let hi = known2.temp.max(known6.temp);
    for h in 3..=5 {
        let wx = s.hourly_weather(t(1, h)).unwrap();
        assert!(
            wx.temp >= lo - 1e-9 && wx.temp <= hi + 1e-9,
            "hour {h} temp {} overshoots [{lo}, {hi}]",
            wx.temp
        );
        // Direction copies the preceding known hour; rain stays zero.
        assert_eq!(wx.wd, known2.wd, "hour {h}");
        assert_eq!(wx.precip, 0.0);
    }
    // Interpolated flags mark the filled hours and only those.
    let mut interp = |h: u32| {
        s.instantaneous(t(1, h), fwi_weather_core::SampleOptions::default())
            .unwrap()
            .weather
            .interpolated
    };
    assert!(interp(3) && interp(4) && interp(5));
    assert!(!interp(2) && !interp(6));
}

#[test]
fn long_gap_rejects_the_import() {
    let mut s = stream();
    let err = import_text(
        &mut s,
        &with_header(day_rows(1, &[3, 4, 5, 6, 7, 8])),
        &ImportOptions::default(),
    )
    .unwrap_err();
    assert!(matches!(err, StreamError::InvalidData { .. }), "{err}");
    assert_eq!(s.num_days(), 0, "rejected import must not touch the stream");
}

#[test]
fn prepend_fails_and_leaves_stream_unchanged() {
    let mut s = stream();
    import_text(&mut s, &with_header(day_rows(5, &[])), &ImportOptions::default()).unwrap();
    let before = s.num_days();

    let err = import_text(
        &mut s,
        &with_header(day_rows(4, &[])),
        &ImportOptions {
            allow_append: true,
            ..ImportOptions::default()
        },
    )
    .unwrap_err();
    assert!(matches!(err, StreamError::AttemptPrepend { .. }), "{err}");
    assert_eq!(s.num_days(), before);
    assert!(s.hourly_ffmc(t(5, 10)).is_some(), "existing data intact");
}

#[test]
fn start_after_noon_is_rejected() {
    let mut s = stream();
    let rows: Vec<String> = (14..24u32)
        .map(|h| format!("2023-07-01,{h},15,60,5,180,0"))
        .collect();
    let err = import_text(&mut s, &with_header(rows), &ImportOptions::default()).unwrap_err();
    assert!(matches!(err, StreamError::StartAfterNoon), "{err}");
}

#[test]
fn unrecognized_header_is_bad_file_type() {
    let mut s = stream();
    let file = vec!["bogus,columns,here".to_string(), "1,2,3".to_string()];
    let err = import_text(&mut s, &file, &ImportOptions::default()).unwrap_err();
    assert!(matches!(err, StreamError::BadFileType), "{err}");
}

#[test]
fn invalid_values_fail_by_default_and_clamp_under_fix() {
    let bad_row = "2023-07-01,2,120,60,5,180,0"; // 120 °C
    let mut rows = day_rows(1, &[2]);
    rows.insert(2, bad_row.to_string());

    let mut s = stream();
    let err =
        import_text(&mut s, &with_header(rows.clone()), &ImportOptions::default()).unwrap_err();
    assert!(matches!(err, StreamError::InvalidData { .. }), "{err}");
    assert_eq!(s.num_days(), 0);

    let mut s = stream();
    let report = import_text(
        &mut s,
        &with_header(rows),
        &ImportOptions {
            invalid: InvalidPolicy::Fix,
            ..ImportOptions::default()
        },
    )
    .unwrap();
    assert!(report.corrected);
    let wx = s.hourly_weather(t(1, 2)).unwrap();
    assert_eq!(wx.temp, 60.0, "temperature clamps to the upper bound");
}

#[test]
fn interpolation_plus_correction_degrades_quality() {
    let bad_row = "2023-07-01,2,120,60,5,180,0";
    let mut rows = day_rows(1, &[2, 6, 7]);
    rows.insert(2, bad_row.to_string());
    let mut s = stream();
    let report = import_text(
        &mut s,
        &with_header(rows),
        &ImportOptions {
            invalid: InvalidPolicy::Fix,
            ..ImportOptions::default()
        },
    )
    .unwrap();
    assert!(report.interpolated && report.corrected);
    assert!(report.interpolated_before_invalid_data());
    assert!(s.has_any_corrected());
}

#[test]
fn ffmc_column_becomes_override_and_enables_precedence() {
    let mut s = stream();
    let mut lines = vec!["hourly,hour,temp,rh,ws,wd,precip,ffmc".to_string()];
    for h in 0..24u32 {
        let ffmc = if h == 16 { "88.5".to_string() } else { "-1".to_string() };
        lines.push(format!("2023-07-01,{h},15,60,5,180,0,{ffmc}"));
    }
    import_text(&mut s, &lines, &ImportOptions::default()).unwrap();

    assert!(s.options().use_specified_fwi);
    // Hour 16 is noon + 4: the value overrides both the hourly FFMC and
    // the day's daily FFMC.
    assert_eq!(s.hourly_ffmc(t(1, 16)), Some(88.5));
    assert!(s.is_hourly_ffmc_specified(t(1, 16)));
    assert_eq!(s.daily_ffmc(t(1, 16)), Some((88.5, true)));
    assert_eq!(s.starting_codes().hffmc, 88.5);
}

#[test]
fn appending_second_day_requires_permission() {
    let mut s = stream();
    import_text(&mut s, &with_header(day_rows(1, &[])), &ImportOptions::default()).unwrap();

    // A continuation must start at or before noon and overlap the existing
    // end, so it re-states the back half of day one before extending.
    let mut rows: Vec<String> = (12..24u32)
        .map(|h| format!("2023-07-01,{h},16,55,9,180,0"))
        .collect();
    rows.extend(day_rows(2, &[]));
    let err = import_text(
        &mut s,
        &with_header(rows.clone()),
        &ImportOptions {
            allow_overwrite: true,
            ..ImportOptions::default()
        },
    )
    .unwrap_err();
    assert!(matches!(err, StreamError::AttemptAppend { .. }), "{err}");
    assert_eq!(s.num_days(), 1);

    let report = import_text(
        &mut s,
        &with_header(rows),
        &ImportOptions {
            allow_overwrite: true,
            allow_append: true,
            ..ImportOptions::default()
        },
    )
    .unwrap();
    assert_eq!(report.rows, 36);
    assert_eq!(s.num_days(), 2);
}
