//! End-to-end behavior of a daily-summary stream: import, diurnal
//! synthesis bounds, the FWI chain, and cache discipline.

use chrono::{NaiveDate, NaiveDateTime};
use fwi_weather_core::{
    import_text, FfmcPolicy, ImportOptions, Location, StartingCodes, StreamOptions, WeatherStream,
};

fn petawawa() -> Location {
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

fn seeded_stream() -> WeatherStream {
    let mut stream = WeatherStream::new(petawawa());
    stream.set_starting_codes(StartingCodes {
        ffmc: Some(85.0),
        dc: Some(100.0),
        dmc: Some(20.0),
        ..StartingCodes::default()
    });
    stream
}

fn lines(rows: &[&str]) -> Vec<String> {
    rows.iter().map(|s| (*s).to_string()).collect()
}

#[test]
fn single_daily_row_synthesizes_bounded_hours() {
    let mut stream = seeded_stream();
    let file = lines(&[
        "daily,min_temp,max_temp,rh,precip,min_ws,max_ws,wd",
        "2023-07-01,10,20,60,5,5,15,180",
    ]);
    let report = import_text(&mut stream, &file, &ImportOptions::default()).unwrap();
    assert_eq!(report.rows, 1);

    assert_eq!(stream.is_hourly_observations(t(1, 0)), Some(false));
    assert_eq!(stream.is_origin_file(t(1, 0)), Some(true));

    for h in 0..24 {
        let wx = stream.hourly_weather(t(1, h)).unwrap();
        assert!(
            (10.0 - 1e-9..=20.0 + 1e-9).contains(&wx.temp),
            "hour {h} temperature {} outside the daily min/max",
            wx.temp
        );
        assert!((0.0..=1.0).contains(&wx.rh), "hour {h} RH {}", wx.rh);
    }

    // All rain lands on the noon hour.
    let precip: Vec<f64> = (0..24)
        .map(|h| stream.hourly_weather(t(1, h)).unwrap().precip)
        .collect();
    assert_eq!(precip[12], 5.0);
    assert_eq!(precip.iter().sum::<f64>(), 5.0);

    let (ffmc, specified) = stream.daily_ffmc(t(1, 14)).unwrap();
    assert!(ffmc > 0.0 && ffmc < 101.0, "daily FFMC {ffmc}");
    assert!(!specified);

    // DC/DMC step from the seeds: 5 mm of rain wets both codes down, the
    // warm day dries them back some.
    let (dc, _) = stream.dc(t(1, 14)).unwrap();
    let (dmc, _) = stream.dmc(t(1, 14)).unwrap();
    assert!((80.0..=110.0).contains(&dc), "DC {dc}");
    assert!((5.0..=25.0).contains(&dmc), "DMC {dmc}");
    assert!(stream.bui(t(1, 14)).is_some());
    assert!(stream.daily_isi(t(1, 14)).is_some());
    assert!(stream.daily_fwi(t(1, 14)).is_some());
}

#[test]
fn wind_synthesis_stays_non_negative_and_bounded() {
    let mut stream = seeded_stream();
    let file = lines(&[
        "daily,min_temp,max_temp,rh,precip,min_ws,max_ws,wd",
        "2023-07-01,10,20,60,0,5,15,180",
        "2023-07-02,12,22,55,0,0,10,200",
    ]);
    import_text(&mut stream, &file, &ImportOptions::default()).unwrap();
    for d in 1..=2 {
        for h in 0..24 {
            let ws = stream.hourly_weather(t(d, h)).unwrap().ws;
            assert!(ws >= 0.0, "day {d} hour {h} ws {ws}");
            assert!(ws <= 15.0 + 1e-9, "day {d} hour {h} ws {ws}");
        }
    }
}

#[test]
fn recalculation_is_idempotent() {
    let mut stream = seeded_stream();
    let file = lines(&[
        "daily,min_temp,max_temp,rh,precip,min_ws,max_ws,wd",
        "2023-07-01,10,20,60,5,5,15,180",
        "2023-07-02,11,21,55,0,4,12,190",
    ]);
    import_text(&mut stream, &file, &ImportOptions::default()).unwrap();

    let first: Vec<f64> = (0..48)
        .map(|h| stream.hourly_ffmc(t(1, 0) + chrono::Duration::hours(h)).unwrap())
        .collect();
    let second: Vec<f64> = (0..48)
        .map(|h| stream.hourly_ffmc(t(1, 0) + chrono::Duration::hours(h)).unwrap())
        .collect();
    assert_eq!(first, second, "repeat reads must be bit-identical");
}

#[test]
fn raw_mutation_changes_next_read() {
    let mut stream = seeded_stream();
    let file = lines(&[
        "daily,min_temp,max_temp,rh,precip,min_ws,max_ws,wd",
        "2023-07-01,10,20,60,0,5,15,180",
    ]);
    import_text(&mut stream, &file, &ImportOptions::default()).unwrap();
    let before = stream.daily_ffmc(t(1, 14)).unwrap().0;

    // A much wetter day must lower the recomputed FFMC.
    let mut summary = stream.daily_weather(t(1, 0)).unwrap();
    summary.precip = 25.0;
    assert!(stream.set_daily_weather(t(1, 0), summary));
    let after = stream.daily_ffmc(t(1, 14)).unwrap().0;
    assert!(after < before, "{after} !< {before}");
}

#[test]
fn specified_codes_override_calculated_exactly() {
    let mut stream = seeded_stream();
    let file = lines(&[
        "daily,min_temp,max_temp,rh,precip,min_ws,max_ws,wd",
        "2023-07-01,10,20,60,0,5,15,180",
    ]);
    import_text(&mut stream, &file, &ImportOptions::default()).unwrap();
    stream.set_options(StreamOptions {
        ffmc_policy: FfmcPolicy::VanWagner,
        use_specified_fwi: true,
    });
    stream.set_specified_daily_ffmc(t(1, 0), Some(91.5));
    stream.set_specified_dc(t(1, 0), Some(250.0));
    stream.set_specified_dmc(t(1, 0), Some(33.0));
    stream.set_specified_bui(t(1, 0), Some(48.0));

    assert_eq!(stream.daily_ffmc(t(1, 14)), Some((91.5, true)));
    assert_eq!(stream.dc(t(1, 14)), Some((250.0, true)));
    assert_eq!(stream.dmc(t(1, 14)), Some((33.0, true)));
    assert_eq!(stream.bui(t(1, 14)), Some((48.0, true)));
    assert!(stream.any_fwi_codes_specified());
}

#[test]
fn end_time_extension_duplicates_last_day() {
    let mut stream = seeded_stream();
    let file = lines(&[
        "daily,min_temp,max_temp,rh,precip,min_ws,max_ws,wd",
        "2023-07-01,10,20,60,0,5,15,180",
    ]);
    import_text(&mut stream, &file, &ImportOptions::default()).unwrap();
    stream.set_end_time(t(3, 0));
    assert_eq!(stream.num_days(), 3);
    let copied = stream.daily_weather(t(3, 12)).unwrap();
    assert_eq!(copied.min_temp, 10.0);
    assert_eq!(copied.max_temp, 20.0);

    // And every extended day still gets a full FWI chain.
    assert!(stream.daily_fwi(t(3, 14)).is_some());
}

#[test]
fn instantaneous_sample_blends_between_hours() {
    let mut stream = seeded_stream();
    let file = lines(&[
        "daily,min_temp,max_temp,rh,precip,min_ws,max_ws,wd",
        "2023-07-01,10,20,60,0,5,15,180",
        "2023-07-02,10,20,60,0,5,15,180",
    ]);
    import_text(&mut stream, &file, &ImportOptions::default()).unwrap();

    let on_hour = stream
        .instantaneous(t(1, 14), fwi_weather_core::SampleOptions {
            temporal_interpolation: true,
        })
        .unwrap();
    let next_hour = stream
        .instantaneous(t(1, 15), fwi_weather_core::SampleOptions {
            temporal_interpolation: true,
        })
        .unwrap();
    let between = stream
        .instantaneous(
            t(1, 14) + chrono::Duration::minutes(30),
            fwi_weather_core::SampleOptions {
                temporal_interpolation: true,
            },
        )
        .unwrap();

    let lo = on_hour.weather.temp.min(next_hour.weather.temp);
    let hi = on_hour.weather.temp.max(next_hour.weather.temp);
    assert!(
        between.weather.temp >= lo - 1e-9 && between.weather.temp <= hi + 1e-9,
        "blended temperature {} outside [{lo}, {hi}]",
        between.weather.temp
    );
}
