//! Persistence: a snapshot restored through serde reproduces every
//! calculated index exactly, without the calculated values ever being
//! stored.

use chrono::{NaiveDate, NaiveDateTime};
use fwi_weather_core::{
    import_text, ImportOptions, Location, StartingCodes, StreamSnapshot, WeatherStream,
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

fn build_stream() -> WeatherStream {
    let mut s = WeatherStream::new(loc());
    s.set_starting_codes(StartingCodes {
        ffmc: Some(85.0),
        dc: Some(100.0),
        dmc: Some(20.0),
        rain: 1.5,
        ..StartingCodes::default()
    });
    let mut lines = vec!["hourly,hour,temp,rh,ws,wd,precip,wg,ffmc".to_string()];
    for d in 1..=2u32 {
        for h in 0..24u32 {
            let temp = 12.0 + 8.0 * (f64::from(h) * std::f64::consts::PI / 24.0).sin();
            let precip = if d == 1 && h == 9 { 2.5 } else { 0.0 };
            let ffmc = if d == 2 && h == 16 { "87.0".to_string() } else { "-1".to_string() };
            lines.push(format!(
                "2023-07-{d:02},{h},{temp:.2},60,7,225,{precip},{gust},{ffmc}",
                gust = 10.0 + f64::from(h)
            ));
        }
    }
    import_text(&mut s, &lines, &ImportOptions::default()).unwrap();
    s
}

fn collect_indices(s: &mut WeatherStream) -> Vec<f64> {
    let mut out = Vec::new();
    for d in 1..=2u32 {
        for h in 0..24u32 {
            out.push(s.hourly_ffmc(t(d, h)).unwrap());
            out.push(s.hourly_isi(t(d, h)).unwrap());
            out.push(s.hourly_fwi(t(d, h)).unwrap());
        }
        out.push(s.daily_ffmc(t(d, 14)).unwrap().0);
        out.push(s.dc(t(d, 14)).unwrap().0);
        out.push(s.dmc(t(d, 14)).unwrap().0);
        out.push(s.bui(t(d, 14)).unwrap().0);
        out.push(s.daily_isi(t(d, 14)).unwrap());
        out.push(s.daily_fwi(t(d, 14)).unwrap());
    }
    out
}

#[test]
fn snapshot_roundtrip_reproduces_all_indices() {
    let mut original = build_stream();
    let expected = collect_indices(&mut original);

    let json = serde_json::to_string(&original.snapshot()).unwrap();
    let snapshot: StreamSnapshot = serde_json::from_str(&json).unwrap();
    let (mut restored, warnings) = WeatherStream::restore(&snapshot).unwrap();
    assert!(warnings.is_empty(), "current-version restore warns: {warnings:?}");

    let actual = collect_indices(&mut restored);
    assert_eq!(expected, actual, "restored indices must be bit-identical");

    assert_eq!(restored.options(), original.options());
    assert_eq!(restored.starting_codes(), original.starting_codes());
    assert_eq!(restored.num_days(), original.num_days());
}

#[test]
fn snapshot_preserves_overrides_and_raw_inputs_only() {
    let original = build_stream();
    let snapshot = original.snapshot();

    // The hour-16 FFMC override of day two survives as a specified value.
    assert_eq!(snapshot.days[1].spec_hr[16].ffmc, Some(87.0));
    // Raw channels for hourly days are present.
    assert!(snapshot.days[0].hours.is_some());
    // Gusts came through the gust channel.
    let hours = snapshot.days[0].hours.as_ref().unwrap();
    assert_eq!(hours.gust.as_ref().map(|g| g[5]), Some(15.0));
}

#[test]
fn clone_is_an_independent_deep_copy() {
    let mut original = build_stream();
    let before = collect_indices(&mut original);

    let mut copy = original.clone();
    // Mutating the copy must not disturb the original.
    let mut wx = copy.hourly_weather(t(1, 10)).unwrap();
    wx.temp += 15.0;
    assert!(copy.set_hourly_weather(t(1, 10), wx));

    let after = collect_indices(&mut original);
    assert_eq!(before, after);
    assert_ne!(collect_indices(&mut copy), after);
}
