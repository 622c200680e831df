//! Canadian Forest Fire Weather Index System equations
//!
//! Implements the standard daily codes (FFMC, DMC, DC, BUI, ISI, FWI) and
//! the hourly FFMC recurrences the stream can select between.
//!
//! # Scientific References
//! - Van Wagner, C.E. (1987). "Development and structure of the Canadian
//!   Forest Fire Weather Index System." Forestry Technical Report 35.
//! - Van Wagner, C.E. & Pickett, T.L. (1985). "Equations and FORTRAN program
//!   for the Canadian Forest Fire Weather Index System." Technical Report 33.
//! - Van Wagner, C.E. (1977). "A method of computing fine fuel moisture
//!   content throughout the diurnal cycle." Information Report PS-X-69.
//! - Lawson, B.D., Armitage, O.B. & Hoskins, W.D. (1996). "Diurnal variation
//!   in the Fine Fuel Moisture Code: tables and computer source code."
//!   FRDA Report 245.
//!
//! Relative humidity is passed as a fraction in `[0, 1]` (the stream's
//! internal representation) and converted to percent internally.

use crate::core_types::SECS_PER_DAY;

/// Moisture content (percent) equivalent of an FFMC value, daily scale.
fn ffmc_to_moisture(ffmc: f64) -> f64 {
    147.2 * (101.0 - ffmc) / (59.5 + ffmc)
}

/// FFMC value for a moisture content (percent), daily scale.
fn moisture_to_ffmc(m: f64) -> f64 {
    (59.5 * (250.0 - m) / (147.2 + m)).clamp(0.0, 101.0)
}

/// Hourly-scale moisture conversion (Van Wagner 1977 uses a slightly
/// different constant than the daily code).
fn ffmc_to_moisture_hourly(ffmc: f64) -> f64 {
    147.27723 * (101.0 - ffmc) / (59.5 + ffmc)
}

fn moisture_to_ffmc_hourly(m: f64) -> f64 {
    (59.5 * (250.0 - m) / (147.27723 + m)).clamp(0.0, 101.0)
}

/// Rainfall effect on fine fuel moisture (shared by the daily and hourly
/// forms; `rf` is the effective rainfall in mm).
fn rain_effect(mo: f64, rf: f64) -> f64 {
    let mut mr = mo + 42.5 * rf * (-100.0 / (251.0 - mo)).exp() * (1.0 - (-6.93 / rf).exp());
    if mo > 150.0 {
        mr += 0.0015 * (mo - 150.0).powi(2) * rf.sqrt();
    }
    mr.min(250.0)
}

/// Drying equilibrium moisture content.
fn drying_equilibrium(temp: f64, rh_pct: f64) -> f64 {
    0.942 * rh_pct.powf(0.679)
        + 11.0 * ((rh_pct - 100.0) / 10.0).exp()
        + 0.18 * (21.1 - temp) * (1.0 - (-0.115 * rh_pct).exp())
}

/// Wetting equilibrium moisture content.
fn wetting_equilibrium(temp: f64, rh_pct: f64) -> f64 {
    0.618 * rh_pct.powf(0.753)
        + 10.0 * ((rh_pct - 100.0) / 10.0).exp()
        + 0.18 * (21.1 - temp) * (1.0 - (-0.115 * rh_pct).exp())
}

fn log_drying_rate(rh_pct: f64, ws: f64) -> f64 {
    0.424 * (1.0 - (rh_pct / 100.0).powf(1.7))
        + 0.0694 * ws.sqrt() * (1.0 - (rh_pct / 100.0).powi(8))
}

fn log_wetting_rate(rh_pct: f64, ws: f64) -> f64 {
    0.424 * (1.0 - ((100.0 - rh_pct) / 100.0).powf(1.7))
        + 0.0694 * ws.sqrt() * (1.0 - ((100.0 - rh_pct) / 100.0).powi(8))
}

/// Daily FFMC, standard Van Wagner (1987) form.
///
/// `prev` is yesterday's daily FFMC, `rain` the 24-hour rainfall ending at
/// noon (mm), `temp`/`rh`/`ws` the noon observations.
pub fn daily_ffmc_van_wagner(prev: f64, rain: f64, temp: f64, rh: f64, ws: f64) -> f64 {
    let rh_pct = (rh * 100.0).clamp(0.0, 100.0);
    let mut mo = ffmc_to_moisture(prev.clamp(0.0, 101.0));

    if rain > 0.5 {
        mo = rain_effect(mo, rain - 0.5);
    }

    let ed = drying_equilibrium(temp, rh_pct);
    let m = if mo > ed {
        let kd = log_drying_rate(rh_pct, ws) * 0.581 * (0.0365 * temp).exp();
        ed + (mo - ed) * 10f64.powf(-kd)
    } else {
        let ew = wetting_equilibrium(temp, rh_pct);
        if mo < ew {
            let kw = log_wetting_rate(rh_pct, ws) * 0.581 * (0.0365 * temp).exp();
            ew - (ew - mo) * 10f64.powf(-kw)
        } else {
            mo
        }
    };
    moisture_to_ffmc(m)
}

/// Hourly FFMC, Van Wagner (1977) recurrence over an arbitrary time step.
///
/// `prev` is the previous hour's FFMC, `rain` the rainfall over the step
/// (mm, no 0.5 mm interception threshold at this scale), `span_secs` the
/// step length (3600 for the standard hourly step).
pub fn hourly_ffmc_van_wagner(
    prev: f64,
    rain: f64,
    temp: f64,
    rh: f64,
    ws: f64,
    span_secs: f64,
) -> f64 {
    let rh_pct = (rh * 100.0).clamp(0.0, 100.0);
    let hours = span_secs / 3600.0;
    let mut mo = ffmc_to_moisture_hourly(prev.clamp(0.0, 101.0));

    if rain > 0.0 {
        mo = rain_effect(mo, rain);
    }

    let ed = drying_equilibrium(temp, rh_pct);
    let m = if mo > ed {
        let kd = log_drying_rate(rh_pct, ws) * 0.0579 * (0.0365 * temp).exp();
        ed + (mo - ed) * (-2.302585 * kd * hours).exp()
    } else {
        let ew = wetting_equilibrium(temp, rh_pct);
        if mo < ew {
            let kw = log_wetting_rate(rh_pct, ws) * 0.0579 * (0.0365 * temp).exp();
            ew - (ew - mo) * (-2.302585 * kw * hours).exp()
        } else {
            mo
        }
    };
    moisture_to_ffmc_hourly(m)
}

/// Previous hour's FFMC given the next hour's value and that hour's
/// weather: the inverse of [`hourly_ffmc_van_wagner`] over one hour.
///
/// The rain branch has no closed-form inverse, so the forward step is
/// bracketed by bisection over the valid FFMC range; 50 iterations pin the
/// result well below observable precision.
pub fn hourly_ffmc_van_wagner_previous(next: f64, rain: f64, temp: f64, rh: f64, ws: f64) -> f64 {
    let target = next.clamp(0.0, 101.0);
    let mut lo = 0.0;
    let mut hi = 101.0;
    // The forward step is monotone in the previous value.
    for _ in 0..50 {
        let mid = 0.5 * (lo + hi);
        let stepped = hourly_ffmc_van_wagner(mid, rain, temp, rh, ws, 3600.0);
        if stepped < target {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    0.5 * (lo + hi)
}

/// Hourly FFMC by contiguous interpolation between the bracketing daily
/// values (Lawson-style): a monotone function of the time elapsed since
/// local standard-time midnight, independent of the previous hour.
pub fn hourly_ffmc_lawson_contiguous(
    prev_daily: f64,
    today_daily: f64,
    secs_since_midnight: f64,
) -> f64 {
    let fraction = (secs_since_midnight / SECS_PER_DAY as f64).clamp(0.0, 1.0);
    let f = prev_daily + (today_daily - prev_daily) * fraction;
    f.clamp(0.0, 101.0)
}

/// Rainfall threshold (mm over the trailing 48 h) above which the hybrid
/// policy abandons daily interpolation for the wetting-aware recurrence.
const HYBRID_RAIN_THRESHOLD: f64 = 0.5;

/// Hourly FFMC, hybrid policy: daily interpolation while the trailing
/// 48-hour window is dry, the Van Wagner recurrence once it has rained
/// (interpolated curves cannot express wetting).
///
/// `rain48[0]` is the current hour's rainfall, `rain48[k]` the rainfall
/// `k` hours earlier.
#[allow(clippy::too_many_arguments)]
pub fn hourly_ffmc_hybrid(
    prev_daily: f64,
    today_daily: f64,
    prev_hour: f64,
    rain48: &[f64; 48],
    temp: f64,
    rh: f64,
    ws: f64,
    secs_since_midnight: f64,
) -> f64 {
    let trailing: f64 = rain48.iter().sum();
    if trailing > HYBRID_RAIN_THRESHOLD {
        hourly_ffmc_van_wagner(prev_hour, rain48[0], temp, rh, ws, 3600.0)
    } else {
        hourly_ffmc_lawson_contiguous(prev_daily, today_daily, secs_since_midnight)
    }
}

/// Effective day lengths for the DMC drying rate, per month, by latitude
/// band (Van Wagner & Pickett 1985, extended southern tables).
const DMC_DAY_LENGTH_N_HIGH: [f64; 12] = [
    6.5, 7.5, 9.0, 12.8, 13.9, 13.9, 12.4, 10.9, 9.4, 8.0, 7.0, 6.0,
];
const DMC_DAY_LENGTH_N_LOW: [f64; 12] = [
    7.9, 8.4, 8.9, 9.5, 9.9, 10.2, 10.1, 9.7, 9.1, 8.6, 8.1, 7.8,
];
const DMC_DAY_LENGTH_S_LOW: [f64; 12] = [
    10.1, 9.6, 9.1, 8.5, 8.1, 7.8, 7.9, 8.3, 8.9, 9.4, 9.9, 10.2,
];
const DMC_DAY_LENGTH_S_HIGH: [f64; 12] = [
    11.5, 10.5, 9.2, 7.9, 6.8, 6.2, 6.5, 7.4, 8.7, 10.0, 11.2, 11.8,
];

fn dmc_day_length(latitude: f64, month0: usize) -> f64 {
    let month0 = month0.min(11);
    if latitude >= 30.0 {
        DMC_DAY_LENGTH_N_HIGH[month0]
    } else if latitude >= 10.0 {
        DMC_DAY_LENGTH_N_LOW[month0]
    } else if latitude > -10.0 {
        9.0
    } else if latitude > -30.0 {
        DMC_DAY_LENGTH_S_LOW[month0]
    } else {
        DMC_DAY_LENGTH_S_HIGH[month0]
    }
}

/// Duff Moisture Code.
///
/// `prev` is yesterday's DMC, `rain` the 24-hour rainfall ending at noon
/// (mm), `temp`/`rh` the noon observations, `month0` the zero-based month.
pub fn duff_moisture_code(
    prev: f64,
    rain: f64,
    temp: f64,
    latitude: f64,
    month0: usize,
    rh: f64,
) -> f64 {
    let rh_pct = (rh * 100.0).clamp(0.0, 100.0);
    let prev = prev.max(0.0);

    let after_rain = if rain > 1.5 {
        let rw = 0.92 * rain - 1.27;
        let wmi = 20.0 + 280.0 / (0.023 * prev).exp();
        let b = if prev <= 33.0 {
            100.0 / (0.5 + 0.3 * prev)
        } else if prev <= 65.0 {
            14.0 - 1.3 * prev.ln()
        } else {
            6.2 * prev.ln() - 17.2
        };
        let wmr = wmi + 1000.0 * rw / (48.77 + b * rw);
        (43.43 * (5.6348 - (wmr - 20.0).ln())).max(0.0)
    } else {
        prev
    };

    let t = temp.max(-1.1);
    let rk = 1.894 * (t + 1.1) * (100.0 - rh_pct) * dmc_day_length(latitude, month0) * 1e-4;
    (after_rain + rk).clamp(0.0, 500.0)
}

/// Seasonal day-length adjustments for the DC, per month, by hemisphere.
const DC_DAY_LENGTH_N: [f64; 12] = [
    -1.6, -1.6, -1.6, 0.9, 3.8, 5.8, 6.4, 5.0, 2.4, 0.4, -1.6, -1.6,
];
const DC_DAY_LENGTH_S: [f64; 12] = [
    6.4, 5.0, 2.4, 0.4, -1.6, -1.6, -1.6, -1.6, -1.6, 0.9, 3.8, 5.8,
];

fn dc_day_length(latitude: f64, month0: usize) -> f64 {
    let month0 = month0.min(11);
    if latitude > 20.0 {
        DC_DAY_LENGTH_N[month0]
    } else if latitude >= -20.0 {
        1.4
    } else {
        DC_DAY_LENGTH_S[month0]
    }
}

/// Drought Code.
pub fn drought_code(prev: f64, rain: f64, temp: f64, latitude: f64, month0: usize) -> f64 {
    let prev = prev.max(0.0);

    let after_rain = if rain > 2.8 {
        let rw = 0.83 * rain - 1.27;
        let smi = 800.0 * (-prev / 400.0).exp();
        (prev - 400.0 * (1.0 + 3.937 * rw / smi).ln()).max(0.0)
    } else {
        prev
    };

    let t = temp.max(-2.8);
    let pe = ((0.36 * (t + 2.8) + dc_day_length(latitude, month0)) / 2.0).max(0.0);
    (after_rain + pe).clamp(0.0, 1500.0)
}

/// Buildup Index from today's DC and DMC.
pub fn buildup_index(dc: f64, dmc: f64) -> f64 {
    if dmc <= 0.0 && dc <= 0.0 {
        return 0.0;
    }
    let bui = if dmc <= 0.4 * dc {
        0.8 * dc * dmc / (dmc + 0.4 * dc)
    } else {
        dmc - (1.0 - 0.8 * dc / (dmc + 0.4 * dc)) * (0.92 + (0.0114 * dmc).powf(1.7))
    };
    bui.max(0.0)
}

/// Initial Spread Index (FBP form) from an FFMC value and wind speed. The
/// steady-state form is the same for the daily (noon wind) and hourly
/// applications; only the inputs differ.
pub fn initial_spread_index(ffmc: f64, ws: f64) -> f64 {
    let m = ffmc_to_moisture(ffmc.clamp(0.0, 101.0));
    let fw = (0.05039 * ws).exp();
    let ff = 91.9 * (-0.1386 * m).exp() * (1.0 + m.powf(5.31) / 4.93e7);
    0.208 * fw * ff
}

/// Fire Weather Index from ISI and BUI.
pub fn fire_weather_index(isi: f64, bui: f64) -> f64 {
    let f_d = if bui > 80.0 {
        1000.0 / (25.0 + 108.64 / (0.023 * bui).exp())
    } else {
        0.626 * bui.powf(0.809) + 2.0
    };
    let bb = 0.1 * isi * f_d;
    if bb <= 1.0 {
        bb
    } else {
        (2.72 * (0.434 * bb.ln()).powf(0.647)).exp()
    }
}
