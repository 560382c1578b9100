//! Breakpoint tables for the six-band national air quality index.
//!
//! Each pollutant has six contiguous brackets mapping a concentration range
//! onto an index range. Adjacent brackets share their edges so that the
//! interpolated sub-index is continuous and non-decreasing. Gas and
//! particulate concentrations are in µg/m³, except CO which is in mg/m³.

use aqi_map_aqi_models::Pollutant;

/// One row of a breakpoint table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Breakpoint {
    /// Lower concentration bound of the bracket.
    pub conc_low: f64,
    /// Upper concentration bound of the bracket.
    pub conc_high: f64,
    /// Index value at `conc_low`.
    pub index_low: f64,
    /// Index value at `conc_high`.
    pub index_high: f64,
}

impl Breakpoint {
    const fn new(conc_low: f64, conc_high: f64, index_low: f64, index_high: f64) -> Self {
        Self {
            conc_low,
            conc_high,
            index_low,
            index_high,
        }
    }

    /// Linearly interpolates `concentration` within this bracket.
    #[must_use]
    pub fn interpolate(&self, concentration: f64) -> f64 {
        self.index_low
            + (concentration - self.conc_low) * (self.index_high - self.index_low)
                / (self.conc_high - self.conc_low)
    }
}

const PM25: &[Breakpoint] = &[
    Breakpoint::new(0.0, 30.0, 0.0, 50.0),
    Breakpoint::new(30.0, 60.0, 50.0, 100.0),
    Breakpoint::new(60.0, 90.0, 100.0, 200.0),
    Breakpoint::new(90.0, 120.0, 200.0, 300.0),
    Breakpoint::new(120.0, 250.0, 300.0, 400.0),
    Breakpoint::new(250.0, 500.0, 400.0, 500.0),
];

const PM10: &[Breakpoint] = &[
    Breakpoint::new(0.0, 50.0, 0.0, 50.0),
    Breakpoint::new(50.0, 100.0, 50.0, 100.0),
    Breakpoint::new(100.0, 250.0, 100.0, 200.0),
    Breakpoint::new(250.0, 350.0, 200.0, 300.0),
    Breakpoint::new(350.0, 430.0, 300.0, 400.0),
    Breakpoint::new(430.0, 600.0, 400.0, 500.0),
];

const NO2: &[Breakpoint] = &[
    Breakpoint::new(0.0, 40.0, 0.0, 50.0),
    Breakpoint::new(40.0, 80.0, 50.0, 100.0),
    Breakpoint::new(80.0, 180.0, 100.0, 200.0),
    Breakpoint::new(180.0, 280.0, 200.0, 300.0),
    Breakpoint::new(280.0, 400.0, 300.0, 400.0),
    Breakpoint::new(400.0, 800.0, 400.0, 500.0),
];

const O3: &[Breakpoint] = &[
    Breakpoint::new(0.0, 50.0, 0.0, 50.0),
    Breakpoint::new(50.0, 100.0, 50.0, 100.0),
    Breakpoint::new(100.0, 168.0, 100.0, 200.0),
    Breakpoint::new(168.0, 208.0, 200.0, 300.0),
    Breakpoint::new(208.0, 748.0, 300.0, 400.0),
    Breakpoint::new(748.0, 1000.0, 400.0, 500.0),
];

const SO2: &[Breakpoint] = &[
    Breakpoint::new(0.0, 40.0, 0.0, 50.0),
    Breakpoint::new(40.0, 80.0, 50.0, 100.0),
    Breakpoint::new(80.0, 380.0, 100.0, 200.0),
    Breakpoint::new(380.0, 800.0, 200.0, 300.0),
    Breakpoint::new(800.0, 1600.0, 300.0, 400.0),
    Breakpoint::new(1600.0, 2000.0, 400.0, 500.0),
];

const CO: &[Breakpoint] = &[
    Breakpoint::new(0.0, 1.0, 0.0, 50.0),
    Breakpoint::new(1.0, 2.0, 50.0, 100.0),
    Breakpoint::new(2.0, 10.0, 100.0, 200.0),
    Breakpoint::new(10.0, 17.0, 200.0, 300.0),
    Breakpoint::new(17.0, 34.0, 300.0, 400.0),
    Breakpoint::new(34.0, 50.0, 400.0, 500.0),
];

/// Returns the breakpoint table for `pollutant`, ordered by concentration.
#[must_use]
pub const fn breakpoints_for(pollutant: Pollutant) -> &'static [Breakpoint] {
    match pollutant {
        Pollutant::Pm25 => PM25,
        Pollutant::Pm10 => PM10,
        Pollutant::No2 => NO2,
        Pollutant::O3 => O3,
        Pollutant::So2 => SO2,
        Pollutant::Co => CO,
    }
}
