//! NIST ITS-90 thermocouple polynomials.
//!
//! `calc_voltage` gives the reference emf (mV) for a junction temperature (°C),
//! `calc_temp` the inverse. Types J, K and T are tabulated; other types return
//! `None`, as do inputs outside the published polynomial ranges.

use crate::types::TcType;

struct Segment {
    lo: f64,
    hi: f64,
    coefs: &'static [f64],
}

impl Segment {
    fn contains(&self, x: f64) -> bool {
        x >= self.lo && x <= self.hi
    }
}

fn poly(coefs: &[f64], x: f64) -> f64 {
    coefs.iter().rev().fold(0.0, |acc, c| acc * x + c)
}

fn eval(segments: &[Segment], x: f64) -> Option<f64> {
    segments
        .iter()
        .find(|s| s.contains(x))
        .map(|s| poly(s.coefs, x))
}

const K_EMF: [Segment; 2] = [
    Segment {
        lo: -270.0,
        hi: 0.0,
        coefs: &[
            0.0,
            0.394501280250E-01,
            0.236223735980E-04,
            -0.328589067840E-06,
            -0.499048287770E-08,
            -0.675090591730E-10,
            -0.574103274280E-12,
            -0.310888728940E-14,
            -0.104516093650E-16,
            -0.198892668780E-19,
            -0.163226974860E-22,
        ],
    },
    Segment {
        lo: 0.0,
        hi: 1372.0,
        coefs: &[
            -0.176004136860E-01,
            0.389212049750E-01,
            0.185587700320E-04,
            -0.994575928740E-07,
            0.318409457190E-09,
            -0.560728448890E-12,
            0.560750590590E-15,
            -0.320207200030E-18,
            0.971511471520E-22,
            -0.121047212750E-25,
        ],
    },
];

// Exponential term of the positive type K range.
const K_A0: f64 = 0.118597600000E+00;
const K_A1: f64 = -0.118343200000E-03;
const K_A2: f64 = 0.126968600000E+03;

const K_TEMP: [Segment; 3] = [
    Segment {
        lo: -5.891,
        hi: 0.0,
        coefs: &[
            0.0,
            2.5173462E+01,
            -1.1662878E+00,
            -1.0833638E+00,
            -8.9773540E-01,
            -3.7342377E-01,
            -8.6632643E-02,
            -1.0450598E-02,
            -5.1920577E-04,
        ],
    },
    Segment {
        lo: 0.0,
        hi: 20.644,
        coefs: &[
            0.0,
            2.508355E+01,
            7.860106E-02,
            -2.503131E-01,
            8.315270E-02,
            -1.228034E-02,
            9.804036E-04,
            -4.413030E-05,
            1.057734E-06,
            -1.052755E-08,
        ],
    },
    Segment {
        lo: 20.644,
        hi: 54.886,
        coefs: &[
            -1.318058E+02,
            4.830222E+01,
            -1.646031E+00,
            5.464731E-02,
            -9.650715E-04,
            8.802193E-06,
            -3.110810E-08,
        ],
    },
];

const J_EMF: [Segment; 2] = [
    Segment {
        lo: -210.0,
        hi: 760.0,
        coefs: &[
            0.0,
            0.503811878150E-01,
            0.304758369300E-04,
            -0.856810657200E-07,
            0.132281952950E-09,
            -0.170529583370E-12,
            0.209480906970E-15,
            -0.125383953360E-18,
            0.156317256970E-22,
        ],
    },
    Segment {
        lo: 760.0,
        hi: 1200.0,
        coefs: &[
            0.296456256810E+03,
            -0.149761277860E+01,
            0.317871039240E-02,
            -0.318476867010E-05,
            0.157208190040E-08,
            -0.306913690560E-12,
        ],
    },
];

const J_TEMP: [Segment; 3] = [
    Segment {
        lo: -8.095,
        hi: 0.0,
        coefs: &[
            0.0,
            1.9528268E+01,
            -1.2286185E+00,
            -1.0752178E+00,
            -5.9086933E-01,
            -1.7256713E-01,
            -2.8131513E-02,
            -2.3963370E-03,
            -8.3823321E-05,
        ],
    },
    Segment {
        lo: 0.0,
        hi: 42.919,
        coefs: &[
            0.0,
            1.978425E+01,
            -2.001204E-01,
            1.036969E-02,
            -2.549687E-04,
            3.585153E-06,
            -5.344285E-08,
            5.099890E-10,
        ],
    },
    Segment {
        lo: 42.919,
        hi: 69.553,
        coefs: &[
            -3.11358187E+03,
            3.00543684E+02,
            -9.94773230E+00,
            1.70276630E-01,
            -1.43033468E-03,
            4.73886084E-06,
        ],
    },
];

const T_EMF: [Segment; 2] = [
    Segment {
        lo: -270.0,
        hi: 0.0,
        coefs: &[
            0.0,
            0.387481063640E-01,
            0.441944343470E-04,
            0.118443231050E-06,
            0.200329735540E-07,
            0.901380195590E-09,
            0.226511565930E-10,
            0.360711542050E-12,
            0.384939398830E-14,
            0.282135219250E-16,
            0.142515947790E-18,
            0.487686622860E-21,
            0.107955392700E-23,
            0.139450270620E-26,
            0.797951539270E-30,
        ],
    },
    Segment {
        lo: 0.0,
        hi: 400.0,
        coefs: &[
            0.0,
            0.387481063640E-01,
            0.332922278800E-04,
            0.206182434040E-06,
            -0.218822568460E-08,
            0.109968809280E-10,
            -0.308157587720E-13,
            0.454791352900E-16,
            -0.275129016730E-19,
        ],
    },
];

const T_TEMP: [Segment; 2] = [
    Segment {
        lo: -5.603,
        hi: 0.0,
        coefs: &[
            0.0,
            2.5949192E+01,
            -2.1316967E-01,
            7.9018692E-01,
            4.2527777E-01,
            1.3304473E-01,
            2.0241446E-02,
            1.2668171E-03,
        ],
    },
    Segment {
        lo: 0.0,
        hi: 20.872,
        coefs: &[
            0.0,
            2.592800E+01,
            -7.602961E-01,
            4.637791E-02,
            -2.165394E-03,
            6.048144E-05,
            -7.293422E-07,
        ],
    },
];

/// Reference emf in millivolts for a junction at `celsius`.
pub fn calc_voltage(tc_type: TcType, celsius: f64) -> Option<f64> {
    match tc_type {
        TcType::K => {
            let emf = eval(&K_EMF, celsius)?;
            if celsius > 0.0 {
                let d = celsius - K_A2;
                Some(emf + K_A0 * (K_A1 * d * d).exp())
            } else {
                Some(emf)
            }
        }
        TcType::J => eval(&J_EMF, celsius),
        TcType::T => eval(&T_EMF, celsius),
        _ => None,
    }
}

/// Junction temperature in °C for an emf of `millivolts`.
pub fn calc_temp(tc_type: TcType, millivolts: f64) -> Option<f64> {
    match tc_type {
        TcType::K => eval(&K_TEMP, millivolts),
        TcType::J => eval(&J_TEMP, millivolts),
        TcType::T => eval(&T_TEMP, millivolts),
        _ => None,
    }
}

/// True when the type has tables.
pub fn is_supported(tc_type: TcType) -> bool {
    matches!(tc_type, TcType::J | TcType::K | TcType::T)
}

/// Cold-junction compensated temperature: add the CJC emf to the measured
/// emf and invert.
pub fn compensated_temp(tc_type: TcType, millivolts: f64, cjc_celsius: f64) -> Option<f64> {
    let cjc_mv = calc_voltage(tc_type, cjc_celsius)?;
    calc_temp(tc_type, millivolts + cjc_mv)
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::approx_eq;

    #[test]
    fn test_reference_points() {
        // ITS-90 table values at 100 °C
        assert!(approx_eq!(f64, calc_voltage(TcType::K, 100.0).unwrap(), 4.096, epsilon = 1e-3));
        assert!(approx_eq!(f64, calc_voltage(TcType::J, 100.0).unwrap(), 5.269, epsilon = 1e-3));
        assert!(approx_eq!(f64, calc_voltage(TcType::T, 100.0).unwrap(), 4.279, epsilon = 1e-3));
        assert!(approx_eq!(f64, calc_voltage(TcType::J, 0.0).unwrap(), 0.0, epsilon = 1e-9));
    }

    #[test]
    fn test_inverse_round_trip() {
        for tc in [TcType::J, TcType::K, TcType::T] {
            for celsius in [-50.0, 0.0, 25.0, 150.0, 350.0] {
                let mv = calc_voltage(tc, celsius).unwrap();
                let back = calc_temp(tc, mv).unwrap();
                assert!(
                    approx_eq!(f64, back, celsius, epsilon = 0.1),
                    "{:?} {} -> {} -> {}",
                    tc,
                    celsius,
                    mv,
                    back
                );
            }
        }
    }

    #[test]
    fn test_compensation() {
        // junction at 100 °C, reference at 25 °C
        let mv = calc_voltage(TcType::K, 100.0).unwrap() - calc_voltage(TcType::K, 25.0).unwrap();
        let temp = compensated_temp(TcType::K, mv, 25.0).unwrap();
        assert!(approx_eq!(f64, temp, 100.0, epsilon = 0.1));
    }

    #[test]
    fn test_unsupported_and_out_of_range() {
        assert!(calc_temp(TcType::B, 1.0).is_none());
        assert!(calc_voltage(TcType::S, 100.0).is_none());
        assert!(calc_temp(TcType::K, 80.0).is_none());
        assert!(calc_voltage(TcType::T, 500.0).is_none());
        assert!(!is_supported(TcType::E));
    }
}
