//! Voltage and current ranges.
//!
//! A [`Range`] maps onto a fixed [`EuScale`]: the engineering-unit span and
//! minimum that convert between codes and volts. Calibration coefficients are
//! applied separately, in the code domain.

/// Input/output ranges with their public numeric codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
#[allow(missing_docs)]
pub enum Range {
    Bip60Volts = 1,
    Bip30Volts = 2,
    Bip15Volts = 3,
    Bip20Volts = 4,
    Bip10Volts = 5,
    Bip5Volts = 6,
    Bip4Volts = 7,
    Bip2Pt5Volts = 8,
    Bip2Volts = 9,
    Bip1Pt25Volts = 10,
    Bip1Volts = 11,
    BipPt625Volts = 12,
    BipPt5Volts = 13,
    BipPt25Volts = 14,
    BipPt125Volts = 15,
    BipPt2Volts = 16,
    BipPt1Volts = 17,
    BipPt078Volts = 18,
    BipPt05Volts = 19,
    BipPt01Volts = 20,
    BipPt005Volts = 21,
    Bip3Volts = 22,
    BipPt312Volts = 23,
    BipPt156Volts = 24,
    Uni60Volts = 1001,
    Uni30Volts = 1002,
    Uni15Volts = 1003,
    Uni20Volts = 1004,
    Uni10Volts = 1005,
    Uni5Volts = 1006,
    Uni4Volts = 1007,
    Uni2Pt5Volts = 1008,
    Uni2Volts = 1009,
    Uni1Pt25Volts = 1010,
    Uni1Volts = 1011,
    UniPt625Volts = 1012,
    UniPt5Volts = 1013,
    UniPt25Volts = 1014,
    UniPt125Volts = 1015,
    UniPt2Volts = 1016,
    UniPt1Volts = 1017,
    UniPt078Volts = 1018,
    UniPt05Volts = 1019,
    UniPt01Volts = 1020,
    UniPt005Volts = 1021,
    Ma0To20 = 2000,
}

/// Linear code-to-unit mapping of one range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EuScale {
    /// Full-scale width in engineering units
    pub span: f64,
    /// Value of code zero
    pub min: f64,
}

impl EuScale {
    /// Code to engineering units: `code * span / full_scale + min`.
    ///
    /// `full_scale` is the number of codes (`2^resolution`).
    #[inline]
    pub fn to_eu(&self, code: f64, full_scale: f64) -> f64 {
        code * (self.span / full_scale) + self.min
    }

    /// Engineering units to a code clamped to `[0, full_scale - 1]`.
    #[inline]
    pub fn from_eu(&self, value: f64, full_scale: f64) -> f64 {
        let code = ((value - self.min) * full_scale / self.span).round();
        code.clamp(0.0, full_scale - 1.0)
    }
}

impl Range {
    /// Magnitude of the range limit (10.0 for both BIP10 and UNI10).
    pub fn limit(self) -> f64 {
        match self {
            Self::Bip60Volts | Self::Uni60Volts => 60.0,
            Self::Bip30Volts | Self::Uni30Volts => 30.0,
            Self::Bip15Volts | Self::Uni15Volts => 15.0,
            Self::Bip20Volts | Self::Uni20Volts | Self::Ma0To20 => 20.0,
            Self::Bip10Volts | Self::Uni10Volts => 10.0,
            Self::Bip5Volts | Self::Uni5Volts => 5.0,
            Self::Bip4Volts | Self::Uni4Volts => 4.0,
            Self::Bip3Volts => 3.0,
            Self::Bip2Pt5Volts | Self::Uni2Pt5Volts => 2.5,
            Self::Bip2Volts | Self::Uni2Volts => 2.0,
            Self::Bip1Pt25Volts | Self::Uni1Pt25Volts => 1.25,
            Self::Bip1Volts | Self::Uni1Volts => 1.0,
            Self::BipPt625Volts | Self::UniPt625Volts => 0.625,
            Self::BipPt5Volts | Self::UniPt5Volts => 0.5,
            Self::BipPt312Volts => 0.312,
            Self::BipPt25Volts | Self::UniPt25Volts => 0.25,
            Self::BipPt2Volts | Self::UniPt2Volts => 0.2,
            Self::BipPt156Volts => 0.156,
            Self::BipPt125Volts | Self::UniPt125Volts => 0.125,
            Self::BipPt1Volts | Self::UniPt1Volts => 0.1,
            Self::BipPt078Volts | Self::UniPt078Volts => 0.078,
            Self::BipPt05Volts | Self::UniPt05Volts => 0.05,
            Self::BipPt01Volts | Self::UniPt01Volts => 0.01,
            Self::BipPt005Volts | Self::UniPt005Volts => 0.005,
        }
    }

    /// True for symmetric ranges.
    pub fn is_bipolar(self) -> bool {
        (self as i32) < 1000
    }

    /// Span and minimum of the range.
    pub fn eu_scale(self) -> EuScale {
        let limit = self.limit();
        if self.is_bipolar() {
            EuScale {
                span: 2.0 * limit,
                min: -limit,
            }
        } else {
            EuScale {
                span: limit,
                min: 0.0,
            }
        }
    }

    /// Public numeric code.
    pub fn code(self) -> i32 {
        self as i32
    }
}
