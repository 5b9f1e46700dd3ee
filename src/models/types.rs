//! Categorical domain types
//!
//! Every categorical column is stored as its canonical string. The enums here
//! round-trip through that string and reject anything outside the enumeration,
//! so a misspelled category fails the load instead of silently forming its own
//! group.

use std::fmt;
use std::str::FromStr;

/// Error returned when a stored string is not a member of its enumeration
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} '{value}'")]
pub struct UnknownVariant {
    /// Name of the enumeration
    pub kind: &'static str,
    /// The rejected value
    pub value: String,
}

/// Define a categorical enum backed by canonical strings
macro_rules! string_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $kind:expr, {
            $( $(#[$vmeta:meta])* $variant:ident => $label:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[derive(serde::Serialize, serde::Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub enum $name {
            $( $(#[$vmeta])* $variant ),+
        }

        impl $name {
            /// All members in declaration order
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            /// Canonical string stored in the table
            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $label),+
                }
            }
        }

        impl FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($label => Ok(Self::$variant),)+
                    _ => Err(UnknownVariant {
                        kind: $kind,
                        value: s.to_string(),
                    }),
                }
            }
        }

        impl TryFrom<String> for $name {
            type Error = UnknownVariant;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                value.parse()
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.as_str().to_string()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

string_enum! {
    /// Clinical department an encounter belongs to
    ServiceLine, "service line", {
        Medicine => "Medicine",
        Surgery => "Surgery",
        Ed => "ED",
        Icu => "ICU",
        Ob => "OB",
        Pediatrics => "Pediatrics",
        Oncology => "Oncology",
    }
}

string_enum! {
    /// How the patient was admitted
    AdmissionType, "admission type", {
        /// Emergency department
        Ed => "ED",
        Inpatient => "Inpatient",
        Outpatient => "Outpatient",
    }
}

string_enum! {
    /// Drug class of a medication order
    MedClass, "medication class", {
        Opioid => "Opioid",
        Antibiotic => "Antibiotic",
        Anticoagulant => "Anticoagulant",
        Insulin => "Insulin",
        Sedative => "Sedative",
        Statin => "Statin",
        Bronchodilator => "Bronchodilator",
    }
}

impl MedClass {
    /// Whether orders of this class carry elevated adverse-event risk
    #[must_use]
    pub const fn is_high_risk(self) -> bool {
        matches!(
            self,
            Self::Opioid | Self::Anticoagulant | Self::Insulin | Self::Sedative
        )
    }
}

string_enum! {
    /// Kind of medication safety event
    EventType, "event type", {
        /// Adverse drug reaction
        Adr => "ADR",
        MedError => "Med_Error",
        NearMiss => "Near_Miss",
        Allergy => "Allergy",
        Interaction => "Interaction",
        Omission => "Omission",
    }
}

string_enum! {
    /// Clinical severity of a safety event
    Severity, "severity", {
        Mild => "Mild",
        Moderate => "Moderate",
        Severe => "Severe",
    }
}

string_enum! {
    /// Patient age band
    AgeBand, "age band", {
        Young => "18-39",
        Middle => "40-64",
        Senior => "65+",
    }
}

string_enum! {
    /// Recorded sex of a patient
    Sex, "sex", {
        Female => "F",
        Male => "M",
        Unknown => "Unknown",
    }
}

string_enum! {
    /// Reporting-delay bucket, bounds inclusive
    DelayBin, "delay bin", {
        ZeroToOne => "0-1",
        TwoToThree => "2-3",
        FourToSeven => "4-7",
        EightToFourteen => "8-14",
        FifteenToThirty => "15-30",
        OverThirty => "31+",
    }
}

impl DelayBin {
    /// Bucket holding a reporting delay of `days`
    #[must_use]
    pub const fn from_delay(days: i64) -> Self {
        match days {
            i64::MIN..=1 => Self::ZeroToOne,
            2..=3 => Self::TwoToThree,
            4..=7 => Self::FourToSeven,
            8..=14 => Self::EightToFourteen,
            15..=30 => Self::FifteenToThirty,
            _ => Self::OverThirty,
        }
    }

    /// Display position, independent of the label's alphabetic order
    #[must_use]
    pub const fn order(self) -> i64 {
        self as i64
    }
}

string_enum! {
    /// Outcome of a data-quality check
    CheckStatus, "check status", {
        Pass => "PASS",
        Fail => "FAIL",
    }
}
