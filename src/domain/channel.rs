use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

/// One numeric column of a meter table.
///
/// Variant order is the canonical column order: the seven raw channels as
/// they appear in the source file, followed by the derived channels.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumIter,
    EnumString,
    IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum Channel {
    /// Household global minute-averaged active power (kW)
    GlobalActivePower,
    /// Household global minute-averaged reactive power (kW)
    GlobalReactivePower,
    /// Minute-averaged voltage (V)
    Voltage,
    /// Household global minute-averaged current intensity (A)
    GlobalIntensity,
    /// Kitchen: dishwasher, oven, microwave (Wh)
    #[serde(rename = "sub_metering_1")]
    #[strum(serialize = "sub_metering_1")]
    SubMetering1,
    /// Laundry room: washing-machine, tumble-drier, refrigerator, a light (Wh)
    #[serde(rename = "sub_metering_2")]
    #[strum(serialize = "sub_metering_2")]
    SubMetering2,
    /// Water-heater and air-conditioner (Wh)
    #[serde(rename = "sub_metering_3")]
    #[strum(serialize = "sub_metering_3")]
    SubMetering3,
    GlobalApparentPower,
    /// Active energy not measured by the three sub-meters (Wh)
    NotSubMetering,
    TotalSubMetering,
    TotalSubNoSubMetering,
}

impl Channel {
    /// Channels read from the source file.
    pub const RAW: [Channel; 7] = [
        Channel::GlobalActivePower,
        Channel::GlobalReactivePower,
        Channel::Voltage,
        Channel::GlobalIntensity,
        Channel::SubMetering1,
        Channel::SubMetering2,
        Channel::SubMetering3,
    ];

    /// Channels computed at ingestion from the raw ones.
    pub const DERIVED: [Channel; 4] = [
        Channel::GlobalApparentPower,
        Channel::NotSubMetering,
        Channel::TotalSubMetering,
        Channel::TotalSubNoSubMetering,
    ];

    /// The four channels that together account for all consumed energy.
    pub const METERS: [Channel; 4] = [
        Channel::SubMetering1,
        Channel::SubMetering2,
        Channel::SubMetering3,
        Channel::NotSubMetering,
    ];

    pub fn name(&self) -> &'static str {
        self.into()
    }

    pub fn is_raw(&self) -> bool {
        Self::RAW.contains(self)
    }

    /// Human-readable legend for the metering channels.
    pub fn legend(&self) -> Option<&'static str> {
        match self {
            Self::SubMetering1 => Some("Dishwasher, oven and microwave"),
            Self::SubMetering2 => {
                Some("Washing-machine, tumble-drier, refrigerator and one light")
            }
            Self::SubMetering3 => Some("Water-heater and air-conditioner"),
            Self::NotSubMetering => Some("Other usage"),
            _ => None,
        }
    }
}

/// Which metering channels a chart view shows.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumIter, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum MeterSelection {
    #[default]
    AllMeters,
    #[serde(rename = "sub_metering_1")]
    #[strum(serialize = "sub_metering_1")]
    SubMetering1,
    #[serde(rename = "sub_metering_2")]
    #[strum(serialize = "sub_metering_2")]
    SubMetering2,
    #[serde(rename = "sub_metering_3")]
    #[strum(serialize = "sub_metering_3")]
    SubMetering3,
    NotSubMetering,
}

impl MeterSelection {
    pub fn channels(&self) -> &'static [Channel] {
        match self {
            Self::AllMeters => &Channel::METERS,
            Self::SubMetering1 => &[Channel::SubMetering1],
            Self::SubMetering2 => &[Channel::SubMetering2],
            Self::SubMetering3 => &[Channel::SubMetering3],
            Self::NotSubMetering => &[Channel::NotSubMetering],
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::AllMeters => "All meters",
            Self::SubMetering1 => "Dishwasher, oven and microwave",
            Self::SubMetering2 => "Washing-machine, tumble-drier, refrigerator and one light",
            Self::SubMetering3 => "Water-heater and air-conditioner",
            Self::NotSubMetering => "Other usage",
        }
    }
}
