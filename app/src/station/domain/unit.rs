use std::fmt::Display;

pub const UNKNOWN: &str = "unknown";

/// Unit families the device lets the user choose a display unit for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnitFamily {
    Temperature,
    WindSpeed,
    Rain,
    Pressure,
    Solar,
}

//Device selector codes are small integers, `Unknown` covers codes newer firmware may add.
macro_rules! unit_selector {
    ($name:ident { $($variant:ident = $code:literal => $label:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant,)+
            Unknown,
        }

        impl $name {
            pub fn from_code(code: u32) -> Self {
                match code {
                    $($code => Self::$variant,)+
                    _ => Self::Unknown,
                }
            }

            pub fn label(&self) -> &'static str {
                match self {
                    $(Self::$variant => $label,)+
                    Self::Unknown => UNKNOWN,
                }
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.label())
            }
        }
    };
}

unit_selector!(WindUnit {
    MetersPerSecond = 0 => "m/s",
    KilometersPerHour = 1 => "km/h",
    FeetPerSecond = 2 => "ft/s",
    Beaufort = 3 => "bft",
    MilesPerHour = 4 => "mph",
    Knot = 5 => "knot",
});

unit_selector!(RainUnit {
    Millimeter = 0 => "mm",
    Inch = 1 => "in",
});

unit_selector!(PressureUnit {
    Hectopascal = 0 => "hPa",
    InchOfMercury = 1 => "inHg",
    MillimeterOfMercury = 2 => "mmHg",
});

unit_selector!(TemperatureUnit {
    Celsius = 0 => "°C",
    Fahrenheit = 1 => "°F",
});

unit_selector!(SolarUnit {
    Lux = 0 => "lux",
    WattPerSquareMeter = 1 => "W/m²",
    FootCandle = 2 => "fc",
});

const LUX_TO_WATT_PER_SQUARE_METER: f64 = 0.0079;
const FOOT_CANDLE_TO_LUX: f64 = 0.0929;

impl TemperatureUnit {
    pub fn to_celsius(&self, value: f64) -> f64 {
        match self {
            TemperatureUnit::Fahrenheit => (value - 32.0) * 5.0 / 9.0,
            TemperatureUnit::Celsius | TemperatureUnit::Unknown => value,
        }
    }
}

impl WindUnit {
    //Beaufort is a scale, not a speed, and is left as reported
    pub fn to_kilometers_per_hour(&self, value: f64) -> f64 {
        match self {
            WindUnit::MetersPerSecond => value * 3.6,
            WindUnit::FeetPerSecond => value * 1.09728,
            WindUnit::MilesPerHour => value * 1.60934,
            WindUnit::Knot => value * 1.852,
            WindUnit::KilometersPerHour | WindUnit::Beaufort | WindUnit::Unknown => value,
        }
    }
}

impl RainUnit {
    pub fn to_millimeter(&self, value: f64) -> f64 {
        match self {
            RainUnit::Inch => value * 25.4,
            RainUnit::Millimeter | RainUnit::Unknown => value,
        }
    }
}

impl PressureUnit {
    pub fn to_hectopascal(&self, value: f64) -> f64 {
        match self {
            PressureUnit::InchOfMercury => value * 33.8639,
            PressureUnit::MillimeterOfMercury => value * 1.33322,
            PressureUnit::Hectopascal | PressureUnit::Unknown => value,
        }
    }
}

impl SolarUnit {
    //rough approximations, kept as the device vendor documents them
    pub fn to_watt_per_square_meter(&self, value: f64) -> f64 {
        match self {
            SolarUnit::Lux => value * LUX_TO_WATT_PER_SQUARE_METER,
            SolarUnit::FootCandle => value * FOOT_CANDLE_TO_LUX * LUX_TO_WATT_PER_SQUARE_METER,
            SolarUnit::WattPerSquareMeter | SolarUnit::Unknown => value,
        }
    }
}
