//! Pin numbering, attribute words and mode words for the configuration API.
//!
//! These mirror the words the peripheral firmware understands; the driver
//! passes them through without interpreting pin-specific semantics.

/// Digital input attributes (`attribute1` of a configure request).
pub mod digital_input {
    pub const DEFAULT: u16 = 0;
    /// Enable the pull-up resistor.
    pub const PULLUP: u16 = 4;
    /// Enable the pull-down resistor.
    pub const PULLDOWN: u16 = 8;
    /// Notify on the raising edge of the signal.
    pub const TRIGGER_RAISING: u16 = 16;
    /// Notify on the falling edge of the signal.
    pub const TRIGGER_FALLING: u16 = 32;
}

/// Digital output attributes (`attribute1` of a configure request).
pub mod digital_output {
    pub const DEFAULT: u16 = 0;
    /// Drive the signal with low current.
    pub const LOW_CURRENT: u16 = 4;
    /// Drive the signal with high current.
    pub const HIGH_CURRENT: u16 = 8;
}

/// Digital channel mode (`value` of a configure request).
pub mod digital_mode {
    pub const OUTPUT: u32 = 0;
    pub const INPUT_ON_DEMAND: u32 = 1;
    pub const INPUT_PRECACHED: u32 = 2;
    pub const INPUT_TRIGGERING: u32 = 3;
}

/// Analog pins beyond the numbered inputs.
pub mod analog_pin {
    /// Reference voltage (high).
    pub const VREF: u16 = 128;
    /// Internal temperature sensor.
    pub const TEMP: u16 = 129;
    /// Reference voltage (low).
    pub const VREF_LOW: u16 = 130;
    /// Band gap reference.
    pub const BAND_GAP: u16 = 131;
}

/// PWM timer attributes (configure-module request).
pub mod pwm_timer {
    /// Edge-aligned PWM signals.
    pub const EDGE_ALIGNED: u16 = 0;
    /// Center-aligned PWM signals.
    pub const CENTER_ALIGNED: u16 = 1;
}

/// PWM channel attributes (configure-module request).
pub mod pwm_channel {
    /// Output high on pulse.
    pub const HIGH_PULSE: u16 = 0;
    /// Output low on pulse.
    pub const LOW_PULSE: u16 = 1;
}

/// How a digital input communicates value changes to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputCommunication {
    /// Each read does a round trip to the peripheral.
    OnDemand,
    /// The peripheral pushes every change; reads answer from the host-side
    /// cache.
    Precached,
}
