//! ConfigTemperatures (0x11) and ConfigValve (0x12) payloads

use serde::{Deserialize, Serialize};

use super::encode_temperature;

/// Boost durations in minutes with their wire codes
const BOOST_STEPS: [(u32, u8); 8] = [
    (0, 0),
    (5, 1),
    (10, 2),
    (15, 3),
    (20, 4),
    (25, 5),
    (30, 6),
    (60, 7),
];

/// Temperature configuration of a thermostat
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TemperatureConfig {
    /// Comfort temperature in °C
    pub comfort: f64,
    /// Eco temperature in °C
    pub eco: f64,
    /// Lowest allowed setpoint in °C
    pub minimum: f64,
    /// Highest allowed setpoint in °C
    pub maximum: f64,
    /// Measurement offset in °C (-3.5 to 3.5)
    pub offset: f64,
    /// Setpoint while a window is open
    pub window_open_temperature: f64,
    /// Minutes to hold the window-open setpoint
    pub window_open_minutes: u32,
}

impl Default for TemperatureConfig {
    fn default() -> Self {
        Self {
            comfort: 21.0,
            eco: 17.0,
            minimum: 4.5,
            maximum: 30.5,
            offset: 0.0,
            window_open_temperature: 12.0,
            window_open_minutes: 10,
        }
    }
}

impl TemperatureConfig {
    /// Encode as the 7 byte ConfigTemperatures payload
    pub fn encode(&self) -> [u8; 7] {
        let offset = if self.offset.is_nan() {
            0.0
        } else {
            self.offset.clamp(-3.5, 3.5)
        };
        let minutes = self.window_open_minutes.min(60);
        [
            encode_temperature(self.comfort),
            encode_temperature(self.eco),
            encode_temperature(self.maximum),
            encode_temperature(self.minimum),
            ((offset + 3.5) * 2.0).round() as u8,
            encode_temperature(self.window_open_temperature),
            minutes.div_ceil(5) as u8,
        ]
    }
}

/// Valve configuration of a radiator thermostat
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ValveConfig {
    /// Boost duration in minutes (0-60)
    pub boost_duration_minutes: u32,
    /// Valve opening during boost in percent
    pub boost_valve_position: u8,
    /// Decalcification weekday (0 = Saturday .. 6 = Friday)
    pub decalcification_day: u8,
    /// Decalcification hour (0-23)
    pub decalcification_hour: u8,
    /// Maximum valve opening in percent
    pub max_valve_setting: u8,
    /// Valve offset in percent
    pub valve_offset: u8,
}

impl Default for ValveConfig {
    fn default() -> Self {
        Self {
            boost_duration_minutes: 5,
            boost_valve_position: 100,
            decalcification_day: 0,
            decalcification_hour: 12,
            max_valve_setting: 100,
            valve_offset: 0,
        }
    }
}

impl ValveConfig {
    /// Encode as the 4 byte ConfigValve payload
    pub fn encode(&self) -> [u8; 4] {
        let position = u32::from(self.boost_valve_position.min(100));
        let boost = (boost_duration_code(self.boost_duration_minutes) << 5)
            | (position as f64 / 5.0).round() as u8;
        let decalc = (self.decalcification_day.min(6) << 5) | self.decalcification_hour.min(23);
        [
            boost,
            decalc,
            scale_percent(self.max_valve_setting),
            scale_percent(self.valve_offset),
        ]
    }
}

/// Wire code for a boost duration, rounding up to the next step
pub fn boost_duration_code(minutes: u32) -> u8 {
    let minutes = minutes.min(60);
    BOOST_STEPS
        .iter()
        .find(|(step, _)| minutes <= *step)
        .map_or(7, |(_, code)| *code)
}

/// Percent to 0-255
fn scale_percent(percent: u8) -> u8 {
    (u32::from(percent.min(100)) * 255 / 100) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_temperatures() {
        assert_eq!(
            TemperatureConfig::default().encode(),
            [42, 34, 61, 9, 7, 24, 2]
        );
    }

    #[test]
    fn test_temperatures_clamped() {
        let config = TemperatureConfig {
            comfort: 35.0,
            eco: 2.0,
            offset: -5.0,
            window_open_minutes: 90,
            ..Default::default()
        };
        let payload = config.encode();
        assert_eq!(payload[0], 61);
        assert_eq!(payload[1], 9);
        assert_eq!(payload[4], 0);
        assert_eq!(payload[6], 12);
    }

    #[test]
    fn test_window_minutes_round_up() {
        let config = TemperatureConfig {
            window_open_minutes: 11,
            ..Default::default()
        };
        assert_eq!(config.encode()[6], 3);
    }

    #[test]
    fn test_boost_duration_steps() {
        assert_eq!(boost_duration_code(0), 0);
        assert_eq!(boost_duration_code(1), 1);
        assert_eq!(boost_duration_code(5), 1);
        assert_eq!(boost_duration_code(6), 2);
        assert_eq!(boost_duration_code(25), 5);
        assert_eq!(boost_duration_code(30), 6);
        assert_eq!(boost_duration_code(31), 7);
        assert_eq!(boost_duration_code(60), 7);
        assert_eq!(boost_duration_code(500), 7);
    }

    #[test]
    fn test_default_valve() {
        // boost 5 min at 100%, Saturday 12:00, max 100%, offset 0
        assert_eq!(
            ValveConfig::default().encode(),
            [(1 << 5) | 20, 12, 255, 0]
        );
    }

    #[test]
    fn test_valve_clamped() {
        let config = ValveConfig {
            boost_duration_minutes: 45,
            boost_valve_position: 150,
            decalcification_day: 9,
            decalcification_hour: 30,
            max_valve_setting: 50,
            valve_offset: 10,
        };
        assert_eq!(config.encode(), [(7 << 5) | 20, (6 << 5) | 23, 127, 25]);
    }
}
