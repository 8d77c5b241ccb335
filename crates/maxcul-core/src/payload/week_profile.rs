//! ConfigWeekProfile (0x10) payloads
//!
//! A day holds up to 13 set-points and is sent in two frames: the first seven
//! points, then the rest with 0x10 or'd into the weekday byte. Each point is
//! a big-endian u16: setpoint in half degrees in bits 9-15, the end of the
//! period as a 5 minute slot in bits 0-8.

use byteorder::{BigEndian, ByteOrder};
use chrono::Weekday;
use serde::{Deserialize, Serialize};

use super::{encode_temperature, PayloadError};

/// Most set-points a day can hold
pub const MAX_SET_POINTS: usize = 13;

/// Set-points carried by one frame
pub const POINTS_PER_FRAME: usize = 7;

/// Marks the second half of a day
const SECOND_HALF: u8 = 0x10;

/// Slot for 24:00
const END_OF_DAY: u16 = 288;

/// One period of a day program: hold `temperature` until `hour:minute`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SetPoint {
    /// Setpoint in °C
    pub temperature: f64,
    /// End hour (24 for end of day)
    pub hour: u8,
    /// End minute
    pub minute: u8,
}

impl SetPoint {
    /// Period end as a 5 minute slot
    pub fn slot(&self) -> u16 {
        let slot = u16::from(self.hour) * 12 + (f64::from(self.minute) / 5.0).round() as u16;
        slot.min(END_OF_DAY)
    }

    fn encode(&self) -> [u8; 2] {
        let value = (u16::from(encode_temperature(self.temperature)) << 9) | self.slot();
        let mut out = [0u8; 2];
        BigEndian::write_u16(&mut out, value);
        out
    }
}

/// Weekday byte (0 = Saturday .. 6 = Friday)
pub fn weekday_code(day: Weekday) -> u8 {
    ((day.num_days_from_monday() + 2) % 7) as u8
}

/// Encode a day program into one or two frame payloads
pub fn encode(day: Weekday, points: &[SetPoint]) -> Result<Vec<Vec<u8>>, PayloadError> {
    if points.is_empty() || points.len() > MAX_SET_POINTS {
        return Err(PayloadError::InvalidValue(format!(
            "a day program holds 1 to {} set-points, got {}",
            MAX_SET_POINTS,
            points.len()
        )));
    }

    let code = weekday_code(day);
    let payloads = points
        .chunks(POINTS_PER_FRAME)
        .enumerate()
        .map(|(half, chunk)| {
            let mut payload = Vec::with_capacity(1 + chunk.len() * 2);
            payload.push(if half == 0 { code } else { code | SECOND_HALF });
            for point in chunk {
                payload.extend_from_slice(&point.encode());
            }
            payload
        })
        .collect();
    Ok(payloads)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(temperature: f64, hour: u8, minute: u8) -> SetPoint {
        SetPoint {
            temperature,
            hour,
            minute,
        }
    }

    #[test]
    fn test_weekday_codes() {
        assert_eq!(weekday_code(Weekday::Sat), 0);
        assert_eq!(weekday_code(Weekday::Sun), 1);
        assert_eq!(weekday_code(Weekday::Mon), 2);
        assert_eq!(weekday_code(Weekday::Fri), 6);
    }

    #[test]
    fn test_slot() {
        assert_eq!(point(17.0, 6, 0).slot(), 72);
        assert_eq!(point(17.0, 6, 32).slot(), 78);
        assert_eq!(point(17.0, 24, 0).slot(), 288);
    }

    #[test]
    fn test_single_frame() {
        let payloads = encode(Weekday::Mon, &[point(17.0, 6, 0), point(21.0, 24, 0)]).unwrap();
        assert_eq!(payloads.len(), 1);
        // 17 °C until 06:00 -> (34 << 9) | 72 = 0x4448; 21 °C until 24:00 -> (42 << 9) | 288 = 0x5520
        assert_eq!(payloads[0], vec![0x02, 0x44, 0x48, 0x55, 0x20]);
    }

    #[test]
    fn test_thirteen_points_split() {
        let points: Vec<SetPoint> = (0..13).map(|i| point(20.0, i + 1, 0)).collect();
        let payloads = encode(Weekday::Sat, &points).unwrap();
        assert_eq!(payloads.len(), 2);
        assert_eq!(payloads[0].len(), 1 + 7 * 2);
        assert_eq!(payloads[1].len(), 1 + 6 * 2);
        assert_eq!(payloads[0][0], 0x00);
        assert_eq!(payloads[1][0], 0x10);
    }

    #[test]
    fn test_too_many_points() {
        let points = vec![point(20.0, 24, 0); 14];
        assert!(encode(Weekday::Sun, &points).is_err());
        assert!(encode(Weekday::Sun, &[]).is_err());
    }
}
