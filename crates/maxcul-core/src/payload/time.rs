//! TimeInformation payload (0x03)

use chrono::{Datelike, NaiveDateTime, Timelike};

/// Encode local time for a TimeInformation frame
///
/// Layout: year-2000 · day · hour · minute with month bits 2-3 in bits 6-7
/// · second with month bits 0-1 in bits 6-7.
pub fn encode(time: NaiveDateTime) -> [u8; 5] {
    let month = time.month() as u8;
    [
        (time.year() - 2000).clamp(0, 0xFF) as u8,
        time.day() as u8,
        time.hour() as u8,
        time.minute() as u8 | ((month & 0x0C) << 4),
        time.second() as u8 | ((month & 0x03) << 6),
    ]
}
