//! NMEA timestamp decoding on top of the `nmea0183` parser.
//!
//! Only RMC sentences are decoded: they carry both date and time, and the
//! receiver only emits them once it considers the time valid.

use nmea0183::{ParseResult, Parser, Sentence};

use crate::clock::ClockTime;
use crate::io::GpsDecoder;

/// [`GpsDecoder`] that turns `$xxRMC` sentences into UTC timestamps.
pub struct NmeaTimestampDecoder {
    parser: Parser,
}

impl NmeaTimestampDecoder {
    pub fn new() -> Self {
        Self {
            parser: Parser::new().sentence_filter(Sentence::RMC | Sentence::RMC),
        }
    }
}

impl Default for NmeaTimestampDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl GpsDecoder for NmeaTimestampDecoder {
    fn try_decode_timestamp(&mut self, line: &str) -> Option<ClockTime> {
        let mut decoded = None;
        // The parser frames sentences on CR LF, which the serial shim strips.
        for bytes in [line.trim().as_bytes(), b"\r\n"] {
            for result in self.parser.parse_from_bytes(bytes) {
                match result {
                    Ok(ParseResult::RMC(Some(rmc))) => {
                        let nmea0183::datetime::Date { day, month, year } = rmc.datetime.date;
                        let nmea0183::datetime::Time {
                            hours,
                            minutes,
                            seconds,
                        } = rmc.datetime.time;
                        debug!("rmc {}:{}:{} {}-{}-{}", hours, minutes, seconds, day, month, year);
                        decoded = ClockTime::new(year, month, day, hours, minutes, seconds as u8);
                    }
                    Ok(_) => {}
                    Err(_e) => trace!("NMEA parse error"),
                }
            }
        }
        decoded
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIX: &str =
        "$GPRMC,123519.00,A,4807.038,N,01131.000,E,022.4,084.4,010624,003.1,W,A*27";

    #[test]
    fn decodes_date_and_time_from_a_valid_rmc() {
        let mut decoder = NmeaTimestampDecoder::new();
        assert_eq!(
            decoder.try_decode_timestamp(FIX),
            ClockTime::new(2024, 6, 1, 12, 35, 19)
        );
        assert!(decoder.try_decode_timestamp(FIX).is_some());
    }

    #[test]
    fn decodes_after_a_rejected_line() {
        let mut decoder = NmeaTimestampDecoder::new();
        assert_eq!(decoder.try_decode_timestamp("$GPRMC,broken*00"), None);
        assert_eq!(
            decoder.try_decode_timestamp(FIX),
            ClockTime::new(2024, 6, 1, 12, 35, 19)
        );
    }

    #[test]
    fn ignores_rmc_without_a_fix() {
        let mut decoder = NmeaTimestampDecoder::new();
        assert_eq!(
            decoder.try_decode_timestamp("$GPRMC,123519.00,V,,,,,,,010624,,,N*71"),
            None
        );
    }

    #[test]
    fn ignores_sentences_without_a_date() {
        let mut decoder = NmeaTimestampDecoder::new();
        assert_eq!(
            decoder.try_decode_timestamp("$GPGGA,120000.00,,,,,0,00,,,M,,M,,*66"),
            None
        );
    }

    #[test]
    fn ignores_garbage() {
        let mut decoder = NmeaTimestampDecoder::new();
        assert_eq!(decoder.try_decode_timestamp("OK"), None);
        assert_eq!(decoder.try_decode_timestamp(""), None);
        assert_eq!(decoder.try_decode_timestamp("$GPRMC,broken*00"), None);
    }
}
