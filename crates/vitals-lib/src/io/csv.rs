use csv::{ReaderBuilder, Trim};
use std::io::Read;
use std::path::Path;

use crate::error::VitalsError;
use crate::reading::Reading;

/// Parse scripted readings from CSV with a
/// `timestamp,heart_rate,oxygen_level,body_temp,acceleration` header.
pub fn parse_readings<R: Read>(input: R) -> Result<Vec<Reading>, VitalsError> {
    let mut reader = ReaderBuilder::new()
        .trim(Trim::All)
        .comment(Some(b'#'))
        .from_reader(input);
    let mut readings = Vec::new();
    for row in reader.deserialize::<Reading>() {
        readings.push(row?);
    }
    if readings.is_empty() {
        return Err(VitalsError::EmptyInput);
    }
    Ok(readings)
}

pub fn read_readings(path: &Path) -> Result<Vec<Reading>, VitalsError> {
    let file = std::fs::File::open(path)?;
    parse_readings(file)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_rows_in_order() {
        let text = "timestamp,heart_rate,oxygen_level,body_temp,acceleration\n\
                    # warm-up\n\
                    1.0, 72, 98.0, 36.8, 1.2\n\
                    2.0, 149, 97.0, 37.0, 2.0\n";
        let readings = parse_readings(text.as_bytes()).unwrap();
        assert_eq!(readings.len(), 2);
        assert_eq!(readings[1].heart_rate, 149.0);
        assert_eq!(readings[0].body_temp, 36.8);
    }

    #[test]
    fn header_only_is_empty_input() {
        let text = "timestamp,heart_rate,oxygen_level,body_temp,acceleration\n";
        assert!(matches!(
            parse_readings(text.as_bytes()),
            Err(VitalsError::EmptyInput)
        ));
    }

    #[test]
    fn bad_number_is_a_csv_error() {
        let text = "timestamp,heart_rate,oxygen_level,body_temp,acceleration\n1,fast,98,36,1\n";
        assert!(matches!(
            parse_readings(text.as_bytes()),
            Err(VitalsError::Csv(_))
        ));
    }
}
