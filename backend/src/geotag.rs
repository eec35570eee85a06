use std::io::Cursor;

use exif::{Exif, In, Tag, Value};
use shared::Coordinates;

/// Reads the GPS position from the EXIF block of a JPEG, if there is one.
pub fn extract_coordinates(image_bytes: &[u8]) -> Option<Coordinates> {
    let exif = exif::Reader::new()
        .read_from_container(&mut Cursor::new(image_bytes))
        .ok()?;

    let latitude = signed_degrees(&exif, Tag::GPSLatitude, Tag::GPSLatitudeRef, b'S')?;
    let longitude = signed_degrees(&exif, Tag::GPSLongitude, Tag::GPSLongitudeRef, b'W')?;
    Some(Coordinates {
        latitude,
        longitude,
    })
}

fn signed_degrees(exif: &Exif, value_tag: Tag, ref_tag: Tag, negative_ref: u8) -> Option<f64> {
    let degrees = match &exif.get_field(value_tag, In::PRIMARY)?.value {
        Value::Rational(parts) if parts.len() >= 3 => {
            parts[0].to_f64() + parts[1].to_f64() / 60.0 + parts[2].to_f64() / 3600.0
        }
        _ => return None,
    };
    if !degrees.is_finite() {
        return None;
    }

    let hemisphere = match &exif.get_field(ref_tag, In::PRIMARY)?.value {
        Value::Ascii(values) => values.first().and_then(|v| v.first().copied()),
        _ => None,
    }?;
    if hemisphere == negative_ref {
        Some(-degrees)
    } else {
        Some(degrees)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    type Dms = [(u32, u32); 3];

    fn entry(tiff: &mut Vec<u8>, tag: u16, kind: u16, count: u32, value: [u8; 4]) {
        tiff.extend_from_slice(&tag.to_be_bytes());
        tiff.extend_from_slice(&kind.to_be_bytes());
        tiff.extend_from_slice(&count.to_be_bytes());
        tiff.extend_from_slice(&value);
    }

    /// Minimal JPEG whose only segment is an APP1 EXIF block with a GPS IFD.
    fn jpeg_with_gps(lat: Dms, lat_ref: u8, lon: Dms, lon_ref: u8) -> Vec<u8> {
        const ASCII: u16 = 2;
        const LONG: u16 = 4;
        const RATIONAL: u16 = 5;

        let mut tiff = b"MM\x00\x2A".to_vec();
        tiff.extend_from_slice(&8u32.to_be_bytes());
        // IFD0 at 8, GPS IFD at 26, rationals at 80 and 104
        tiff.extend_from_slice(&1u16.to_be_bytes());
        entry(&mut tiff, 0x8825, LONG, 1, 26u32.to_be_bytes());
        tiff.extend_from_slice(&0u32.to_be_bytes());
        tiff.extend_from_slice(&4u16.to_be_bytes());
        entry(&mut tiff, 0x0001, ASCII, 2, [lat_ref, 0, 0, 0]);
        entry(&mut tiff, 0x0002, RATIONAL, 3, 80u32.to_be_bytes());
        entry(&mut tiff, 0x0003, ASCII, 2, [lon_ref, 0, 0, 0]);
        entry(&mut tiff, 0x0004, RATIONAL, 3, 104u32.to_be_bytes());
        tiff.extend_from_slice(&0u32.to_be_bytes());
        assert_eq!(tiff.len(), 80);
        for (num, denom) in lat.iter().chain(lon.iter()) {
            tiff.extend_from_slice(&num.to_be_bytes());
            tiff.extend_from_slice(&denom.to_be_bytes());
        }

        let mut jpeg = vec![0xFF, 0xD8, 0xFF, 0xE1];
        jpeg.extend_from_slice(&((2 + 6 + tiff.len()) as u16).to_be_bytes());
        jpeg.extend_from_slice(b"Exif\0\0");
        jpeg.extend_from_slice(&tiff);
        jpeg.extend_from_slice(&[0xFF, 0xD9]);
        jpeg
    }

    pub(crate) fn tsukuba_jpeg() -> Vec<u8> {
        jpeg_with_gps(
            [(36, 1), (0, 1), (45288, 1000)],
            b'N',
            [(140, 1), (5, 1), (4686, 100)],
            b'E',
        )
    }

    #[test]
    fn reads_northern_eastern_position() {
        let coordinates = extract_coordinates(&tsukuba_jpeg()).unwrap();
        assert!((coordinates.latitude - 36.01258).abs() < 1e-9);
        assert!((coordinates.longitude - 140.09635).abs() < 1e-9);
    }

    #[test]
    fn southern_and_western_refs_are_negative() {
        let jpeg = jpeg_with_gps(
            [(33, 1), (52, 1), (0, 1)],
            b'S',
            [(151, 1), (12, 1), (36, 1)],
            b'W',
        );
        let coordinates = extract_coordinates(&jpeg).unwrap();
        assert!((coordinates.latitude + (33.0 + 52.0 / 60.0)).abs() < 1e-9);
        assert!((coordinates.longitude + (151.0 + 12.0 / 60.0 + 36.0 / 3600.0)).abs() < 1e-9);
    }

    #[test]
    fn image_without_geotag_has_no_coordinates() {
        assert_eq!(extract_coordinates(&[0xFF, 0xD8, 0xFF, 0xD9]), None);
        assert_eq!(extract_coordinates(b"not an image"), None);
    }

    #[test]
    fn zero_denominator_is_ignored() {
        let jpeg = jpeg_with_gps([(36, 0), (0, 1), (0, 1)], b'N', [(140, 1), (0, 1), (0, 1)], b'E');
        assert_eq!(extract_coordinates(&jpeg), None);
    }
}
