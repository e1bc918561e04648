//! Reader for `/proc/self/mountinfo`.
//!
//! Line format: `ID PARENT_ID MAJOR:MINOR ROOT MOUNT_POINT OPTIONS ...`,
//! with whitespace and backslashes in paths escaped as three-digit octal.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};

use dns_overlay_common::constants::MOUNTINFO_PATH;

/// Field index of the mount point.
const MOUNT_POINT_FIELD: usize = 4;

/// Mount points listed in a mountinfo stream, in table order.
///
/// Stacked mounts appear once per layer.
///
/// # Errors
///
/// Returns an error if the stream cannot be read.
pub fn mount_points(reader: impl BufRead) -> io::Result<Vec<PathBuf>> {
    let mut points = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if let Some(field) = line.split_whitespace().nth(MOUNT_POINT_FIELD) {
            points.push(PathBuf::from(unescape(field)));
        }
    }
    Ok(points)
}

/// Number of mounts stacked at `target` in the caller's namespace.
///
/// # Errors
///
/// Returns an error if `/proc/self/mountinfo` cannot be read.
pub fn mount_count(target: &Path) -> io::Result<usize> {
    let file = File::open(MOUNTINFO_PATH)?;
    let points = mount_points(BufReader::new(file))?;
    Ok(points.iter().filter(|point| point.as_path() == target).count())
}

fn unescape(field: &str) -> String {
    let bytes = field.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let escape = bytes.get(i + 1..i + 4).filter(|digits| is_octal_triplet(digits));
        if let (b'\\', Some(digits)) = (bytes[i], escape) {
            let value = digits
                .iter()
                .fold(0u32, |acc, digit| acc * 8 + u32::from(digit - b'0'));
            if let Ok(byte) = u8::try_from(value) {
                out.push(byte);
                i += 4;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn is_octal_triplet(digits: &[u8]) -> bool {
    digits.len() == 3 && digits.iter().all(|d| (b'0'..=b'7').contains(d))
}
