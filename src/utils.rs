//! Utility functions

/// Calculate checksum (CRC32) for data
pub fn calculate_checksum(data: &[u8]) -> u32 {
    let mut crc = 0xFFFFFFFFu32;

    for &byte in data {
        crc ^= byte as u32;
        for _ in 0..8 {
            if crc & 1 != 0 {
                crc = (crc >> 1) ^ 0xEDB88320;
            } else {
                crc >>= 1;
            }
        }
    }

    !crc
}

/// Product of `values`, `None` on overflow
pub fn checked_product(values: &[usize]) -> Option<usize> {
    values.iter().try_fold(1usize, |acc, &v| acc.checked_mul(v))
}

/// Format byte size in human-readable form
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB", "PB"];

    let mut size = bytes as f64;
    let mut unit_idx = 0;

    while size >= 1024.0 && unit_idx < UNITS.len() - 1 {
        size /= 1024.0;
        unit_idx += 1;
    }

    if unit_idx == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.2} {}", size, UNITS[unit_idx])
    }
}

/// Row-major strides for a shape
pub fn strides(shape: &[usize]) -> Vec<usize> {
    let mut strides = vec![1; shape.len()];
    for i in (0..shape.len().saturating_sub(1)).rev() {
        strides[i] = strides[i + 1] * shape[i + 1];
    }
    strides
}

/// Visit every index of the box `[start, end)` in row-major order.
///
/// Does nothing if any extent is empty.
pub fn for_each_index<F>(start: &[usize], end: &[usize], mut callback: F)
where
    F: FnMut(&[usize]),
{
    debug_assert_eq!(start.len(), end.len());
    if start.is_empty() || start.iter().zip(end).any(|(s, e)| s >= e) {
        return;
    }

    let mut coords = start.to_vec();
    loop {
        callback(&coords);

        let mut dim = coords.len() - 1;
        loop {
            coords[dim] += 1;
            if coords[dim] < end[dim] {
                break;
            }
            coords[dim] = start[dim];
            if dim == 0 {
                return;
            }
            dim -= 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum() {
        // Standard CRC32 check value
        assert_eq!(calculate_checksum(b"123456789"), 0xCBF43926);
        assert_ne!(calculate_checksum(b"123456788"), 0xCBF43926);
    }

    #[test]
    fn test_checked_product() {
        assert_eq!(checked_product(&[4, 3, 2]), Some(24));
        assert_eq!(checked_product(&[]), Some(1));
        assert_eq!(checked_product(&[usize::MAX / 2, 3]), None);
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(1536), "1.50 KB");
        assert_eq!(format_bytes(1048576), "1.00 MB");
    }

    #[test]
    fn test_strides() {
        assert_eq!(strides(&[4, 3, 2]), vec![6, 2, 1]);
        assert_eq!(strides(&[7]), vec![1]);
        assert!(strides(&[]).is_empty());
    }

    #[test]
    fn test_for_each_index() {
        let mut visited = Vec::new();
        for_each_index(&[1, 0], &[3, 2], |c| visited.push(c.to_vec()));
        assert_eq!(visited, vec![vec![1, 0], vec![1, 1], vec![2, 0], vec![2, 1]]);

        let mut calls = 0;
        for_each_index(&[0, 2], &[4, 2], |_| calls += 1);
        assert_eq!(calls, 0);
    }
}
