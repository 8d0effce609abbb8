//! Formatting utilities

use humansize::{DECIMAL, format_size};
use psp_gmo::glam::Vec3;

/// Format file size in human-readable format
pub fn format_bytes(bytes: u64) -> String {
    format_size(bytes, DECIMAL)
}

/// Format a vector with a fixed number of decimals
pub fn format_vec3(v: Vec3) -> String {
    format!("({:.3}, {:.3}, {:.3})", v.x, v.y, v.z)
}

/// Format a byte offset the way hex viewers show it
pub fn format_offset(offset: u32) -> String {
    format!("{offset:#010x}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(0), "0 B");
        assert_eq!(format_bytes(1024), "1.02 kB");
        assert_eq!(format_bytes(1048576), "1.05 MB");
    }

    #[test]
    fn test_format_vec3() {
        assert_eq!(format_vec3(Vec3::new(1.0, -0.5, 0.0)), "(1.000, -0.500, 0.000)");
    }

    #[test]
    fn test_format_offset() {
        assert_eq!(format_offset(0x18), "0x00000018");
    }
}
