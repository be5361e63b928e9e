// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

use chrono::DateTime;

const BINARY_UNITS: [&str; 8] = ["KiB", "MiB", "GiB", "TiB", "PiB", "EiB", "ZiB", "YiB"];

/// Render epoch seconds as `YYYY-MM-DDTHH:MM:SSZ` (UTC), dropping fractions
#[must_use]
pub fn readable_timestamp(epoch_secs: f64) -> String {
    DateTime::from_timestamp(epoch_secs.floor() as i64, 0)
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%SZ").to_string())
        .unwrap_or_else(|| format!("{epoch_secs}"))
}

/// Human readable size in binary units: `1 Byte`, `571 Bytes`, `4.0 KiB`
#[must_use]
pub fn natural_size(bytes: u64) -> String {
    if bytes == 1 {
        return "1 Byte".to_string();
    }
    if bytes < 1024 {
        return format!("{bytes} Bytes");
    }

    let value = bytes as f64;
    let mut unit = 1024.0_f64;
    for suffix in BINARY_UNITS {
        unit *= 1024.0;
        if value < unit {
            return format!("{:.1} {suffix}", value * 1024.0 / unit);
        }
    }
    format!("{:.1} YiB", value * 1024.0 / unit)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_readable_timestamp() {
        assert_eq!(readable_timestamp(1_618_084_800.0), "2021-04-10T20:00:00Z");
        assert_eq!(readable_timestamp(1_644_801_907.246_360_5), "2022-02-14T01:25:07Z");
        assert_eq!(readable_timestamp(0.0), "1970-01-01T00:00:00Z");
    }

    #[test]
    fn test_natural_size() {
        assert_eq!(natural_size(0), "0 Bytes");
        assert_eq!(natural_size(1), "1 Byte");
        assert_eq!(natural_size(571), "571 Bytes");
        assert_eq!(natural_size(4096), "4.0 KiB");
        assert_eq!(natural_size(1536), "1.5 KiB");
        assert_eq!(natural_size(5 * 1024 * 1024), "5.0 MiB");
    }
}
