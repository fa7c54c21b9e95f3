use alloy::primitives::hex;
use anyhow::Result;

/// Placeholder shown when a histogram key cannot be decoded back to bytes
pub const DECODE_ERROR: &str = "(decode error)";

/// Canonical histogram key for raw extra-data bytes
///
/// # Examples
/// ```
/// use rs_extradata_scanner::utils::format::encode_extra_data;
///
/// assert_eq!(encode_extra_data(&[]), "0x");
/// assert_eq!(encode_extra_data(&[0xDE, 0xAD]), "0xdead");
/// ```
pub fn encode_extra_data(bytes: &[u8]) -> String {
    hex::encode_prefixed(bytes)
}

/// Inverse of [`encode_extra_data`]
pub fn decode_extra_key(key: &str) -> Result<Vec<u8>> {
    let Some(digits) = key.strip_prefix("0x") else {
        anyhow::bail!("extra-data key {key:?} is not 0x-prefixed");
    };
    Ok(hex::decode(digits)?)
}

/// Lossy UTF-8 rendering of a key, for display only
pub fn display_extra_data(key: &str) -> String {
    match decode_extra_key(key) {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(_) => DECODE_ERROR.to_string(),
    }
}

/// Share of `count` in `total`, two decimals
pub fn format_percentage(count: u64, total: u64) -> String {
    if total == 0 {
        return "0.00%".to_string();
    }
    format!("{:.2}%", count as f64 / total as f64 * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::ERROR_KEY;

    #[test]
    fn test_encode_is_lowercase_and_prefixed() {
        assert_eq!(encode_extra_data(&[0xCA, 0xFE, 0xBA, 0xBE]), "0xcafebabe");
        assert_eq!(encode_extra_data(&[0x00, 0x0f]), "0x000f");
    }

    #[test]
    fn test_decode_round_trip() {
        let samples: [&[u8]; 4] = [b"", b"geth", &[0xff, 0x00, 0x7f], b"Nethermind v1.25.4"];
        for bytes in samples {
            let key = encode_extra_data(bytes);
            assert_eq!(decode_extra_key(&key).unwrap(), bytes);
        }
    }

    #[test]
    fn test_decode_rejects_non_keys() {
        assert!(decode_extra_key(ERROR_KEY).is_err());
        assert!(decode_extra_key("deadbeef").is_err());
        assert!(decode_extra_key("0xzz").is_err());
        assert!(decode_extra_key("0xabc").is_err());
    }

    #[test]
    fn test_display_extra_data() {
        assert_eq!(display_extra_data(&encode_extra_data(b"erigon")), "erigon");
        assert_eq!(display_extra_data(ERROR_KEY), DECODE_ERROR);
        assert_eq!(display_extra_data("0xff"), "\u{fffd}");
    }

    #[test]
    fn test_format_percentage() {
        assert_eq!(format_percentage(3, 5), "60.00%");
        assert_eq!(format_percentage(1, 3), "33.33%");
        assert_eq!(format_percentage(0, 0), "0.00%");
    }
}
