use base64::{Engine as _, engine::general_purpose};

pub const DEFAULT_MIME: &str = "image/jpeg";

/// Estimated length of the base64 text for `len` raw bytes, `ceil(len * 4 / 3)`.
pub fn estimate_encoded_len(len: u64) -> u64 {
    (len * 4).div_ceil(3)
}

/// Standard base64 of `bytes`.
///
/// With a chunk size the input is encoded piecewise; the size is rounded down
/// to a multiple of 3 so no chunk but the last emits padding and the output
/// is identical to the one-shot encoding.
pub fn encode_base64(bytes: &[u8], chunk_size: Option<usize>) -> String {
    let Some(chunk_size) = chunk_size else {
        return general_purpose::STANDARD.encode(bytes);
    };
    let chunk_size = (chunk_size / 3 * 3).max(3);
    let mut out = String::with_capacity(estimate_encoded_len(bytes.len() as u64) as usize + 3);
    for chunk in bytes.chunks(chunk_size) {
        general_purpose::STANDARD.encode_string(chunk, &mut out);
    }
    out
}

/// `data:<mime>;base64,<payload>`, falling back to `image/jpeg` for a blank mime.
pub fn to_data_url(mime: Option<&str>, bytes: &[u8], chunk_size: Option<usize>) -> String {
    let mime = mime.map(str::trim).filter(|m| !m.is_empty()).unwrap_or(DEFAULT_MIME);
    format!("data:{};base64,{}", mime, encode_base64(bytes, chunk_size))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::RngCore;

    fn decode_data_url(url: &str) -> (String, Vec<u8>) {
        let rest = url.strip_prefix("data:").expect("missing data: prefix");
        let (mime, payload) = rest.split_once(";base64,").expect("missing ;base64, marker");
        (mime.to_string(), general_purpose::STANDARD.decode(payload).expect("invalid base64"))
    }

    #[test]
    fn test_estimate_encoded_len() {
        assert_eq!(estimate_encoded_len(0), 0);
        assert_eq!(estimate_encoded_len(1), 2);
        assert_eq!(estimate_encoded_len(3), 4);
        assert_eq!(estimate_encoded_len(4), 6);
        assert_eq!(estimate_encoded_len(15 * 1024 * 1024), 20 * 1024 * 1024);
    }

    #[test]
    fn test_chunking_does_not_change_output() {
        let mut rng = rand::thread_rng();
        for len in [0usize, 1, 2, 3, 4, 5, 1023, 1024, 1025, 8191, 70_001] {
            let mut data = vec![0u8; len];
            rng.fill_bytes(&mut data);
            let expected = general_purpose::STANDARD.encode(&data);
            for chunk in [None, Some(0), Some(1), Some(2), Some(3), Some(4), Some(1000), Some(1024), Some(8192), Some(1 << 20)] {
                assert_eq!(encode_base64(&data, chunk), expected, "len {} chunk {:?}", len, chunk);
            }
        }
    }

    #[test]
    fn test_data_url_round_trip() {
        let mut rng = rand::thread_rng();
        let mut data = vec![0u8; 100 * 1024 + 7];
        rng.fill_bytes(&mut data);
        for chunk in [None, Some(1024), Some(8192), Some(5)] {
            let url = to_data_url(Some("image/png"), &data, chunk);
            let (mime, decoded) = decode_data_url(&url);
            assert_eq!(mime, "image/png");
            assert_eq!(decoded, data);
        }
    }

    #[test]
    fn test_data_url_default_mime() {
        assert_eq!(to_data_url(None, b"hi", None), "data:image/jpeg;base64,aGk=");
        assert_eq!(to_data_url(Some("  "), b"hi", None), "data:image/jpeg;base64,aGk=");
    }
}
