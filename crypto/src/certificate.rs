//! Share certificate numbers: `CERT-<epoch>-<rand8>`.

use chama_types::Timestamp;
use rand::distributions::Alphanumeric;
use rand::Rng;

const PREFIX: &str = "CERT-";
const SUFFIX_LEN: usize = 8;

/// A fresh certificate number for a holding issued at `issued_at`.
pub fn certificate_number(issued_at: Timestamp) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SUFFIX_LEN)
        .map(|b| char::from(b).to_ascii_uppercase())
        .collect();
    format!("{PREFIX}{}-{suffix}", issued_at.as_secs())
}

/// Whether `s` has the certificate number shape.
pub fn is_certificate_number(s: &str) -> bool {
    let Some(rest) = s.strip_prefix(PREFIX) else {
        return false;
    };
    let Some((epoch, suffix)) = rest.split_once('-') else {
        return false;
    };
    !epoch.is_empty()
        && epoch.chars().all(|c| c.is_ascii_digit())
        && suffix.len() == SUFFIX_LEN
        && suffix.chars().all(|c| c.is_ascii_alphanumeric())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn has_expected_shape() {
        let cert = certificate_number(Timestamp::new(1_700_000_000));
        assert!(cert.starts_with("CERT-1700000000-"));
        assert!(is_certificate_number(&cert));
    }

    #[test]
    fn numbers_differ() {
        let ts = Timestamp::new(42);
        assert_ne!(certificate_number(ts), certificate_number(ts));
    }

    #[test]
    fn shape_check_rejects_others() {
        assert!(!is_certificate_number("CERT-abc-ABCDEFGH"));
        assert!(!is_certificate_number("CERT-1-ABC"));
        assert!(!is_certificate_number("HOLD-1-ABCDEFGH"));
    }
}
