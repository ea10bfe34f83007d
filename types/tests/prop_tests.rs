use proptest::prelude::*;

use chama_types::{parse_timestamp, Amount, Currency, Threshold, Timestamp};

proptest! {
    /// Formatting then parsing an amount yields the same minor units.
    #[test]
    fn currency_format_parse_is_lossless(minor in 0u64..1_000_000_000_000, digits in 0u32..=4) {
        let currency = Currency::new("KES", digits).unwrap();
        let rendered = currency.format(Amount::new(minor));
        let number = rendered.trim_start_matches("KES ");
        prop_assert_eq!(currency.parse(number).unwrap(), Amount::new(minor));
    }

    /// ⌈T·E⌉ is the smallest vote count reaching the threshold.
    #[test]
    fn required_votes_is_minimal(bps in 1u32..=10_000, eligible in 0u32..10_000) {
        let t = Threshold::from_bps(bps).unwrap();
        let need = t.required_votes(eligible);
        prop_assert!(u64::from(need) * 10_000 >= u64::from(bps) * u64::from(eligible));
        if need > 0 {
            prop_assert!(u64::from(need - 1) * 10_000 < u64::from(bps) * u64::from(eligible));
        }
        prop_assert!(need <= eligible);
    }

    /// Canonical rendering always parses back to the same second.
    #[test]
    fn canonical_time_is_parseable(secs in 0u64..4_102_444_800) {
        let ts = Timestamp::new(secs);
        prop_assert_eq!(parse_timestamp(&ts.to_rfc3339()).unwrap(), ts);
    }

    /// Timestamp ordering: new(a) <= new(b) iff a <= b.
    #[test]
    fn timestamp_ordering(a in 0u64..u64::MAX, b in 0u64..u64::MAX) {
        prop_assert_eq!(Timestamp::new(a) <= Timestamp::new(b), a <= b);
    }
}
