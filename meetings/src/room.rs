//! Conference room naming.
//!
//! A room name is derived from the group and meeting identifiers, so the same
//! meeting always maps to the same room: `<prefix>_<group>_<meeting>`, each
//! part reduced to `[A-Za-z0-9-]`, length within [`MIN_LEN`, `MAX_LEN`].

pub const MIN_LEN: usize = 3;
pub const MAX_LEN: usize = 63;

const PAD: &str = "room";

/// Keep `[A-Za-z0-9-]`, collapse runs of `-`, trim `-` at both ends.
fn clean(part: &str) -> String {
    let mut out = String::with_capacity(part.len());
    for c in part.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c);
        } else if c == '-' && !out.is_empty() && !out.ends_with('-') {
            out.push('-');
        }
    }
    while out.ends_with('-') {
        out.pop();
    }
    out
}

pub fn room_name(prefix: &str, group: &str, meeting: &str) -> String {
    let parts: Vec<String> = [prefix, group, meeting]
        .into_iter()
        .map(clean)
        .filter(|p| !p.is_empty())
        .collect();
    let mut name = parts.join("_");

    if name.len() > MAX_LEN {
        // Only ASCII remains, so byte truncation is char-safe.
        name.truncate(MAX_LEN);
        while name.ends_with(['-', '_']) {
            name.pop();
        }
    }
    if name.len() < MIN_LEN {
        if !name.is_empty() {
            name.push('_');
        }
        name.push_str(PAD);
    }
    name
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn joins_cleaned_parts() {
        assert_eq!(room_name("chama", "Umoja Group!", "AGM 2024"), "chama_UmojaGroup_AGM2024");
        assert_eq!(room_name("chama", "a--b", "--c--d--"), "chama_a-b_c-d");
    }

    #[test]
    fn uuid_parts_are_truncated_to_limit() {
        let name = room_name(
            "chama",
            "6f1c2f8e-4d3a-4b7e-9a51-0c2d3e4f5a6b",
            "0a1b2c3d-4e5f-4a6b-8c7d-9e0f1a2b3c4d",
        );
        assert_eq!(name.len(), MAX_LEN);
        assert!(name.starts_with("chama_6f1c2f8e-4d3a-4b7e-9a51-0c2d3e4f5a6b_0a1b2c3d"));
    }

    #[test]
    fn short_names_are_padded() {
        assert_eq!(room_name("", "", "x"), "x_room");
        assert_eq!(room_name("", "!!", "??"), "room");
    }

    proptest! {
        #[test]
        fn names_are_bounded_and_clean(prefix in ".{0,20}", group in ".{0,80}", meeting in ".{0,80}") {
            let name = room_name(&prefix, &group, &meeting);
            prop_assert!(name.len() >= MIN_LEN && name.len() <= MAX_LEN);
            prop_assert!(name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
            prop_assert!(!name.contains("--"));
            prop_assert_eq!(room_name(&prefix, &group, &meeting), name);
        }
    }
}
