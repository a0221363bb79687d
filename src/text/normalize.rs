use crate::models::LocationMention;

/// Administrative and generic terms that carry no identifying information.
pub const STOP_WORDS: &[&str] = &[
    "village",
    "hamlet",
    "settlement",
    "town",
    "city",
    "municipality",
    "locality",
    "neighborhood",
    "neighbourhood",
    "vicinity",
    "community",
    "area",
    "region",
    "zone",
    "district",
    "near",
];

fn is_stop_word(word: &str) -> bool {
    STOP_WORDS.iter().any(|s| s.eq_ignore_ascii_case(word))
}

/// Strip ASCII punctuation, drop stop words (whole words, any case) and
/// collapse whitespace. Idempotent.
pub fn normalize(text: &str) -> String {
    let without_punct: String = text.chars().filter(|c| !c.is_ascii_punctuation()).collect();

    without_punct
        .split_whitespace()
        .filter(|word| !is_stop_word(word))
        .collect::<Vec<_>>()
        .join(" ")
}

fn normalize_opt(field: &Option<String>) -> Option<String> {
    field
        .as_deref()
        .map(normalize)
        .filter(|s| !s.is_empty())
}

/// Normalized copy of the fields used for matching. Pincode and kind pass
/// through untouched.
pub fn normalize_mention(mention: &LocationMention) -> LocationMention {
    LocationMention {
        settlement_name: normalize(&mention.settlement_name),
        settlement_kind: mention.settlement_kind,
        area_name: normalize_opt(&mention.area_name),
        district_name: normalize_opt(&mention.district_name),
        state_name: normalize_opt(&mention.state_name),
        pincode: mention.pincode.clone(),
        nearby_hint: normalize_opt(&mention.nearby_hint),
    }
}
