//! Address normalization
//!
//! Pure string transformation, deliberately free of any network concern so
//! it can be tested in isolation. The appraiser's address search wants
//! abbreviated street suffixes and directions, bare ordinal street numbers
//! ("8" rather than "8TH"), and uppercase text.

/// Ordered substitution table applied to the uppercased address.
///
/// Replacements run top to bottom as plain substring substitutions, so order
/// is significant: the compound directions must be rewritten before the
/// cardinal ones ("NORTHWEST" becomes "NW", not "NWEST"), and a later rule
/// may act on the output of an earlier one.
const ADDRESS_REPLACEMENTS: &[(&str, &str)] = &[
    ("DRIVE", "DR"),
    ("COURT", "CT"),
    ("STREET", "ST"),
    ("LANE", "LN"),
    ("AVENUE", "AVE"),
    ("TERRACE", "TER"),
    ("EXTENSION", ""),
    ("NORTHWEST", "NW"),
    ("NORTHEAST", "NE"),
    ("SOUTHWEST", "SW"),
    ("SOUTHEAST", "SE"),
    ("NORTH", "N"),
    ("SOUTH", "S"),
    ("EAST", "E"),
    ("WEST", "W"),
];

/// Normalize a free-text site address for the appraiser's address search.
///
/// Uppercases, collapses whitespace runs, strips letters from tokens that
/// carry a street number ("8TH" -> "8", the leading house number excepted),
/// then applies the substitution table in order.
pub fn normalize_address(address: &str) -> String {
    let upper = address.to_uppercase();
    let mut tokens: Vec<String> = upper.split_whitespace().map(str::to_string).collect();

    for token in tokens.iter_mut().skip(1) {
        if token.chars().any(|c| c.is_ascii_digit()) {
            *token = token.chars().filter(|c| c.is_ascii_digit()).collect();
        }
    }

    let mut normalized = tokens.join(" ");
    for (pattern, replacement) in ADDRESS_REPLACEMENTS {
        normalized = normalized.replace(pattern, replacement);
    }
    normalized
}

/// Leading house-number token of an address, parsed as an integer.
///
/// `None` when the address is empty or does not start with a number.
pub fn leading_house_number(address: &str) -> Option<i64> {
    address.split_whitespace().next()?.parse().ok()
}
