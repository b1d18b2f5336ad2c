//! Headline classifier and convertible-bond scope filter.
//!
//! Classification is first-match over an ordered rule table, not best-match:
//! a headline that mentions both a refix and an issuance is a `Refix`.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::feed::types::Category;

/// Ordered `(category, keywords)` rules. Earlier rows win.
pub const CATEGORY_RULES: &[(Category, &[&str])] = &[
    (Category::Refix, &["리픽싱", "재조정"]),
    (Category::Conversion, &["전환청구", "전환가", "전환권 행사"]),
    (Category::Redemption, &["조기상환", "콜옵션", "풋옵션"]),
    (Category::Issue, &["발행결정", "발행", "매입", "취득"]),
];

/// Map free text to a category. Case-insensitive substring match.
pub fn classify(text: &str) -> Category {
    let t = text.to_lowercase();
    CATEGORY_RULES
        .iter()
        .find(|(_, kws)| kws.iter().any(|k| t.contains(&k.to_lowercase())))
        .map(|(cat, _)| *cat)
        .unwrap_or(Category::Other)
}

const BOND_TERMS: &str = r"(?:전환사채|\bCB\b|교환사채|\bEB\b|신주인수권부사채|\bBW\b)";
const EVENT_TERMS: &str =
    r"(?:리픽싱|전환가(?:액)?\s*조정|전환청구|조기상환|콜옵션|풋옵션|오버행|발행결정|납입)";

// `.` stops at newlines, so both terms have to share a line.
static CB_SCOPE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?i){BOND_TERMS}.*?{EVENT_TERMS}|{EVENT_TERMS}.*?{BOND_TERMS}"
    ))
    .expect("valid CB scope regex")
});

/// True when `text` mentions a bond instrument together with a bond event.
pub fn is_cb_related(text: &str) -> bool {
    CB_SCOPE.is_match(text)
}
