//! Derived listing fields.

use super::Listing;

/// Generate a lowercase, URL-safe slug from a listing name.
///
/// Accented Latin letters fold to their ASCII base (`é` to `e`, `ß` to
/// `ss`). ASCII letters and digits are kept, whitespace, `-` and `_` become
/// single separators, everything else is dropped.
#[must_use]
pub fn slugify(name: &str) -> String {
    let mut folded = String::with_capacity(name.len());
    for c in name.to_lowercase().chars() {
        if c.is_ascii_alphanumeric() {
            folded.push(c);
        } else if c.is_whitespace() || c == '-' || c == '_' {
            folded.push('-');
        } else if let Some(ascii) = fold_latin(c) {
            folded.push_str(ascii);
        }
    }
    folded
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

fn fold_latin(c: char) -> Option<&'static str> {
    let ascii = match c {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' | 'ā' | 'ă' | 'ą' => "a",
        'æ' => "ae",
        'ç' | 'ć' | 'ĉ' | 'ċ' | 'č' => "c",
        'ď' | 'đ' | 'ð' => "d",
        'è' | 'é' | 'ê' | 'ë' | 'ē' | 'ĕ' | 'ė' | 'ę' | 'ě' => "e",
        'ĝ' | 'ğ' | 'ġ' | 'ģ' => "g",
        'ĥ' | 'ħ' => "h",
        'ì' | 'í' | 'î' | 'ï' | 'ĩ' | 'ī' | 'ĭ' | 'į' | 'ı' => "i",
        'ĵ' => "j",
        'ķ' => "k",
        'ĺ' | 'ļ' | 'ľ' | 'ŀ' | 'ł' => "l",
        'ñ' | 'ń' | 'ņ' | 'ň' => "n",
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' | 'ō' | 'ŏ' | 'ő' => "o",
        'œ' => "oe",
        'ŕ' | 'ŗ' | 'ř' => "r",
        'ś' | 'ŝ' | 'ş' | 'š' | 'ș' => "s",
        'ß' => "ss",
        'ţ' | 'ť' | 'ŧ' | 'ț' => "t",
        'þ' => "th",
        'ù' | 'ú' | 'û' | 'ü' | 'ũ' | 'ū' | 'ŭ' | 'ů' | 'ű' | 'ų' => "u",
        'ŵ' => "w",
        'ý' | 'ÿ' | 'ŷ' => "y",
        'ź' | 'ż' | 'ž' => "z",
        _ => return None,
    };
    Some(ascii)
}

/// Round a rating to one decimal place.
///
/// Applied on every write of `ratingsAverage`, whichever path performs it.
#[must_use]
pub fn round_rating(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Recompute every derived field from the document's current state.
///
/// Idempotent: running it on an already-derived listing changes nothing.
pub fn apply_derivations(listing: &mut Listing) {
    listing.slug = slugify(&listing.name);
    listing.ratings_average = round_rating(listing.ratings_average);
}
