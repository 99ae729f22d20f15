//! ISBN-10 / ISBN-13 validation and formatting.
//!
//! All functions are pure: they never fail beyond returning `false` or the
//! input unchanged.

/// Remove whitespace and hyphens from a scanned or typed code.
///
/// A lowercase `x` check character is upper-cased so one ISBN has one key.
pub fn clean(code: &str) -> String {
    code.chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .map(|c| if c == 'x' { 'X' } else { c })
        .collect()
}

/// Check whether `code` is a valid ISBN-10 or ISBN-13.
///
/// Whitespace and hyphens are ignored. Any length other than 10 or 13 is
/// invalid. Codes made only of zeros are rejected even though their check
/// digit works out: no ISBN is ever issued as all zeros, and a reader that
/// misreads a blank label tends to produce exactly that.
pub fn validate(code: &str) -> bool {
    let cleaned = clean(code);
    if !cleaned.is_ascii() || cleaned.chars().all(|c| c == '0') {
        return false;
    }
    match cleaned.len() {
        10 => validate_isbn10(&cleaned),
        13 => validate_isbn13(&cleaned),
        _ => false,
    }
}

/// Compute the ISBN-10 check character for the first nine digits.
///
/// Returns `None` unless `body` is exactly nine ASCII digits.
pub fn check_digit_10(body: &str) -> Option<char> {
    let digits = ascii_digits(body)?;
    if digits.len() != 9 {
        return None;
    }
    let sum: u32 = digits
        .iter()
        .enumerate()
        .map(|(i, d)| d * (10 - i as u32))
        .sum();
    match (11 - sum % 11) % 11 {
        10 => Some('X'),
        n => char::from_digit(n, 10),
    }
}

/// Compute the ISBN-13 check digit for the first twelve digits.
///
/// Returns `None` unless `body` is exactly twelve ASCII digits.
pub fn check_digit_13(body: &str) -> Option<char> {
    let digits = ascii_digits(body)?;
    if digits.len() != 12 {
        return None;
    }
    let sum: u32 = digits
        .iter()
        .enumerate()
        .map(|(i, d)| if i % 2 == 0 { *d } else { d * 3 })
        .sum();
    char::from_digit((10 - sum % 10) % 10, 10)
}

fn validate_isbn10(isbn: &str) -> bool {
    let (body, check) = isbn.split_at(9);
    match check_digit_10(body) {
        Some(expected) => check.eq_ignore_ascii_case(&expected.to_string()),
        None => false,
    }
}

fn validate_isbn13(isbn: &str) -> bool {
    let (body, check) = isbn.split_at(12);
    match check_digit_13(body) {
        Some(expected) => check == expected.to_string(),
        None => false,
    }
}

fn ascii_digits(s: &str) -> Option<Vec<u32>> {
    s.chars()
        .map(|c| if c.is_ascii_digit() { c.to_digit(10) } else { None })
        .collect()
}

/// Group an ISBN for display.
///
/// ISBN-10 becomes `X-XXX-XXXXX-X`, ISBN-13 becomes `XXX-X-XXX-XXXXX-X`.
/// Other lengths (and non-ASCII input) are returned unchanged.
pub fn format(code: &str) -> String {
    let cleaned = clean(code);
    if !cleaned.is_ascii() {
        return code.to_string();
    }
    match cleaned.len() {
        10 => format!(
            "{}-{}-{}-{}",
            &cleaned[0..1],
            &cleaned[1..4],
            &cleaned[4..9],
            &cleaned[9..]
        ),
        13 => format!(
            "{}-{}-{}-{}-{}",
            &cleaned[0..3],
            &cleaned[3..4],
            &cleaned[4..7],
            &cleaned[7..12],
            &cleaned[12..]
        ),
        _ => code.to_string(),
    }
}
