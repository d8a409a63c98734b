//! Shared helpers: natural ordering of pin designators, page names from
//! sheet paths, and the table of pin names that carry no meaning.

use std::cmp::Ordering;

/// Pin names that are just numbers or anode/cathode markers.
pub const TRIVIAL_PIN_NAMES: [&str; 6] = ["1", "2", "3", "4", "A", "K"];

/// True when `name` is empty or one of [`TRIVIAL_PIN_NAMES`].
pub fn is_trivial_pin_name(name: &str) -> bool {
    name.is_empty() || TRIVIAL_PIN_NAMES.contains(&name)
}

/// Decide whether a raw pin label from an EDA export deserves to be kept as a
/// semantic pin name. Pure digit strings and the anode/cathode letters do not.
pub fn is_semantic_pin_name(name: &str) -> bool {
    if name.is_empty() {
        return false;
    }
    if name.chars().all(|c| c.is_ascii_digit()) {
        return false;
    }
    !matches!(name, "A" | "K")
}

/// Parent designator of a multi-part unit: `U1A` belongs to `U1`.
///
/// Only the `<letters><digits><letters>` shape qualifies; anything else has
/// no parent.
pub fn multipart_parent(refdes: &str) -> Option<String> {
    let letters = refdes.find(|c: char| !c.is_ascii_alphabetic())?;
    if letters == 0 {
        return None;
    }
    let rest = &refdes[letters..];
    let digits = rest.find(|c: char| !c.is_ascii_digit())?;
    if digits == 0 {
        return None;
    }
    let unit = &rest[digits..];
    if unit.chars().all(|c| c.is_ascii_alphabetic()) {
        Some(refdes[..letters + digits].to_string())
    } else {
        None
    }
}

/// One run of a designator: either text or digits.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Chunk<'a> {
    Text(&'a str),
    Digits(&'a str),
}

/// Split into alternating text/digit runs, always starting with a (possibly
/// empty) text run so chunk positions line up between any two keys.
fn chunks(s: &str) -> Vec<Chunk<'_>> {
    let mut out = Vec::new();
    let mut start = 0;
    let mut in_digits = false;

    for (i, c) in s.char_indices() {
        let digit = c.is_ascii_digit();
        if digit != in_digits {
            out.push(if in_digits {
                Chunk::Digits(&s[start..i])
            } else {
                Chunk::Text(&s[start..i])
            });
            start = i;
            in_digits = digit;
        }
    }
    out.push(if in_digits {
        Chunk::Digits(&s[start..])
    } else {
        Chunk::Text(&s[start..])
    });
    if in_digits {
        out.push(Chunk::Text(""));
    }
    out
}

/// Compare digit runs by numeric value without overflowing on long runs.
fn cmp_digits(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

/// Natural ordering: digit runs compare numerically, so `"2" < "10" < "A1"`.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let ca = chunks(a);
    let cb = chunks(b);

    for (x, y) in ca.iter().zip(cb.iter()) {
        let ord = match (x, y) {
            (Chunk::Text(x), Chunk::Text(y)) => x.cmp(y),
            (Chunk::Digits(x), Chunk::Digits(y)) => cmp_digits(x, y),
            // Positions always alternate identically, so this never mixes.
            (Chunk::Text(_), Chunk::Digits(_)) => Ordering::Less,
            (Chunk::Digits(_), Chunk::Text(_)) => Ordering::Greater,
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    ca.len().cmp(&cb.len())
}

/// Strip directory components from a sheet path, accepting both `/` and `\`.
pub fn page_from_path(path: &str) -> String {
    path.rsplit(|c: char| c == '/' || c == '\\').next().unwrap_or("").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_natural_sort_mixed_designators() {
        let mut pins = vec!["100", "1", "2", "10", "A1", "20", "3"];
        pins.sort_by(|a, b| natural_cmp(a, b));
        assert_eq!(pins, vec!["1", "2", "3", "10", "20", "100", "A1"]);
    }

    #[test]
    fn test_natural_sort_bga_balls() {
        let mut pins = vec!["B10", "A2", "B2", "A10", "A1"];
        pins.sort_by(|a, b| natural_cmp(a, b));
        assert_eq!(pins, vec!["A1", "A2", "A10", "B2", "B10"]);
    }

    #[test]
    fn test_natural_cmp_leading_zeros_and_long_runs() {
        assert_eq!(natural_cmp("007", "7"), Ordering::Equal);
        assert_eq!(
            natural_cmp("99999999999999999999999", "100000000000000000000000"),
            Ordering::Less
        );
    }

    #[test]
    fn test_page_from_path() {
        assert_eq!(page_from_path("C:\\Users\\proj\\Main.SchDoc"), "Main.SchDoc");
        assert_eq!(page_from_path("/home/user/proj/Power.SchDoc"), "Power.SchDoc");
        assert_eq!(page_from_path("Main.SchDoc"), "Main.SchDoc");
        assert_eq!(page_from_path(""), "");
    }

    #[test]
    fn test_multipart_parent() {
        assert_eq!(multipart_parent("U1A"), Some("U1".to_string()));
        assert_eq!(multipart_parent("U12B"), Some("U12".to_string()));
        assert_eq!(multipart_parent("U1"), None);
        assert_eq!(multipart_parent("LED3"), None);
        assert_eq!(multipart_parent("1A"), None);
        assert_eq!(multipart_parent("U1_A"), None);
    }

    #[test]
    fn test_semantic_pin_names() {
        assert!(!is_semantic_pin_name(""));
        assert!(!is_semantic_pin_name("22"));
        assert!(!is_semantic_pin_name("A"));
        assert!(!is_semantic_pin_name("K"));
        assert!(is_semantic_pin_name("S"));
        assert!(is_semantic_pin_name("VCC"));
        assert!(is_semantic_pin_name("A1"));
    }
}
