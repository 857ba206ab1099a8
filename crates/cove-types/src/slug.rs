/// Normalize a user-entered channel name into a URL-safe slug.
///
/// Lower-cases, maps whitespace runs to `-`, strips everything that is not
/// an ASCII word character or `-`, collapses repeated `-`, and trims `-`
/// from both ends. An input with nothing usable in it normalizes to the
/// empty string, which callers must reject.
pub fn slugify(name: &str) -> String {
    let mut out = String::with_capacity(name.len());

    for c in name.to_lowercase().chars() {
        if c.is_whitespace() {
            out.push('-');
        } else if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
            out.push(c);
        }
        // everything else is dropped
    }

    let mut collapsed = String::with_capacity(out.len());
    let mut prev_dash = false;
    for c in out.chars() {
        if c == '-' {
            if !prev_dash {
                collapsed.push('-');
            }
            prev_dash = true;
        } else {
            collapsed.push(c);
            prev_dash = false;
        }
    }

    collapsed.trim_matches('-').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_punctuation_and_trims() {
        assert_eq!(slugify("  Team Standup!! "), "team-standup");
    }

    #[test]
    fn collapses_repeated_separators() {
        assert_eq!(slugify("a  --  b"), "a-b");
        assert_eq!(slugify("hello   world"), "hello-world");
    }

    #[test]
    fn all_dashes_normalizes_to_empty() {
        assert_eq!(slugify("---"), "");
        assert_eq!(slugify("  !!  "), "");
    }

    #[test]
    fn keeps_word_characters() {
        assert_eq!(slugify("General_2"), "general_2");
    }

    #[test]
    fn drops_non_ascii_letters() {
        assert_eq!(slugify("déjà vu"), "dj-vu");
    }
}
