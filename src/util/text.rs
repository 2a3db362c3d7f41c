use std::borrow::Cow;

/// Stem used when a title sanitizes to nothing.
const FALLBACK_STEM: &str = "feed";

/// Longest stem in bytes. Leaves room under the usual 255-byte file name
/// limit for a collision suffix, `.html` and the writer's temp extension.
pub const MAX_STEM_BYTES: usize = 180;

/// Turns a feed title into a file stem.
///
/// Whitespace becomes `_`, as do path separators and control characters so
/// the stem always names a single file inside the output directory. A stem
/// made only of dots (`.`, `..`) is replaced with `feed`. Long stems are cut
/// to [`MAX_STEM_BYTES`] on a character boundary.
///
/// # Examples
///
/// ```
/// use courier::util::sanitize_file_stem;
///
/// assert_eq!(sanitize_file_stem("Hacker News"), "Hacker_News");
/// assert_eq!(sanitize_file_stem("a/b\\c"), "a_b_c");
/// assert_eq!(sanitize_file_stem(""), "feed");
/// ```
pub fn sanitize_file_stem(title: &str) -> Cow<'_, str> {
    let needs_replacement = |c: char| c.is_whitespace() || c.is_control() || c == '/' || c == '\\';

    let stem: Cow<'_, str> = if title.chars().any(needs_replacement) {
        Cow::Owned(
            title
                .chars()
                .map(|c| if needs_replacement(c) { '_' } else { c })
                .collect(),
        )
    } else {
        Cow::Borrowed(title)
    };

    let stem = truncate_to_boundary(stem, MAX_STEM_BYTES);

    if stem.is_empty() || stem.chars().all(|c| c == '.') {
        Cow::Borrowed(FALLBACK_STEM)
    } else {
        stem
    }
}

fn truncate_to_boundary(stem: Cow<'_, str>, max_bytes: usize) -> Cow<'_, str> {
    if stem.len() <= max_bytes {
        return stem;
    }
    let cut = (0..=max_bytes)
        .rev()
        .find(|&i| stem.is_char_boundary(i))
        .unwrap_or(0);
    match stem {
        Cow::Borrowed(s) => Cow::Borrowed(&s[..cut]),
        Cow::Owned(mut s) => {
            s.truncate(cut);
            Cow::Owned(s)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spaces_become_underscores() {
        assert_eq!(sanitize_file_stem("Rust Blog"), "Rust_Blog");
        assert_eq!(sanitize_file_stem("  two  spaces "), "__two__spaces_");
    }

    #[test]
    fn test_other_whitespace_replaced() {
        assert_eq!(sanitize_file_stem("tab\there\nnewline"), "tab_here_newline");
    }

    #[test]
    fn test_clean_title_is_borrowed() {
        assert!(matches!(sanitize_file_stem("Clean"), Cow::Borrowed("Clean")));
    }

    #[test]
    fn test_path_traversal_neutralized() {
        assert_eq!(sanitize_file_stem("../../etc/passwd"), ".._.._etc_passwd");
        assert_eq!(sanitize_file_stem(".."), "feed");
        assert_eq!(
            sanitize_file_stem("https://example.com/rss"),
            "https:__example.com_rss"
        );
    }

    #[test]
    fn test_long_title_truncated_on_char_boundary() {
        let title = "日本語のニュース".repeat(10);
        let stem = sanitize_file_stem(&title);
        assert!(stem.len() <= MAX_STEM_BYTES);
        // Each character is 3 bytes, so 60 whole characters fit
        assert_eq!(stem.chars().count(), 60);
        assert!(title.starts_with(stem.as_ref()));

        let ascii = "a ".repeat(200);
        assert_eq!(sanitize_file_stem(&ascii).len(), MAX_STEM_BYTES);
    }

    #[test]
    fn test_unicode_preserved() {
        assert_eq!(sanitize_file_stem("Café Noticias"), "Café_Noticias");
    }
}
