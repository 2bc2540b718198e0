//! Glob matching with the store's `SCAN MATCH` semantics
//!
//! Supports `*`, `?`, bracket classes (`[abc]`, `[^abc]`, `[a-z]`) and
//! backslash escapes.

/// Whether `text` matches the glob `pattern`
pub fn glob_match(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();
    match_from(&pattern, &text)
}

fn match_from(pattern: &[char], text: &[char]) -> bool {
    let (mut p, mut t) = (0, 0);
    // Backtrack point for the most recent `*`: (pattern index after it, text index)
    let mut star: Option<(usize, usize)> = None;

    while t < text.len() {
        if p < pattern.len() {
            match pattern[p] {
                '*' => {
                    while p < pattern.len() && pattern[p] == '*' {
                        p += 1;
                    }
                    if p == pattern.len() {
                        return true;
                    }
                    star = Some((p, t));
                    continue;
                },
                '?' => {
                    p += 1;
                    t += 1;
                    continue;
                },
                '[' => {
                    if let Some((matched, next)) = match_class(pattern, p, text[t]) {
                        if matched {
                            p = next;
                            t += 1;
                            continue;
                        }
                    } else if text[t] == '[' {
                        // Unterminated class matches a literal bracket
                        p += 1;
                        t += 1;
                        continue;
                    }
                },
                '\\' if p + 1 < pattern.len() => {
                    if pattern[p + 1] == text[t] {
                        p += 2;
                        t += 1;
                        continue;
                    }
                },
                c => {
                    if c == text[t] {
                        p += 1;
                        t += 1;
                        continue;
                    }
                },
            }
        }

        match star {
            Some((star_p, star_t)) => {
                p = star_p;
                t = star_t + 1;
                star = Some((star_p, t));
            },
            None => return false,
        }
    }

    pattern[p..].iter().all(|&c| c == '*')
}

/// Match `c` against the bracket class starting at `pattern[start] == '['`
///
/// Returns whether it matched and the index just past the closing `]`, or
/// `None` if the class is unterminated.
fn match_class(pattern: &[char], start: usize, c: char) -> Option<(bool, usize)> {
    let mut i = start + 1;
    let negate = pattern.get(i) == Some(&'^');
    if negate {
        i += 1;
    }

    let mut matched = false;
    let mut first = true;
    loop {
        let current = *pattern.get(i)?;
        if current == ']' && !first {
            break;
        }
        first = false;

        if current == '\\' {
            let escaped = *pattern.get(i + 1)?;
            matched |= escaped == c;
            i += 2;
        } else if pattern.get(i + 1) == Some(&'-')
            && pattern.get(i + 2).is_some_and(|&e| e != ']')
        {
            let (lo, hi) = (current, pattern[i + 2]);
            let (lo, hi) = if lo <= hi { (lo, hi) } else { (hi, lo) };
            matched |= (lo..=hi).contains(&c);
            i += 3;
        } else {
            matched |= current == c;
            i += 1;
        }
    }

    Some((matched != negate, i + 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_and_star() {
        assert!(glob_match("stats:*", "stats:test:v1:entity:player:1"));
        assert!(glob_match("*", ""));
        assert!(glob_match("a*b*c", "aXXbYYc"));
        assert!(!glob_match("stats:*", "other:test"));
        assert!(!glob_match("abc", "abcd"));
    }

    #[test]
    fn question_mark_matches_one_char() {
        assert!(glob_match("h?llo", "hello"));
        assert!(!glob_match("h?llo", "hllo"));
    }

    #[test]
    fn bracket_classes() {
        assert!(glob_match("h[ae]llo", "hallo"));
        assert!(!glob_match("h[ae]llo", "hillo"));
        assert!(glob_match("h[^e]llo", "hallo"));
        assert!(!glob_match("h[^e]llo", "hello"));
        assert!(glob_match("h[a-c]llo", "hbllo"));
        assert!(!glob_match("h[a-c]llo", "hdllo"));
    }

    #[test]
    fn escapes_match_literally() {
        assert!(glob_match("odd\\*name:*", "odd*name:1"));
        assert!(!glob_match("odd\\*name:*", "oddXname:1"));
        assert!(glob_match("a\\?", "a?"));
        assert!(glob_match("\\[x\\]", "[x]"));
    }

    #[test]
    fn backtracks_across_stars() {
        assert!(glob_match("*:list:*:x", "ns:env:v1:list:players:abc:x"));
        assert!(!glob_match("*:list:*:x", "ns:env:v1:entity:players:abc:x"));
    }

    #[test]
    fn escaped_prefix_round_trips() {
        let prefix = "ns:env:v1:list:we[ird]*?:";
        let pattern = format!("{}*", domain::escape_glob(prefix));
        assert!(glob_match(&pattern, "ns:env:v1:list:we[ird]*?:abc"));
        assert!(!glob_match(&pattern, "ns:env:v1:list:wei:abc"));
    }
}
