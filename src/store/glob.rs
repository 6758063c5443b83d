//! Glob-style key patterns, as accepted by `SCAN ... MATCH`.
//!
//! Supports `*`, `?`, `[abc]`, `[a-z]`, `[^a]` and `\` escapes.

/// Escapes every glob metacharacter in `literal`.
pub fn escape(literal: &str) -> String {
    let mut out = String::with_capacity(literal.len());
    for c in literal.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Returns true if `text` matches `pattern` in full.
pub fn matches(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();
    let (mut pi, mut ti) = (0, 0);
    // Position of the last `*` seen and the text index it is currently
    // assumed to have consumed up to.
    let mut star: Option<(usize, usize)> = None;

    loop {
        if pi < p.len() && p[pi] == '*' {
            star = Some((pi, ti));
            pi += 1;
            continue;
        }
        if ti == t.len() {
            return pi == p.len();
        }
        if pi < p.len() {
            if let Some(next) = step(&p, pi, t[ti]) {
                pi = next;
                ti += 1;
                continue;
            }
        }
        match star {
            Some((sp, st)) => {
                pi = sp + 1;
                ti = st + 1;
                star = Some((sp, st + 1));
            }
            None => return false,
        }
    }
}

/// Matches one non-star token at `pi` against `c`, returning the index of
/// the following token on success.
fn step(p: &[char], pi: usize, c: char) -> Option<usize> {
    match p[pi] {
        '?' => Some(pi + 1),
        '\\' if pi + 1 < p.len() => (p[pi + 1] == c).then_some(pi + 2),
        '[' => match class(p, pi, c) {
            Some((true, next)) => Some(next),
            Some((false, _)) => None,
            // unterminated class: treat '[' literally
            None => (c == '[').then_some(pi + 1),
        },
        lit => (lit == c).then_some(pi + 1),
    }
}

/// Evaluates a `[...]` class starting at `pi`. Returns whether `c` is
/// accepted and the index after the closing bracket.
fn class(p: &[char], pi: usize, c: char) -> Option<(bool, usize)> {
    let mut i = pi + 1;
    let negate = i < p.len() && p[i] == '^';
    if negate {
        i += 1;
    }
    let mut hit = false;
    while i < p.len() && p[i] != ']' {
        let lo = if p[i] == '\\' && i + 1 < p.len() {
            i += 1;
            p[i]
        } else {
            p[i]
        };
        if i + 2 < p.len() && p[i + 1] == '-' && p[i + 2] != ']' {
            let hi = p[i + 2];
            let (lo, hi) = if lo <= hi { (lo, hi) } else { (hi, lo) };
            if lo <= c && c <= hi {
                hit = true;
            }
            i += 3;
        } else {
            if lo == c {
                hit = true;
            }
            i += 1;
        }
    }
    if i >= p.len() {
        return None;
    }
    Some((hit != negate, i + 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_and_star() {
        assert!(matches("foo", "foo"));
        assert!(!matches("foo", "foobar"));
        assert!(matches("foo*", "foobar"));
        assert!(matches("foo*", "foo"));
        assert!(matches("*bar", "foobar"));
        assert!(matches("f*o*r", "foobar"));
        assert!(!matches("f*z", "foobar"));
        assert!(matches("*", ""));
    }

    #[test]
    fn test_question_mark_and_classes() {
        assert!(matches("h?llo", "hello"));
        assert!(!matches("h?llo", "hllo"));
        assert!(matches("h[ae]llo", "hallo"));
        assert!(!matches("h[ae]llo", "hillo"));
        assert!(matches("h[^e]llo", "hallo"));
        assert!(!matches("h[^e]llo", "hello"));
        assert!(matches("key[0-9]", "key7"));
        assert!(!matches("key[0-9]", "keyx"));
    }

    #[test]
    fn test_escaped_prefix_is_literal() {
        let prefix = escape("we*ird?[ns]");
        assert_eq!(prefix, "we\\*ird\\?\\[ns\\]");
        let pattern = format!("{prefix}:~:*");
        assert!(matches(&pattern, "we*ird?[ns]:~:key"));
        assert!(!matches(&pattern, "weXXird?[ns]:~:key"));
        assert!(!matches(&pattern, "we*irdQn:~:key"));
    }

    #[test]
    fn test_terminator_keeps_prefixes_apart() {
        assert!(matches("a:~:*", "a:~:foo"));
        assert!(!matches("a:~:*", "a-other:~:foo"));
        assert!(!matches("a-other:~:*", "a:~:foo"));
    }

    #[test]
    fn test_unterminated_class_is_literal() {
        assert!(matches("a[b", "a[b"));
        assert!(!matches("a[b", "ab"));
    }
}
