//! Glob-style key patterns
//!
//! Implements the wildcard syntax Redis uses for `KEYS`: `*` matches any run
//! of characters, `?` a single character, `[abc]`, `[^abc]` and `[a-z]`
//! character classes, and `\` escapes the next character.

/// Check whether `key` matches the glob `pattern`.
///
/// Every token other than `*` consumes exactly one character, so on a
/// mismatch only the most recent `*` needs to absorb one more character.
/// This keeps matching at O(pattern × key) however many stars there are.
pub fn glob_match(pattern: &str, key: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let key: Vec<char> = key.chars().collect();

    let (mut p, mut k) = (0, 0);
    // Pattern position after the last `*` and the key position it resumes from
    let mut last_star: Option<(usize, usize)> = None;

    while k < key.len() {
        if pattern.get(p) == Some(&'*') {
            p += 1;
            last_star = Some((p, k));
            continue;
        }

        if let Some(next) = step(&pattern, p, key[k]) {
            p = next;
            k += 1;
            continue;
        }

        match last_star {
            Some((star_p, star_k)) => {
                last_star = Some((star_p, star_k + 1));
                p = star_p;
                k = star_k + 1;
            }
            None => return false,
        }
    }

    pattern[p..].iter().all(|&c| c == '*')
}

/// Match the single-character token at `p` against `c`, returning the
/// position of the next token on success
fn step(pattern: &[char], p: usize, c: char) -> Option<usize> {
    let &token = pattern.get(p)?;
    match token {
        '?' => Some(p + 1),
        '[' => {
            let (matched, consumed) = match_class(&pattern[p + 1..], c);
            matched.then_some(p + 1 + consumed)
        }
        '\\' if p + 1 < pattern.len() => (pattern[p + 1] == c).then_some(p + 2),
        literal => (literal == c).then_some(p + 1),
    }
}

/// Match one character against a class body (the text after `[`).
///
/// Returns whether it matched and how many pattern characters the class used,
/// including the closing `]`. An unterminated class runs to the end.
fn match_class(class: &[char], c: char) -> (bool, usize) {
    let negate = class.first() == Some(&'^');
    let mut i = usize::from(negate);
    let mut matched = false;

    while i < class.len() {
        match class[i] {
            ']' => {
                i += 1;
                return (matched != negate, i);
            }
            '\\' if i + 1 < class.len() => {
                matched |= class[i + 1] == c;
                i += 2;
            }
            start if i + 2 < class.len() && class[i + 1] == '-' => {
                let end = class[i + 2];
                let (low, high) = if start <= end { (start, end) } else { (end, start) };
                matched |= (low..=high).contains(&c);
                i += 3;
            }
            literal => {
                matched |= literal == c;
                i += 1;
            }
        }
    }

    (matched != negate, i)
}
