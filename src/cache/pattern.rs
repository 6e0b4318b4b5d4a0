/// Compiled invalidation pattern.
///
/// `*` matches any run of characters. The common shape, a literal prefix
/// followed by one trailing `*`, compiles to a plain prefix test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyPattern {
    Exact(String),
    Prefix(String),
    Glob(Vec<String>),
}

impl KeyPattern {
    #[must_use]
    pub fn compile(pattern: &str) -> Self {
        match pattern.find('*') {
            None => Self::Exact(pattern.to_string()),
            Some(pos) if pos == pattern.len() - 1 => Self::Prefix(pattern[..pos].to_string()),
            Some(_) => Self::Glob(pattern.split('*').map(str::to_string).collect()),
        }
    }

    #[must_use]
    pub fn matches(&self, key: &str) -> bool {
        match self {
            Self::Exact(exact) => key == exact,
            Self::Prefix(prefix) => key.starts_with(prefix.as_str()),
            Self::Glob(parts) => glob_matches(parts, key),
        }
    }
}

// `parts` comes from splitting on `*`, so it always has at least two elements.
fn glob_matches(parts: &[String], key: &str) -> bool {
    let (first, rest) = match parts.split_first() {
        Some(split) => split,
        None => return key.is_empty(),
    };
    let Some(mut remaining) = key.strip_prefix(first.as_str()) else {
        return false;
    };
    let Some((last, middle)) = rest.split_last() else {
        return remaining.is_empty();
    };

    for part in middle {
        match remaining.find(part.as_str()) {
            Some(idx) => remaining = &remaining[idx + part.len()..],
            None => return false,
        }
    }

    remaining.ends_with(last.as_str())
}
