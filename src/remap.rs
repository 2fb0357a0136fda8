//! Path rewriting for index-store relocation.
//!
//! Two independent mechanisms live here. [`PathRemapper`] applies ordered
//! `pattern=replacement` regex rules to every path field of a unit, with
//! `s/pattern/replacement/`-once semantics: the first rule whose pattern
//! matches wins, and only the matched span is substituted. [`PathPrefixMap`]
//! is a literal `prefix=value` substitution used only when hashing a unit's
//! own output-file name, so unit naming stays stable no matter how
//! adventurous the regex rules get.

use regex::Regex;

/// Ordered regex substitution rules parsed from `pattern=replacement` flags
#[derive(Debug)]
pub struct PathRemapper {
    rules: Vec<(Regex, String)>,
}

impl PathRemapper {
    /// A remapper with no rules; every input passes through unchanged
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    /// Parse `pattern=replacement` rule strings in declaration order.
    ///
    /// Every malformed rule is reported: the returned error list carries one
    /// message per bad pattern or bad replacement, so the caller can print
    /// them all before aborting.
    pub fn from_args(args: &[String]) -> Result<Self, Vec<String>> {
        let mut rules = Vec::with_capacity(args.len());
        let mut errors = Vec::new();

        for arg in args {
            let Some((pattern, replacement)) = arg.split_once('=') else {
                errors.push(format!("invalid remap '{}': expected PATTERN=REPLACEMENT", arg));
                continue;
            };
            let regex = match Regex::new(pattern) {
                Ok(regex) => regex,
                Err(err) => {
                    errors.push(format!("error parsing regular expression '{}': {}", pattern, err));
                    continue;
                }
            };
            if let Err(message) = validate_replacement(&regex, replacement) {
                errors.push(format!("invalid replacement '{}' for pattern '{}': {}", replacement, pattern, message));
                continue;
            }
            rules.push((regex, replacement.to_string()));
        }

        if errors.is_empty() { Ok(Self { rules }) } else { Err(errors) }
    }

    /// Apply the first matching rule to `input`.
    ///
    /// Only the matched span is replaced; the surrounding prefix and suffix
    /// are preserved byte-for-byte. With no matching rule the input comes
    /// back unchanged, minus a leading `./`.
    pub fn remap(&self, input: &str) -> String {
        let input = input.strip_prefix("./").unwrap_or(input);
        for (pattern, replacement) in &self.rules {
            if let Some(captures) = pattern.captures(input) {
                // captures always holds the overall match
                let matched = captures.get(0).unwrap();
                let mut output = String::with_capacity(input.len());
                output.push_str(&input[..matched.start()]);
                captures.expand(replacement, &mut output);
                output.push_str(&input[matched.end()..]);
                return output;
            }
        }
        input.to_string()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Check every `$n` / `${name}` reference in a replacement template against
/// the pattern's capture groups, using the same parse the expansion uses.
fn validate_replacement(regex: &Regex, replacement: &str) -> Result<(), String> {
    let bytes = replacement.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != b'$' {
            i += 1;
            continue;
        }
        i += 1;
        if i >= bytes.len() {
            // trailing '$' expands literally
            break;
        }
        if bytes[i] == b'$' {
            i += 1;
            continue;
        }
        let (name, next) = if bytes[i] == b'{' {
            let Some(end) = replacement[i + 1..].find('}') else {
                return Err("unterminated capture group reference".to_string());
            };
            (&replacement[i + 1..i + 1 + end], i + end + 2)
        } else {
            let rest = &replacement[i..];
            let len = rest
                .bytes()
                .take_while(|b| b.is_ascii_alphanumeric() || *b == b'_')
                .count();
            (&rest[..len], i + len)
        };
        i = next;
        if name.is_empty() {
            // a bare '$' before a non-name character expands literally
            continue;
        }
        if let Ok(index) = name.parse::<usize>() {
            if index >= regex.captures_len() {
                return Err(format!(
                    "group ${} does not exist (pattern has {} capture group{})",
                    index,
                    regex.captures_len() - 1,
                    if regex.captures_len() == 2 { "" } else { "s" }
                ));
            }
        } else if !regex.capture_names().flatten().any(|n| n == name) {
            return Err(format!("named group ${{{}}} does not exist", name));
        }
    }
    Ok(())
}

/// Literal prefix substitutions parsed from `prefix=value` flags.
///
/// Applied to absolute output-file paths before they are hashed into a
/// unit's file name; first matching prefix wins.
#[derive(Debug)]
pub struct PathPrefixMap {
    entries: Vec<(String, String)>,
}

impl PathPrefixMap {
    pub fn empty() -> Self {
        Self { entries: Vec::new() }
    }

    pub fn from_args(args: &[String]) -> Result<Self, Vec<String>> {
        let mut entries = Vec::with_capacity(args.len());
        let mut errors = Vec::new();
        for arg in args {
            match arg.split_once('=') {
                Some((prefix, value)) if !prefix.is_empty() => {
                    entries.push((prefix.to_string(), value.to_string()));
                }
                _ => errors.push(format!("invalid file prefix map '{}': expected PREFIX=VALUE", arg)),
            }
        }
        if errors.is_empty() { Ok(Self { entries }) } else { Err(errors) }
    }

    pub fn apply(&self, path: &str) -> String {
        for (prefix, value) in &self.entries {
            if let Some(rest) = path.strip_prefix(prefix.as_str()) {
                return format!("{}{}", value, rest);
            }
        }
        path.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn remapper(rules: &[&str]) -> PathRemapper {
        let args: Vec<String> = rules.iter().map(|s| s.to_string()).collect();
        PathRemapper::from_args(&args).unwrap()
    }

    #[test]
    fn test_no_match_returns_input_unchanged() {
        let remapper = remapper(&["/build=/out"]);
        assert_eq!(remapper.remap("/src/main.c"), "/src/main.c");
    }

    #[test]
    fn test_leading_dot_slash_is_stripped() {
        let remapper = PathRemapper::empty();
        assert_eq!(remapper.remap("./relative/path.o"), "relative/path.o");
        assert_eq!(remapper.remap("/abs/./inner"), "/abs/./inner");
    }

    #[test]
    fn test_only_matched_span_is_replaced() {
        let remapper = remapper(&["bazel-out=/tmp/out"]);
        assert_eq!(
            remapper.remap("/private/var/bazel-out/bin/lib.o"),
            "/private/var//tmp/out/bin/lib.o"
        );
    }

    #[test]
    fn test_first_matching_rule_wins() {
        let remapper = remapper(&["/build=/first", "/bui=/second"]);
        assert_eq!(remapper.remap("/build/a.o"), "/first/a.o");
    }

    #[test]
    fn test_substitution_happens_once() {
        let remapper = remapper(&["x=y"]);
        assert_eq!(remapper.remap("x/x"), "y/x");
    }

    #[test]
    fn test_capture_group_backreferences() {
        let remapper = remapper(&["^/exec/[^/]+/(.*)$=/srcroot/$1"]);
        assert_eq!(remapper.remap("/exec/abc123/pkg/file.c"), "/srcroot/pkg/file.c");
    }

    #[test]
    fn test_named_capture_groups() {
        let remapper = remapper(&["^/b/(?P<rest>.*)=/o/${rest}"]);
        assert_eq!(remapper.remap("/b/a.o"), "/o/a.o");
    }

    #[test]
    fn test_bad_pattern_is_collected() {
        let errors = PathRemapper::from_args(&["[=x".to_string()]).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("error parsing regular expression"));
    }

    #[test]
    fn test_replacement_referencing_missing_group_is_rejected() {
        let errors = PathRemapper::from_args(&["/build/(.*)=/out/$2".to_string()]).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("$2"));
    }

    #[test]
    fn test_all_errors_reported_together() {
        let errors = PathRemapper::from_args(&[
            "[=x".to_string(),
            "norule".to_string(),
            "/a=/b".to_string(),
            "(a)=${nope}".to_string(),
        ])
        .unwrap_err();
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn test_dollar_escape_is_literal() {
        let remapper = remapper(&["/build=/out$$ro"]);
        assert_eq!(remapper.remap("/build/a.o"), "/out$ro/a.o");
    }

    #[test]
    fn test_prefix_map_first_match_wins() {
        let map = PathPrefixMap::from_args(&[
            "/build/long=/LONG".to_string(),
            "/build=/out".to_string(),
        ])
        .unwrap();
        assert_eq!(map.apply("/build/long/a.o"), "/LONG/a.o");
        assert_eq!(map.apply("/build/a.o"), "/out/a.o");
        assert_eq!(map.apply("/src/a.c"), "/src/a.c");
    }

    #[test]
    fn test_prefix_map_rejects_missing_divider() {
        let errors = PathPrefixMap::from_args(&["noequals".to_string()]).unwrap_err();
        assert_eq!(errors.len(), 1);
    }
}
