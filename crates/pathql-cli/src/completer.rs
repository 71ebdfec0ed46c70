//! Tab completion and multi-line input for the REPL.

use rustyline::completion::{Completer, Pair};
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::validate::{ValidationContext, ValidationResult, Validator};
use rustyline::{Context, Helper};
use std::borrow::Cow;

/// pathql REPL helper with completion support.
pub struct PathqlHelper {
    /// Type names from the loaded store.
    pub types: Vec<String>,
}

impl PathqlHelper {
    /// Create a helper completing the given type names.
    pub fn new(types: Vec<String>) -> Self {
        Self { types }
    }
}

/// Dot-commands for completion.
const DOT_COMMANDS: &[&str] = &[
    ".types", ".format", ".history", ".clear", ".help", ".exit", ".quit",
];

/// Node and step `kind` tags.
const KINDS: &[&str] = &[
    "str",
    "int",
    "float",
    "bool",
    "set",
    "tuple",
    "array",
    "named_tuple",
    "binop",
    "unop",
    "call",
    "cast",
    "if_else",
    "indirection",
    "path",
    "shape",
    "select",
    "for",
    "detached",
    "object_ref",
    "ptr",
    "type_intersection",
];

impl PathqlHelper {
    /// Candidates for the string literal being typed after `key`.
    fn value_candidates(&self, key: &str) -> Vec<&str> {
        match key {
            "kind" => KINDS.to_vec(),
            "name" | "type" => self.types.iter().map(String::as_str).collect(),
            _ => Vec::new(),
        }
    }
}

impl Completer for PathqlHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let line_to_cursor = &line[..pos];

        // Dot commands at start of line
        if line_to_cursor.trim_start().starts_with('.') && !line_to_cursor.contains(' ') {
            let typed = line_to_cursor.trim();
            let completions = DOT_COMMANDS
                .iter()
                .filter(|cmd| cmd.starts_with(typed))
                .map(|cmd| Pair {
                    display: cmd.to_string(),
                    replacement: cmd.to_string(),
                })
                .collect();
            return Ok((line_to_cursor.len() - typed.len(), completions));
        }

        // Inside a string value: `"key": "partial`
        let Some(open) = line_to_cursor.rfind('"') else {
            return Ok((pos, Vec::new()));
        };
        let word = &line_to_cursor[open + 1..];
        let before = line_to_cursor[..open].trim_end();
        let Some(before) = before.strip_suffix(':') else {
            return Ok((pos, Vec::new()));
        };
        let key = before
            .trim_end()
            .strip_suffix('"')
            .and_then(|s| s.rsplit('"').next())
            .unwrap_or("");

        let completions = self
            .value_candidates(key)
            .into_iter()
            .filter(|candidate| candidate.starts_with(word))
            .map(|candidate| Pair {
                display: candidate.to_string(),
                replacement: format!("{}\"", candidate),
            })
            .collect();
        Ok((open + 1, completions))
    }
}

impl Hinter for PathqlHelper {
    type Hint = String;

    fn hint(&self, _line: &str, _pos: usize, _ctx: &Context<'_>) -> Option<String> {
        None
    }
}

impl Highlighter for PathqlHelper {
    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        Cow::Borrowed(line)
    }
}

impl Validator for PathqlHelper {
    /// Queries continue over several lines until a terminating `;`.
    fn validate(&self, ctx: &mut ValidationContext<'_>) -> rustyline::Result<ValidationResult> {
        Ok(if is_complete(ctx.input()) {
            ValidationResult::Valid(None)
        } else {
            ValidationResult::Incomplete
        })
    }
}

impl Helper for PathqlHelper {}

/// Whether REPL input is ready to run.
pub fn is_complete(input: &str) -> bool {
    let input = input.trim();
    input.is_empty() || input.starts_with('.') || input.ends_with(';')
}

#[cfg(test)]
mod tests {
    use super::*;
    use rustyline::history::DefaultHistory;

    fn complete(helper: &PathqlHelper, line: &str) -> (usize, Vec<String>) {
        let history = DefaultHistory::new();
        let ctx = Context::new(&history);
        let (start, pairs) = helper.complete(line, line.len(), &ctx).unwrap();
        (start, pairs.into_iter().map(|p| p.display).collect())
    }

    #[test]
    fn test_is_complete() {
        assert!(is_complete(".help"));
        assert!(is_complete(r#"{"kind": "int", "value": 1};"#));
        assert!(is_complete("   "));
        assert!(!is_complete(r#"{"kind": "int","#));
    }

    #[test]
    fn test_complete_dot_commands() {
        let helper = PathqlHelper::new(Vec::new());
        assert_eq!(complete(&helper, ".fo"), (0, vec![".format".to_string()]));
    }

    #[test]
    fn test_complete_kind_and_type() {
        let helper = PathqlHelper::new(vec!["Person".to_string(), "Card".to_string()]);

        let (start, found) = complete(&helper, r#"{"kind": "se"#);
        assert_eq!(start, 10);
        assert_eq!(found, vec!["set".to_string(), "select".to_string()]);

        let (_, found) = complete(&helper, r#"{"kind": "object_ref", "name": "Pe"#);
        assert_eq!(found, vec!["Person".to_string()]);

        let (_, found) = complete(&helper, r#"{"op": "#);
        assert!(found.is_empty());
    }
}
