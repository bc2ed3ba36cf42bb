//! Suggested-fix generation.
//!
//! Turns rule violations into replacement code and renders the change as
//! a unified diff for the report. Everything here is advisory: diffs are
//! written into reports and patch files for a human to apply, never
//! applied to the PR.

use regex::Regex;
use similar::TextDiff;
use std::sync::LazyLock;

use crate::models::{Finding, Violation};

/// Render a unified diff between the original and suggested text.
///
/// Headers follow git convention (`a/<path>`, `b/<path>`) so the output
/// can be fed to `git apply` or read by anyone used to PR diffs.
pub fn fix_diff(original: &str, suggested: &str, path: &str) -> String {
    let mut old = original.to_string();
    if !old.ends_with('\n') {
        old.push('\n');
    }
    let mut new = suggested.to_string();
    if !new.ends_with('\n') {
        new.push('\n');
    }

    TextDiff::from_lines(&old, &new)
        .unified_diff()
        .context_radius(3)
        .header(&format!("a/{path}"), &format!("b/{path}"))
        .to_string()
}

/// Structural sanity check for a unified diff.
pub fn validate_diff(text: &str) -> bool {
    text.contains("--- ") && text.contains("+++ ") && text.contains("@@")
}

/// Concatenate all suggested-fix diffs into one multi-file patch document,
/// a blank line between diffs.
///
/// Empty when no finding carries a fix.
pub fn patch_document(findings: &[Finding]) -> String {
    let mut out = String::new();
    for finding in findings {
        if let Some(diff) = &finding.suggested_fix {
            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str(diff);
            if !diff.ends_with('\n') {
                out.push('\n');
            }
        }
    }
    out
}

static FSTRING_DQ_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"f"[^"]*""#).unwrap());
static FSTRING_SQ_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"f'[^']*'").unwrap());
static EXPR_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\{([^{}]+)\}").unwrap());
static ASSIGN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\w+)\s*[:=]").unwrap());
static OS_CALL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"os\.(?:system|popen)\s*\((.*?)\)").unwrap());
static SHELL_TRUE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*,\s*shell\s*=\s*True").unwrap());

/// Produce replacement code for a rule violation, when a template exists.
///
/// Not every rule has a mechanical rewrite; `None` means the report shows
/// the explanation without a diff block.
pub fn fix_for_violation(violation: &Violation) -> Option<String> {
    let snippet = violation.snippet.as_str();
    match violation.rule_id.as_str() {
        "SEC001" => parameterize_fstring(snippet),
        "SEC002" => env_lookup(snippet),
        "SEC003" => safe_subprocess(snippet),
        "MNT004" => wrap_in_try(snippet),
        _ => None,
    }
}

/// `f"... {expr} ..."` becomes a parameterized `"... %s ..."` with the
/// extracted expressions listed for the execute call.
fn parameterize_fstring(snippet: &str) -> Option<String> {
    let m = FSTRING_DQ_RE
        .find(snippet)
        .or_else(|| FSTRING_SQ_RE.find(snippet))?;
    let fstring = m.as_str();
    // Strip the f prefix and surrounding quotes
    let inner = &fstring[2..fstring.len() - 1];

    let exprs: Vec<&str> = EXPR_RE
        .captures_iter(inner)
        .filter_map(|c| c.get(1).map(|g| g.as_str().trim()))
        .collect();
    if exprs.is_empty() {
        return None;
    }

    let parameterized = EXPR_RE.replace_all(inner, "%s");
    let params = if exprs.len() == 1 {
        format!("({},)", exprs[0])
    } else {
        format!("({})", exprs.join(", "))
    };

    Some(format!(
        "{}  # parameters: {}",
        snippet.replacen(fstring, &format!("\"{parameterized}\""), 1),
        params
    ))
}

/// Literal credential assignment becomes an environment lookup.
fn env_lookup(snippet: &str) -> Option<String> {
    let name = ASSIGN_RE.captures(snippet)?.get(1)?.as_str();
    Some(format!("{name} = os.environ[\"{}\"]", name.to_uppercase()))
}

/// Shell-string invocations become argument lists.
fn safe_subprocess(snippet: &str) -> Option<String> {
    if let Some(caps) = OS_CALL_RE.captures(snippet) {
        let call = caps.get(0)?.as_str();
        let arg = caps.get(1)?.as_str().trim();
        let replacement = format!("subprocess.run(shlex.split({arg}), check=True)");
        return Some(snippet.replacen(call, &replacement, 1));
    }
    if SHELL_TRUE_RE.is_match(snippet) {
        return Some(SHELL_TRUE_RE.replace(snippet, "").into_owned());
    }
    None
}

/// Risky call gets a try block with the narrowest sensible exception type.
fn wrap_in_try(snippet: &str) -> Option<String> {
    let exception = if snippet.contains("open(") {
        "OSError"
    } else if snippet.contains("json.") {
        "ValueError"
    } else {
        "Exception"
    };
    Some(format!(
        "try:\n    {snippet}\nexcept {exception} as err:\n    ...  # handle or re-raise"
    ))
}
