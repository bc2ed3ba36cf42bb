//! Built-in review rules.
//!
//! Deterministic regex heuristics over changed-code text. Pattern matching
//! runs uniformly across whatever languages appear in the diff; the LLM
//! pass compensates for what line patterns cannot see. The rule set is
//! closed: operators disable rules, they do not author new ones, so every
//! rule id that can appear in a report is known at compile time.

use regex::Regex;
use std::sync::LazyLock;
use strum::{EnumIter, IntoEnumIterator};

use crate::models::{Category, Severity, Violation};

/// The built-in rules. Declaration order is report order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter)]
pub enum RuleKind {
    SqlInjection,
    HardcodedSecret,
    CommandInjection,
    MissingErrorHandling,
    BareExcept,
}

/// Explanation block rendered in reports and the `rules` listing.
///
/// Explanation text is part of the rule contract: a finding must be
/// actionable without consulting external docs.
#[derive(Debug, Clone, Copy)]
pub struct RuleExplanation {
    pub title: &'static str,
    pub description: &'static str,
    pub why_matters: &'static str,
    pub learn_more: Option<&'static str>,
}

impl RuleKind {
    /// Stable identifier. These appear in reports and configs and never change.
    pub fn id(self) -> &'static str {
        match self {
            RuleKind::SqlInjection => "SEC001",
            RuleKind::HardcodedSecret => "SEC002",
            RuleKind::CommandInjection => "SEC003",
            RuleKind::MissingErrorHandling => "MNT004",
            RuleKind::BareExcept => "CLR005",
        }
    }

    /// Look a rule up by its stable id. Case-insensitive.
    pub fn from_id(id: &str) -> Option<RuleKind> {
        RuleKind::iter().find(|kind| kind.id().eq_ignore_ascii_case(id))
    }

    pub fn title(self) -> &'static str {
        match self {
            RuleKind::SqlInjection => "Possible SQL injection",
            RuleKind::HardcodedSecret => "Hardcoded credential",
            RuleKind::CommandInjection => "Possible command injection",
            RuleKind::MissingErrorHandling => "Missing error handling",
            RuleKind::BareExcept => "Bare exception handler",
        }
    }

    pub fn category(self) -> Category {
        match self {
            RuleKind::SqlInjection | RuleKind::HardcodedSecret | RuleKind::CommandInjection => {
                Category::Safety
            }
            RuleKind::MissingErrorHandling => Category::Maintainability,
            RuleKind::BareExcept => Category::Clarity,
        }
    }

    pub fn severity(self) -> Severity {
        match self {
            RuleKind::SqlInjection | RuleKind::HardcodedSecret | RuleKind::CommandInjection => {
                Severity::Critical
            }
            RuleKind::MissingErrorHandling | RuleKind::BareExcept => Severity::Warning,
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            RuleKind::SqlInjection => {
                "String interpolation builds a SQL statement from runtime values."
            }
            RuleKind::HardcodedSecret => {
                "A credential-like variable is assigned a string literal."
            }
            RuleKind::CommandInjection => {
                "A shell command is built from a non-literal argument."
            }
            RuleKind::MissingErrorHandling => {
                "A failure-prone operation runs outside any error handling."
            }
            RuleKind::BareExcept => {
                "A bare except clause catches and hides every error, including \
                 interrupts and typos."
            }
        }
    }

    pub fn why_matters(self) -> &'static str {
        match self {
            RuleKind::SqlInjection => {
                "Interpolated SQL lets attacker-controlled input rewrite the query. \
                 Use parameterized queries: pass values separately and let the \
                 driver escape them."
            }
            RuleKind::HardcodedSecret => {
                "Credentials committed to source control leak through clones, \
                 forks, and history. Load them from the environment or a secret \
                 manager instead."
            }
            RuleKind::CommandInjection => {
                "Building shell commands from variables lets crafted input run \
                 arbitrary commands. Pass arguments as a list so the shell never \
                 interprets them."
            }
            RuleKind::MissingErrorHandling => {
                "File, network, and parse operations fail in normal operation. \
                 Unhandled, they crash the program with an unhelpful traceback \
                 instead of a recoverable error."
            }
            RuleKind::BareExcept => {
                "Catching everything silently swallows real bugs and makes \
                 failures impossible to diagnose. Catch the specific exceptions \
                 the block can actually raise."
            }
        }
    }

    pub fn docs_url(self) -> Option<&'static str> {
        match self {
            RuleKind::SqlInjection => {
                Some("https://owasp.org/www-community/attacks/SQL_Injection")
            }
            RuleKind::HardcodedSecret => Some(
                "https://owasp.org/www-community/vulnerabilities/Use_of_hard-coded_password",
            ),
            RuleKind::CommandInjection => {
                Some("https://owasp.org/www-community/attacks/Command_Injection")
            }
            RuleKind::MissingErrorHandling => {
                Some("https://docs.python.org/3/tutorial/errors.html")
            }
            RuleKind::BareExcept => {
                Some("https://peps.python.org/pep-0008/#programming-recommendations")
            }
        }
    }

    pub fn explain(self) -> RuleExplanation {
        RuleExplanation {
            title: self.title(),
            description: self.description(),
            why_matters: self.why_matters(),
            learn_more: self.docs_url(),
        }
    }

    /// Regex patterns for this rule. A line matching any of them fires.
    fn pattern_strs(self) -> &'static [&'static str] {
        match self {
            RuleKind::SqlInjection => &[
                r#"(?i)f["'][^"']*\b(select|insert|update|delete|drop|alter|create)\b[^"']*\{"#,
                r#"(?i)["'][^"']*\b(select|insert|update|delete|drop|alter|create)\b[^"']*["']\s*\.\s*format\s*\("#,
                r#"(?i)["'][^"']*\b(select|insert|update|delete|drop|alter|create)\b[^"']*["']\s*%\s*[\w(]"#,
                r#"(?i)["'][^"']*\b(select|insert|update|delete|drop)\b[^"']*["']\s*\+\s*"#,
            ],
            RuleKind::HardcodedSecret => &[
                r#"(?i)\b(password|passwd|pwd|secret|token|api_key|apikey|access_key|auth_key|private_key|client_secret)\w*\s*[:=]\s*["'][^"']{4,}["']"#,
            ],
            RuleKind::CommandInjection => &[
                r#"\bos\.(system|popen)\s*\(\s*f["']"#,
                r#"\bos\.(system|popen)\s*\(\s*[A-Za-z_][\w.\[\]]*\s*[,)]"#,
                r#"\bos\.(system|popen)\s*\(\s*["'][^"']*["']\s*[%+]"#,
                r#"\bsubprocess\.\w+\s*\([^)]*\bshell\s*=\s*True"#,
                r#"\bsubprocess\.(run|call|Popen|check_output|check_call)\s*\(\s*f["']"#,
            ],
            RuleKind::MissingErrorHandling => &[
                r#"\bopen\s*\("#,
                r#"\bjson\.loads?\s*\("#,
                r#"\brequests\.(get|post|put|delete|patch|head)\s*\("#,
                r#"\burlopen\s*\("#,
            ],
            RuleKind::BareExcept => &[r#"^\s*except\s*:\s*(#.*)?$"#],
        }
    }

    /// Suppression patterns. A line matching any of them never fires,
    /// even if a detection pattern matches.
    fn allowlist_strs(self) -> &'static [&'static str] {
        match self {
            RuleKind::HardcodedSecret => &[
                // Environment and config lookups are the fix, not the problem
                r#"(?i)(os\.environ|getenv|process\.env|env\s*\[|\$\{|\{\{)"#,
                // Obvious placeholders
                r#"(?i)(placeholder|example|changeme|your[_-]|<[^>]+>|x{5,}|\*{3,})"#,
            ],
            // List-form subprocess never goes through a shell
            RuleKind::CommandInjection => &[r#"\bsubprocess\.\w+\s*\(\s*\["#],
            _ => &[],
        }
    }
}

struct CompiledPatterns {
    patterns: Vec<Regex>,
    allowlist: Vec<Regex>,
}

/// Compiled once per process, indexed by declaration order.
static COMPILED: LazyLock<Vec<CompiledPatterns>> = LazyLock::new(|| {
    RuleKind::iter()
        .map(|kind| CompiledPatterns {
            patterns: kind
                .pattern_strs()
                .iter()
                .map(|p| Regex::new(p).unwrap())
                .collect(),
            allowlist: kind
                .allowlist_strs()
                .iter()
                .map(|p| Regex::new(p).unwrap())
                .collect(),
        })
        .collect()
});

fn compiled(kind: RuleKind) -> &'static CompiledPatterns {
    &COMPILED[kind as usize]
}

static COMMENT_LINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(#|//)").unwrap());

static PY_TRY_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\s*try\s*:").unwrap());

static BRACE_TRY_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\btry\s*\{").unwrap());

/// An enabled selection of the built-in rules.
#[derive(Debug, Clone)]
pub struct RuleSet {
    kinds: Vec<RuleKind>,
}

impl RuleSet {
    /// All built-in rules, in declaration order.
    pub fn builtin() -> Self {
        RuleSet {
            kinds: RuleKind::iter().collect(),
        }
    }

    /// Drop rules whose id appears in `disabled` (case-insensitive).
    pub fn without(mut self, disabled: &[String]) -> Self {
        self.kinds
            .retain(|k| !disabled.iter().any(|id| id.eq_ignore_ascii_case(k.id())));
        self
    }

    /// Keep only rules in the given category.
    pub fn retain_category(mut self, category: Category) -> Self {
        self.kinds.retain(|k| k.category() == category);
        self
    }

    /// Keep only rules at or above the given severity.
    pub fn retain_min_severity(mut self, min: Severity) -> Self {
        self.kinds.retain(|k| k.severity() >= min);
        self
    }

    pub fn kinds(&self) -> &[RuleKind] {
        &self.kinds
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    /// Run every enabled rule over `code`, returning violations ordered by
    /// line, then by rule declaration order. Lines are 1-based, columns
    /// 1-based from the match start. Each rule fires at most once per line.
    pub fn check_all(&self, code: &str, path: &str) -> Vec<Violation> {
        let mut violations = Vec::new();
        let in_try = lines_in_try_context(code);

        for (idx, line) in code.lines().enumerate() {
            if COMMENT_LINE_RE.is_match(line) {
                continue;
            }
            let line_no = idx as u32 + 1;

            for &kind in &self.kinds {
                if kind == RuleKind::MissingErrorHandling
                    && in_try.get(idx).copied().unwrap_or(false)
                {
                    continue;
                }

                let compiled = compiled(kind);
                if compiled.allowlist.iter().any(|re| re.is_match(line)) {
                    continue;
                }
                if let Some(m) = compiled.patterns.iter().find_map(|re| re.find(line)) {
                    violations.push(Violation {
                        rule_id: kind.id().to_string(),
                        path: path.to_string(),
                        start_line: line_no,
                        end_line: line_no,
                        column: Some(m.start() as u32 + 1),
                        message: kind.description().to_string(),
                        snippet: line.trim().to_string(),
                    });
                }
            }
        }

        violations
    }
}

/// For each line, whether it sits inside a try block.
///
/// Tracks Python blocks by indentation (handler clauses at the try's own
/// indent stay inside) and brace-language blocks by nesting depth. This is
/// a per-line heuristic, not a parse; one-liner try statements and unusual
/// formatting can slip through.
fn lines_in_try_context(code: &str) -> Vec<bool> {
    let mut result = Vec::new();
    let mut indent_stack: Vec<usize> = Vec::new();
    let mut brace_stack: Vec<i32> = Vec::new();
    let mut brace_depth: i32 = 0;

    for line in code.lines() {
        let trimmed = line.trim_start();
        let indent = line.len() - trimmed.len();

        if !trimmed.is_empty() {
            while let Some(&top) = indent_stack.last() {
                let handler = trimmed.starts_with("except")
                    || trimmed.starts_with("finally")
                    || trimmed.starts_with("else");
                if indent < top || (indent == top && !handler) {
                    indent_stack.pop();
                } else {
                    break;
                }
            }
        }

        result.push(!indent_stack.is_empty() || !brace_stack.is_empty());

        if PY_TRY_RE.is_match(line) {
            indent_stack.push(indent);
        }
        if BRACE_TRY_RE.is_match(line) {
            brace_stack.push(brace_depth);
        }

        brace_depth += line.matches('{').count() as i32;
        brace_depth -= line.matches('}').count() as i32;
        while let Some(&top) = brace_stack.last() {
            if brace_depth <= top {
                brace_stack.pop();
            } else {
                break;
            }
        }
    }

    result
}
