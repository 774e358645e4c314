//! Code-review capabilities over Python-like source held in the `code` state key.
//!
//! The four steps read what earlier steps wrote (`functions`, `complexity`, `issues`) and
//! end with a `quality_score` in `0..=100`. [code_review_definition] wires them into a
//! graph that re-reviews while the score stays below `threshold` (80 unless the initial
//! state sets one). `detect_smells` is a standalone text heuristic outside that graph.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::{BoxError, Result};
use crate::registry::CapabilityRegistry;
use crate::types::{GraphDefinition, LoopEdgeDefinition, NodeDefinition, StateMap};

pub const EXTRACT_FUNCTIONS: &str = "extract_functions";
pub const CHECK_COMPLEXITY: &str = "check_complexity";
pub const DETECT_ISSUES: &str = "detect_issues";
pub const SUGGEST_IMPROVEMENTS: &str = "suggest_improvements";
pub const DETECT_SMELLS: &str = "detect_smells";

/// Loop-back guard of the review graph.
pub const REVIEW_LOOP_CONDITION: &str = "quality_score < threshold";

/// `threshold` written by `suggest_improvements` when the state has none.
pub const DEFAULT_THRESHOLD: i64 = 80;

const LONG_FUNCTION_LINES: usize = 50;
const MAX_ARGUMENTS: usize = 5;
const SMELL_MAX_LINES: usize = 50;
const SMELL_MAX_BRANCHES: usize = 5;

type CapabilityFn = fn(&StateMap) -> std::result::Result<Value, BoxError>;

const CAPABILITIES: [(&str, CapabilityFn, &str); 4] = [
  (
    EXTRACT_FUNCTIONS,
    extract_functions,
    "Extract function definitions from code",
  ),
  (CHECK_COMPLEXITY, check_complexity, "Check code complexity metrics"),
  (DETECT_ISSUES, detect_issues, "Detect code quality issues"),
  (
    SUGGEST_IMPROVEMENTS,
    suggest_improvements,
    "Suggest code improvements",
  ),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionInfo {
  pub name: String,
  pub line_number: usize,
  pub args_count: usize,
  pub has_docstring: bool,
  /// Non-blank, non-comment lines; a docstring counts once.
  pub body_lines: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplexityLevel {
  Low,
  Medium,
  High,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Complexity {
  pub cyclomatic_complexity: usize,
  pub average_complexity: f64,
  pub complexity_level: ComplexityLevel,
  pub total_lines: usize,
  pub control_flow_statements: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
  Low,
  Medium,
  High,
}

impl Severity {
  fn penalty(self) -> i64 {
    match self {
      Severity::High => 10,
      Severity::Medium => 5,
      Severity::Low => 2,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
  MissingDocstring,
  HighComplexity,
  LongFunction,
  TooManyArguments,
  EmptyFunction,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
  #[serde(rename = "type")]
  pub kind: IssueKind,
  pub severity: Severity,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub function: Option<String>,
  pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suggestion {
  #[serde(rename = "type")]
  pub kind: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub function: Option<String>,
  pub suggestion: String,
}

/// Registers the four review capabilities under their canonical names, plus the standalone
/// `detect_smells`, which the review graph does not use.
pub fn register_code_review(registry: &CapabilityRegistry) -> Result<()> {
  for (name, capability, description) in CAPABILITIES {
    registry.register(name, capability, Some(description))?;
  }
  registry.register(
    DETECT_SMELLS,
    detect_smells,
    Some("Detects code smells in source code"),
  )?;
  Ok(())
}

/// `extract_functions -> check_complexity -> detect_issues -> suggest_improvements`,
/// looping back to `check_complexity` while `quality_score < threshold`.
pub fn code_review_definition() -> GraphDefinition {
  let nodes = CAPABILITIES
    .iter()
    .map(|(name, _, _)| {
      let def = NodeDefinition {
        function: Some(name.to_string()),
        ..NodeDefinition::default()
      };
      (name.to_string(), def)
    })
    .collect();

  let edges = [
    (EXTRACT_FUNCTIONS, CHECK_COMPLEXITY),
    (CHECK_COMPLEXITY, DETECT_ISSUES),
    (DETECT_ISSUES, SUGGEST_IMPROVEMENTS),
  ]
  .into_iter()
  .map(|(from, to)| (from.to_string(), to.to_string()))
  .collect();

  let mut loop_edges = BTreeMap::new();
  loop_edges.insert(
    SUGGEST_IMPROVEMENTS.to_string(),
    LoopEdgeDefinition {
      target: CHECK_COMPLEXITY.to_string(),
      when: REVIEW_LOOP_CONDITION.to_string(),
    },
  );

  GraphDefinition {
    name: "code_review".to_string(),
    nodes,
    edges,
    conditions: BTreeMap::new(),
    loop_edges,
    entry_node: EXTRACT_FUNCTIONS.to_string(),
  }
}

fn def_pattern() -> &'static Regex {
  static P: OnceLock<Regex> = OnceLock::new();
  P.get_or_init(|| {
    Regex::new(r"^([ \t]*)(?:async[ \t]+)?def[ \t]+(\w+)[ \t]*\(([^)]*)\)[^:]*:[ \t]*(.*)$")
      .expect("function pattern is valid")
  })
}

fn control_flow_pattern() -> &'static Regex {
  static P: OnceLock<Regex> = OnceLock::new();
  P.get_or_init(|| Regex::new(r"\b(?:if|elif|for|while)\b").expect("keyword pattern is valid"))
}

/// Missing or `null` keys read as the default; anything else must have the right shape.
fn read<T: DeserializeOwned + Default>(
  state: &StateMap,
  key: &str,
) -> std::result::Result<T, BoxError> {
  match state.get(key) {
    None | Some(Value::Null) => Ok(T::default()),
    Some(v) => T::deserialize(v).map_err(|e| format!("state key '{}' is malformed: {}", key, e).into()),
  }
}

fn indent_of(line: &str) -> usize {
  line.len() - line.trim_start().len()
}

fn is_docstring_start(line: &str) -> bool {
  line.starts_with('"') || line.starts_with('\'')
}

/// Counts the body of a def at `indent` starting after line `start`, plus whether it
/// opens with a docstring.
fn scan_body(lines: &[&str], start: usize, indent: usize, inline: &str) -> (usize, bool) {
  let inline = inline.trim();
  if !inline.is_empty() && !inline.starts_with('#') {
    return (1, is_docstring_start(inline));
  }

  let mut count = 0;
  let mut has_docstring = false;
  let mut in_docstring: Option<&str> = None;
  for line in &lines[start + 1..] {
    let trimmed = line.trim();
    if trimmed.is_empty() {
      continue;
    }
    if let Some(quote) = in_docstring {
      if trimmed.contains(quote) {
        in_docstring = None;
      }
      continue;
    }
    if indent_of(line) <= indent {
      break;
    }
    if trimmed.starts_with('#') {
      continue;
    }
    if count == 0 && is_docstring_start(trimmed) {
      has_docstring = true;
      for quote in ["\"\"\"", "'''"] {
        if trimmed.starts_with(quote) && !trimmed[quote.len()..].contains(quote) {
          in_docstring = Some(quote);
        }
      }
    }
    count += 1;
  }
  (count, has_docstring)
}

pub fn find_functions(code: &str) -> Vec<FunctionInfo> {
  let lines: Vec<&str> = code.lines().collect();
  lines
    .iter()
    .enumerate()
    .filter_map(|(i, line)| {
      let caps = def_pattern().captures(line)?;
      let args_count = caps[3]
        .split(',')
        .map(str::trim)
        .filter(|a| !a.is_empty() && !a.starts_with('*') && *a != "/")
        .count();
      let (body_lines, has_docstring) = scan_body(&lines, i, caps[1].len(), &caps[4]);
      Some(FunctionInfo {
        name: caps[2].to_string(),
        line_number: i + 1,
        args_count,
        has_docstring,
        body_lines,
      })
    })
    .collect()
}

pub fn measure_complexity(code: &str, function_count: usize) -> Complexity {
  let control_flow_statements = control_flow_pattern().find_iter(code).count();
  let cyclomatic_complexity = 1 + control_flow_statements;
  let average_complexity = cyclomatic_complexity as f64 / function_count.max(1) as f64;
  let complexity_level = if average_complexity < 5.0 {
    ComplexityLevel::Low
  } else if average_complexity < 10.0 {
    ComplexityLevel::Medium
  } else {
    ComplexityLevel::High
  };
  Complexity {
    cyclomatic_complexity,
    average_complexity,
    complexity_level,
    total_lines: code.split('\n').count(),
    control_flow_statements,
  }
}

pub fn find_issues(functions: &[FunctionInfo], complexity: Option<&Complexity>) -> Vec<Issue> {
  let mut issues = Vec::new();
  let per_function = |kind: IssueKind, severity: Severity, f: &FunctionInfo, message: String| Issue {
    kind,
    severity,
    function: Some(f.name.clone()),
    message,
  };

  for f in functions.iter().filter(|f| !f.has_docstring) {
    issues.push(per_function(
      IssueKind::MissingDocstring,
      Severity::Low,
      f,
      format!("Function '{}' is missing a docstring", f.name),
    ));
  }
  if let Some(c) = complexity.filter(|c| c.complexity_level == ComplexityLevel::High) {
    issues.push(Issue {
      kind: IssueKind::HighComplexity,
      severity: Severity::Medium,
      function: None,
      message: format!(
        "High cyclomatic complexity detected: {}",
        c.cyclomatic_complexity
      ),
    });
  }
  for f in functions.iter().filter(|f| f.body_lines > LONG_FUNCTION_LINES) {
    issues.push(per_function(
      IssueKind::LongFunction,
      Severity::Medium,
      f,
      format!("Function '{}' is too long ({} lines)", f.name, f.body_lines),
    ));
  }
  for f in functions.iter().filter(|f| f.args_count > MAX_ARGUMENTS) {
    issues.push(per_function(
      IssueKind::TooManyArguments,
      Severity::Low,
      f,
      format!(
        "Function '{}' has too many arguments ({})",
        f.name, f.args_count
      ),
    ));
  }
  for f in functions.iter().filter(|f| f.body_lines == 0) {
    issues.push(per_function(
      IssueKind::EmptyFunction,
      Severity::Low,
      f,
      format!("Function '{}' appears to be empty", f.name),
    ));
  }
  issues
}

fn suggestion_for(issue: &Issue) -> Suggestion {
  let name = issue.function.as_deref().unwrap_or_default();
  let (kind, suggestion) = match issue.kind {
    IssueKind::MissingDocstring => (
      "add_docstring",
      format!(
        "Add a docstring to function '{}' describing its purpose, parameters, and return value",
        name
      ),
    ),
    IssueKind::HighComplexity => (
      "refactor_complexity",
      "Break down complex functions into smaller, more manageable functions".to_string(),
    ),
    IssueKind::LongFunction => (
      "split_function",
      format!("Split function '{}' into smaller functions", name),
    ),
    IssueKind::TooManyArguments => (
      "use_data_class",
      format!(
        "Consider using a data class or dictionary for function '{}' arguments",
        name
      ),
    ),
    IssueKind::EmptyFunction => (
      "implement_or_remove",
      format!(
        "Either implement function '{}' or remove it if not needed",
        name
      ),
    ),
  };
  Suggestion {
    kind: kind.to_string(),
    function: issue.function.clone(),
    suggestion,
  }
}

/// Starts at 100, subtracts per issue severity, adds 5 when every function is documented
/// and 5 for low complexity, clamped to `0..=100`.
pub fn quality_score(
  issues: &[Issue],
  functions: &[FunctionInfo],
  complexity: Option<&Complexity>,
) -> i64 {
  let mut score = 100 - issues.iter().map(|i| i.severity.penalty()).sum::<i64>();
  if functions.iter().all(|f| f.has_docstring) {
    score += 5;
  }
  if complexity.is_some_and(|c| c.complexity_level == ComplexityLevel::Low) {
    score += 5;
  }
  score.clamp(0, 100)
}

#[derive(Serialize)]
struct Extracted {
  functions: Vec<FunctionInfo>,
  function_count: usize,
}

#[derive(Serialize)]
struct Measured {
  complexity: Complexity,
}

#[derive(Serialize)]
struct Detected {
  issues: Vec<Issue>,
  issue_count: usize,
}

#[derive(Serialize)]
struct Suggested {
  suggestions: Vec<Suggestion>,
  quality_score: i64,
  suggestion_count: usize,
  #[serde(skip_serializing_if = "Option::is_none")]
  threshold: Option<i64>,
}

#[derive(Serialize)]
struct Smells {
  smells: Vec<String>,
  smell_count: usize,
}

pub fn extract_functions(state: &StateMap) -> std::result::Result<Value, BoxError> {
  let code: String = read(state, "code")?;
  let functions = find_functions(&code);
  debug!(count = functions.len(), "functions extracted");
  Ok(serde_json::to_value(Extracted {
    function_count: functions.len(),
    functions,
  })?)
}

pub fn check_complexity(state: &StateMap) -> std::result::Result<Value, BoxError> {
  let code: String = read(state, "code")?;
  let functions: Vec<FunctionInfo> = read(state, "functions")?;
  Ok(serde_json::to_value(Measured {
    complexity: measure_complexity(&code, functions.len()),
  })?)
}

pub fn detect_issues(state: &StateMap) -> std::result::Result<Value, BoxError> {
  let functions: Vec<FunctionInfo> = read(state, "functions")?;
  let complexity: Option<Complexity> = read(state, "complexity")?;
  let issues = find_issues(&functions, complexity.as_ref());
  Ok(serde_json::to_value(Detected {
    issue_count: issues.len(),
    issues,
  })?)
}

pub fn suggest_improvements(state: &StateMap) -> std::result::Result<Value, BoxError> {
  let functions: Vec<FunctionInfo> = read(state, "functions")?;
  let complexity: Option<Complexity> = read(state, "complexity")?;
  let issues: Vec<Issue> = read(state, "issues")?;

  let suggestions: Vec<Suggestion> = issues.iter().map(suggestion_for).collect();
  let score = quality_score(&issues, &functions, complexity.as_ref());
  debug!(score, suggestions = suggestions.len(), "review scored");
  let threshold = match state.get("threshold") {
    None | Some(Value::Null) => Some(DEFAULT_THRESHOLD),
    Some(_) => None,
  };
  Ok(serde_json::to_value(Suggested {
    suggestion_count: suggestions.len(),
    suggestions,
    quality_score: score,
    threshold,
  })?)
}

/// Coarse text heuristics over the whole of `code`. Branch keywords are counted as raw
/// substrings, so `elif` counts twice.
pub fn find_smells(code: &str) -> Vec<String> {
  let mut smells = Vec::new();
  if code.split('\n').count() > SMELL_MAX_LINES {
    smells.push("Long function detected".to_string());
  }
  if code.matches("if").count() + code.matches("elif").count() > SMELL_MAX_BRANCHES {
    smells.push("High cyclomatic complexity".to_string());
  }
  if code.contains("pass") && code.contains("def") {
    smells.push("Empty function detected".to_string());
  }
  smells
}

pub fn detect_smells(state: &StateMap) -> std::result::Result<Value, BoxError> {
  let code: String = read(state, "code")?;
  let smells = find_smells(&code);
  debug!(smells = smells.len(), "smells detected");
  Ok(serde_json::to_value(Smells {
    smell_count: smells.len(),
    smells,
  })?)
}
