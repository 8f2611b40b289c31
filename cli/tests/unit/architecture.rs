//! Structural tests for architectural boundary enforcement.
//!
//! These tests scan source files to verify that the layer boundaries between
//! domain, application, infra and presentation hold.

use std::path::{Path, PathBuf};

/// Collect all `.rs` files under a directory recursively.
fn collect_rs_files(dir: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    if let Ok(entries) = std::fs::read_dir(dir) {
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                files.extend(collect_rs_files(&path));
            } else if path.extension().and_then(|e| e.to_str()) == Some("rs") {
                files.push(path);
            }
        }
    }
    files
}

fn src_dir(layer: &str) -> PathBuf {
    let src = Path::new(env!("CARGO_MANIFEST_DIR")).join("src");
    if layer.is_empty() { src } else { src.join(layer) }
}

/// Path of `file` relative to the crate root, with `/` separators.
fn relative(file: &Path) -> String {
    file.strip_prefix(env!("CARGO_MANIFEST_DIR"))
        .unwrap_or(file)
        .display()
        .to_string()
        .replace('\\', "/")
}

fn is_comment(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.starts_with("//") || trimmed.starts_with("/*") || trimmed.starts_with('*')
}

/// Track brace depth and return whether a line is inside a `#[cfg(test)]` block.
struct CfgTestTracker {
    in_test_block: bool,
    brace_depth: i32,
    test_block_start_depth: i32,
}

impl CfgTestTracker {
    fn new() -> Self {
        Self {
            in_test_block: false,
            brace_depth: 0,
            test_block_start_depth: 0,
        }
    }

    fn process_line(&mut self, line: &str) -> bool {
        if line.trim().contains("#[cfg(test)]") {
            self.in_test_block = true;
            self.test_block_start_depth = self.brace_depth;
        }
        for ch in line.chars() {
            match ch {
                '{' => self.brace_depth += 1,
                '}' => {
                    self.brace_depth -= 1;
                    if self.in_test_block && self.brace_depth <= self.test_block_start_depth {
                        self.in_test_block = false;
                    }
                }
                _ => {}
            }
        }
        self.in_test_block
    }
}

/// Whether a line sits in an async fn but outside `spawn_blocking`.
struct AsyncContextTracker {
    in_async_fn: bool,
    in_spawn_blocking: bool,
    brace_depth: i32,
    async_fn_start_depth: i32,
    spawn_blocking_start_depth: i32,
}

impl AsyncContextTracker {
    fn new() -> Self {
        Self {
            in_async_fn: false,
            in_spawn_blocking: false,
            brace_depth: 0,
            async_fn_start_depth: 0,
            spawn_blocking_start_depth: 0,
        }
    }

    fn process_line(&mut self, line: &str) -> bool {
        let trimmed = line.trim();
        if !is_comment(line) {
            if trimmed.contains("async fn ") {
                self.in_async_fn = true;
                self.async_fn_start_depth = self.brace_depth;
            } else if trimmed.contains("fn ") {
                self.in_async_fn = false;
                self.in_spawn_blocking = false;
            }
        }
        if self.in_async_fn && line.contains("spawn_blocking") {
            self.in_spawn_blocking = true;
            self.spawn_blocking_start_depth = self.brace_depth;
        }
        for ch in line.chars() {
            match ch {
                '{' => self.brace_depth += 1,
                '}' => {
                    self.brace_depth -= 1;
                    if self.in_spawn_blocking && self.brace_depth <= self.spawn_blocking_start_depth
                    {
                        self.in_spawn_blocking = false;
                    }
                    if self.in_async_fn && self.brace_depth <= self.async_fn_start_depth {
                        self.in_async_fn = false;
                    }
                }
                _ => {}
            }
        }
        self.in_async_fn && !self.in_spawn_blocking
    }
}

/// Which lines of a file a scan looks at.
#[derive(Clone, Copy)]
enum Scope {
    /// Every non-comment line.
    All,
    /// Non-comment lines outside `#[cfg(test)]` blocks.
    NonTest,
    /// Non-comment, non-test lines inside async fns and outside
    /// `spawn_blocking`.
    AsyncNonTest,
}

/// `file:line: pattern: text` for every line in `dir` that contains one of
/// `patterns` within `scope`.
fn find_patterns(dir: &Path, patterns: &[&str], scope: Scope) -> Vec<String> {
    let mut violations = Vec::new();
    for file in collect_rs_files(dir) {
        let Ok(content) = std::fs::read_to_string(&file) else {
            continue;
        };
        let rel = relative(&file);
        let mut tests = CfgTestTracker::new();
        let mut async_ctx = AsyncContextTracker::new();
        for (i, line) in content.lines().enumerate() {
            let in_test = tests.process_line(line);
            let in_async = async_ctx.process_line(line);
            let included = match scope {
                Scope::All => true,
                Scope::NonTest => !in_test,
                Scope::AsyncNonTest => !in_test && in_async,
            };
            if !included || is_comment(line) {
                continue;
            }
            for pattern in patterns {
                if line.contains(pattern) {
                    violations.push(format!("{rel}:{}: `{pattern}`: {}", i + 1, line.trim()));
                }
            }
        }
    }
    violations
}

fn assert_clean(violations: &[String], rule: &str) {
    assert!(
        violations.is_empty(),
        "{rule}:\n{}",
        violations.join("\n")
    );
}

/// Count non-test, non-comment, non-empty lines in a file.
fn count_non_test_lines(content: &str) -> usize {
    let mut tracker = CfgTestTracker::new();
    content
        .lines()
        .filter(|line| {
            let in_test = tracker.process_line(line);
            let trimmed = line.trim();
            !in_test && !trimmed.is_empty() && !trimmed.starts_with("//")
        })
        .count()
}

// ── Layer imports ────────────────────────────────────────────────────────────

#[test]
fn domain_has_no_io_or_upper_layer_imports() {
    let violations = find_patterns(
        &src_dir("domain"),
        &[
            "crate::infra",
            "crate::application",
            "crate::commands",
            "crate::output",
            "tokio::",
            "std::fs",
            "std::process",
            "std::net",
        ],
        Scope::NonTest,
    );
    assert_clean(&violations, "domain/ must stay pure and synchronous");
}

#[test]
fn application_has_no_infra_or_output_imports() {
    let violations = find_patterns(
        &src_dir("application"),
        &["crate::infra::", "crate::output::", "crate::commands::"],
        Scope::All,
    );
    assert_clean(&violations, "application/ must not import from infra/, output/ or commands/");
}

#[test]
fn infra_has_no_imports_from_commands_or_output() {
    let violations = find_patterns(
        &src_dir("infra"),
        &["crate::commands", "crate::output"],
        Scope::All,
    );
    assert_clean(&violations, "infra/ must not import from commands/ or output/");
}

// ── Output routing ───────────────────────────────────────────────────────────

#[test]
fn infra_has_no_print_macros_outside_tests() {
    let violations = find_patterns(&src_dir("infra"), &["println!", "eprintln!"], Scope::NonTest);
    assert_clean(&violations, "infra/ reports through tracing, never stdout/stderr");
}

#[test]
fn commands_render_through_the_renderer() {
    let violations = find_patterns(
        &src_dir("commands"),
        &["println!", "eprintln!", "print!(", "serde_json::to_string"],
        Scope::NonTest,
    );
    assert_clean(&violations, "commands/ must use app.renderer() for output");
}

#[test]
fn no_inline_json_branching_in_commands() {
    let mut violations = find_patterns(&src_dir("commands"), &["json: bool"], Scope::All);
    for file in collect_rs_files(&src_dir("commands")) {
        let Ok(content) = std::fs::read_to_string(&file) else {
            continue;
        };
        for (i, line) in content.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.starts_with("if json") || trimmed.starts_with("if !json") {
                violations.push(format!("{}:{}: inline JSON branch: {trimmed}", relative(&file), i + 1));
            }
        }
    }
    assert_clean(&violations, "use app.renderer() instead of branching on --json");
}

// ── Process and SSH plumbing ─────────────────────────────────────────────────

#[test]
fn processes_are_spawned_only_in_infra() {
    let violations: Vec<String> = find_patterns(
        &src_dir(""),
        &["TokioCommandRunner::new", "tokio::process::Command", "std::process::Command"],
        Scope::NonTest,
    )
    .into_iter()
    .filter(|v| !v.starts_with("src/infra/") && !v.starts_with("src/app.rs"))
    .collect();
    assert_clean(&violations, "process execution belongs behind the CommandRunner port");
}

#[test]
fn async_code_does_not_block_on_fs() {
    let mut violations = find_patterns(&src_dir("infra"), &["std::fs::"], Scope::AsyncNonTest);
    violations.extend(find_patterns(
        &src_dir("application"),
        &["std::fs::", "std::net::"],
        Scope::AsyncNonTest,
    ));
    assert_clean(&violations, "blocking I/O in async fns must run inside spawn_blocking");
}

#[test]
fn no_module_level_dead_code_allows_in_layers() {
    let mut violations = Vec::new();
    for layer in ["domain", "application", "infra"] {
        violations.extend(
            find_patterns(&src_dir(layer), &["#![allow(dead_code)]"], Scope::All),
        );
    }
    assert_clean(&violations, "use item-level dead_code suppression");
}

// ── Command handlers ─────────────────────────────────────────────────────────

/// Handlers that touch the application context must receive `&AppContext`
/// rather than loose parameters.
#[test]
fn command_handlers_accept_app_context() {
    let mut violations: Vec<String> = Vec::new();

    for file in collect_rs_files(&src_dir("commands")) {
        let Ok(content) = std::fs::read_to_string(&file) else {
            continue;
        };
        if !content.contains("pub fn run(") && !content.contains("pub async fn run(") {
            continue;
        }
        let uses_app = ["app.config", "app.renderer()", "app.reporter()", "app.ssh_connector()"]
            .iter()
            .any(|usage| content.contains(usage));
        if uses_app && !content.contains("app: &AppContext") {
            violations.push(format!(
                "{}: uses AppContext but run() does not accept &AppContext",
                relative(&file)
            ));
        }
    }

    assert_clean(&violations, "command handlers must accept &AppContext");
}

#[test]
fn command_handlers_are_reasonably_sized() {
    let mut violations: Vec<String> = Vec::new();

    for file in collect_rs_files(&src_dir("commands")) {
        let Ok(content) = std::fs::read_to_string(&file) else {
            continue;
        };
        let line_count = count_non_test_lines(&content);
        if line_count > 125 {
            violations.push(format!(
                "{}: {line_count} non-test lines (limit: 125)",
                relative(&file)
            ));
        }
    }

    assert_clean(
        &violations,
        "command handler files exceed 125 lines; move logic into application/",
    );
}
