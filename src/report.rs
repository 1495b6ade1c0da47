//! Report rendering.
//!
//! A sectioned plain-text report for humans and a hand-rolled JSON
//! document for tooling. The JSON writer stays dependency-free on
//! purpose: the document is flat and small, and building it by hand
//! keeps the output byte-stable.

use std::fmt::Write as _;

use crate::classify::Classification;
use crate::pipeline::{Comparison, SymSummary};
use crate::solve::{Value, Verdict};
use crate::sym::Outcome;

const WIDTH: usize = 60;

fn section(out: &mut String, title: &str) {
    let title = format!(" {title} ");
    let side = WIDTH.saturating_sub(title.len()) / 2;
    let rest = WIDTH.saturating_sub(side + title.len());
    let _ = writeln!(out, "\n{}{}{}", "=".repeat(side), title, "=".repeat(rest));
}

/// Render the human-readable report.
pub fn format_report(c: &Comparison, verbose: bool) -> String {
    let mut out = String::new();

    section(&mut out, "Clone Verification");
    let _ = writeln!(out, "Comparing: {} <==> {}", c.file_a, c.file_b);
    let _ = writeln!(out, "Functions: {} / {}", c.name_a, c.name_b);

    section(&mut out, "Developer Insights");
    let cf_a: Vec<&str> = c.analysis_a.control_flow.iter().map(|n| n.as_str()).collect();
    let cf_b: Vec<&str> = c.analysis_b.control_flow.iter().map(|n| n.as_str()).collect();
    let _ = writeln!(out, "Control flow 1: [{}]", cf_a.join(", "));
    let _ = writeln!(out, "Control flow 2: [{}]", cf_b.join(", "));
    let _ = writeln!(
        out,
        "Logic mismatch count: {}",
        c.analysis_a.logic.mismatch(&c.analysis_b.logic)
    );
    let _ = writeln!(
        out,
        "I/O pattern 1: inputs [{}], outputs [{}]",
        c.analysis_a.io.inputs.join(", "),
        c.analysis_a.io.outputs.join(", ")
    );
    let _ = writeln!(
        out,
        "I/O pattern 2: inputs [{}], outputs [{}]",
        c.analysis_b.io.inputs.join(", "),
        c.analysis_b.io.outputs.join(", ")
    );
    let _ = writeln!(
        out,
        "I/O similarity: {:.2}",
        c.analysis_a.io.similarity(&c.analysis_b.io)
    );
    let _ = writeln!(
        out,
        "Computational pattern: {} vs {}",
        c.analysis_a.pattern.label(),
        c.analysis_b.pattern.label()
    );

    section(&mut out, "Structural Comparison");
    let _ = writeln!(
        out,
        "Exact hash: {} vs {} ({})",
        c.analysis_a.exact_hash,
        c.analysis_b.exact_hash,
        agreement(c.analysis_a.exact_hash == c.analysis_b.exact_hash)
    );
    let _ = writeln!(
        out,
        "Shape hash: {} vs {} ({})",
        c.analysis_a.shape_hash,
        c.analysis_b.shape_hash,
        agreement(c.analysis_a.shape_hash == c.analysis_b.shape_hash)
    );
    let multiset_equal = crate::analyze::same_statement_multiset(
        &c.analysis_a.stmt_fingerprints,
        &c.analysis_b.stmt_fingerprints,
    );
    let _ = writeln!(
        out,
        "Statement multiset: {}",
        if multiset_equal { "equal" } else { "differs" }
    );

    section(&mut out, "Symbolic Analysis");
    match (&c.sym_a, &c.sym_b) {
        (Some(a), Some(b)) => {
            write_sym_summary(&mut out, &c.name_a, a, c.bound);
            write_sym_summary(&mut out, &c.name_b, b, c.bound);
            if verbose {
                write_paths(&mut out, &c.name_a, a);
                write_paths(&mut out, &c.name_b, b);
            }
        }
        _ => {
            let _ = writeln!(out, "Skipped: {}", c.method);
        }
    }

    section(&mut out, "Verdict");
    match &c.verdict {
        Some(verdict) => {
            let _ = writeln!(out, "Semantic verdict: {}", verdict.label());
            match verdict {
                Verdict::NotEquivalent(cex) => {
                    let _ = writeln!(out, "Counterexample: {}", cex.format(&c.name_a, &c.name_b));
                }
                Verdict::Unknown(reason) => {
                    let _ = writeln!(out, "Reason: {reason}");
                }
                Verdict::Equivalent => {}
            }
        }
        None => {
            let _ = writeln!(out, "Semantic verdict: NOT POSED");
        }
    }
    let _ = writeln!(out, "Method: {}", c.method);

    section(&mut out, "Clone Detection Result");
    let _ = writeln!(
        out,
        "Verified clone match: {}",
        match &c.classification {
            Classification::Clone(_) => "True",
            Classification::NoClone => "False",
            Classification::Unknown(_) => "Unknown",
        }
    );
    let _ = writeln!(out, "Clone type identified: {}", c.classification.label());
    if let Classification::Unknown(reason) = &c.classification {
        let _ = writeln!(out, "Reason: {reason}");
    }
    let _ = writeln!(out, "{}", "=".repeat(WIDTH));

    out
}

fn agreement(equal: bool) -> &'static str {
    if equal {
        "match"
    } else {
        "differ"
    }
}

fn write_sym_summary(out: &mut String, name: &str, sym: &SymSummary, bound: usize) {
    let _ = write!(
        out,
        "Paths ({name}): {} covered",
        sym.covered_count
    );
    if sym.bounded_count > 0 {
        let _ = write!(out, ", {} beyond bound", sym.bounded_count);
    }
    let _ = writeln!(out, " (K = {bound})");
    if sym.partial {
        let _ = writeln!(out, "  note: path ceiling hit, coverage is partial");
    }
}

fn write_paths(out: &mut String, name: &str, sym: &SymSummary) {
    let _ = writeln!(out, "Paths of {name}:");
    for (i, path) in sym.paths.iter().enumerate() {
        let outcome = match &path.outcome {
            Outcome::Returned(v) => format!("return {v}"),
            Outcome::ImplicitNone => "return None (implicit)".to_string(),
            Outcome::BoundExceeded => "bound exceeded".to_string(),
        };
        let _ = writeln!(out, "  [{i}] when {} -> {outcome}", path.condition);
    }
}

// ─── JSON ──────────────────────────────────────────────────────────

/// Render the machine-readable report.
pub fn format_json(c: &Comparison) -> String {
    let mut fields = Vec::new();
    fields.push(json_str("file_a", &c.file_a));
    fields.push(json_str("file_b", &c.file_b));
    fields.push(json_str("function_a", &c.name_a));
    fields.push(json_str("function_b", &c.name_b));
    fields.push(json_str("exact_hash_a", &c.analysis_a.exact_hash.to_short()));
    fields.push(json_str("exact_hash_b", &c.analysis_b.exact_hash.to_short()));
    fields.push(json_str("shape_hash_a", &c.analysis_a.shape_hash.to_short()));
    fields.push(json_str("shape_hash_b", &c.analysis_b.shape_hash.to_short()));
    fields.push(json_uint("bound", c.bound as u64));
    fields.push(json_str("solver", c.solver));
    fields.push(json_str("method", &c.method));

    match &c.verdict {
        Some(verdict) => {
            fields.push(json_str("verdict", verdict.label()));
            match verdict {
                Verdict::Unknown(reason) => fields.push(json_str("reason", reason)),
                Verdict::NotEquivalent(cex) => {
                    let inputs = cex
                        .inputs
                        .iter()
                        .map(|(name, v)| {
                            format!(
                                "{{\"name\": \"{}\", \"value\": {}}}",
                                json_escape(name),
                                json_value(*v)
                            )
                        })
                        .collect::<Vec<_>>()
                        .join(", ");
                    fields.push(format!(
                        "\"counterexample\": {{\"inputs\": [{inputs}], \
                         \"output_a\": {}, \"output_b\": {}}}",
                        json_value(cex.output_a),
                        json_value(cex.output_b)
                    ));
                }
                Verdict::Equivalent => {}
            }
        }
        None => fields.push("\"verdict\": null".to_string()),
    }

    if let Some(sym) = &c.sym_a {
        fields.push(json_uint("paths_a", sym.path_count as u64));
        fields.push(json_uint("bounded_paths_a", sym.bounded_count as u64));
        fields.push(json_bool("partial_a", sym.partial));
    }
    if let Some(sym) = &c.sym_b {
        fields.push(json_uint("paths_b", sym.path_count as u64));
        fields.push(json_uint("bounded_paths_b", sym.bounded_count as u64));
        fields.push(json_bool("partial_b", sym.partial));
    }

    fields.push(json_str("classification", &c.classification.label()));
    fields.push(match &c.classification {
        Classification::Clone(_) => json_bool("clone", true),
        Classification::NoClone => json_bool("clone", false),
        Classification::Unknown(_) => "\"clone\": null".to_string(),
    });

    let mut out = String::from("{\n");
    out.push_str(
        &fields
            .iter()
            .map(|f| format!("  {f}"))
            .collect::<Vec<_>>()
            .join(",\n"),
    );
    out.push_str("\n}\n");
    out
}

fn json_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => {
                let _ = write!(out, "\\u{:04x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out
}

fn json_str(key: &str, value: &str) -> String {
    format!("\"{}\": \"{}\"", json_escape(key), json_escape(value))
}

fn json_uint(key: &str, value: u64) -> String {
    format!("\"{}\": {}", json_escape(key), value)
}

fn json_bool(key: &str, value: bool) -> String {
    format!("\"{}\": {}", json_escape(key), value)
}

fn json_value(v: Value) -> String {
    match v {
        Value::Int(i) => i.to_string(),
        Value::Bool(true) => "true".to_string(),
        Value::Bool(false) => "false".to_string(),
        Value::None => "null".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_escape() {
        assert_eq!(json_escape("plain"), "plain");
        assert_eq!(json_escape("a\"b"), "a\\\"b");
        assert_eq!(json_escape("a\\b"), "a\\\\b");
        assert_eq!(json_escape("line\nbreak"), "line\\nbreak");
    }

    #[test]
    fn test_json_helpers() {
        assert_eq!(json_str("k", "v"), "\"k\": \"v\"");
        assert_eq!(json_uint("n", 42), "\"n\": 42");
        assert_eq!(json_bool("b", false), "\"b\": false");
        assert_eq!(json_value(Value::Int(-3)), "-3");
        assert_eq!(json_value(Value::None), "null");
    }

    #[test]
    fn test_verbose_path_listing() {
        use crate::infer::Sort;
        use crate::sym::{Outcome, Path, SymExpr};

        let x = || SymExpr::Input {
            index: 0,
            name: "x".to_string(),
            sort: Sort::Int,
        };
        let sym = SymSummary {
            path_count: 2,
            covered_count: 2,
            bounded_count: 0,
            unbounded: false,
            partial: false,
            paths: vec![
                Path {
                    condition: SymExpr::Gt(Box::new(x()), Box::new(SymExpr::Int(0))),
                    outcome: Outcome::Returned(SymExpr::Int(1)),
                },
                Path {
                    condition: SymExpr::Le(Box::new(x()), Box::new(SymExpr::Int(0))),
                    outcome: Outcome::ImplicitNone,
                },
            ],
        };
        let mut out = String::new();
        write_paths(&mut out, "f", &sym);
        insta::assert_snapshot!(out, @r###"
        Paths of f:
          [0] when (x > 0) -> return 1
          [1] when (x <= 0) -> return None (implicit)
        "###);
    }

    #[test]
    fn test_section_title_is_padded_to_width() {
        let mut out = String::new();
        section(&mut out, "Verdict");
        let line = out.trim_start_matches('\n').trim_end();
        assert_eq!(line.len(), WIDTH);
        assert!(line.contains(" Verdict "));
    }
}
