//! The comparison pipeline.
//!
//! One call runs the whole story for a pair of sources: parse,
//! syntactic analysis, sort inference, the hash fast path, bounded
//! symbolic execution, encoding, the equivalence oracle, and finally
//! classification. Everything the reporter needs lands in one
//! `Comparison` value.

use std::time::Duration;

use crate::analyze::{analyze_primary, FunctionAnalysis};
use crate::classify::{classify, Classification, CloneType};
use crate::encode::encode;
use crate::infer::{infer_sorts, unify_signatures};
use crate::parser::ParseFailure;
use crate::solve::{decide_equivalence, BackendKind, InputSig, SolverConfig, Verdict};
use crate::sym::executor::{execute, ExecConfig, ExecError};
use crate::sym::Path;

#[derive(Clone, Debug)]
pub struct PipelineConfig {
    /// Loop and call unrolling bound (K).
    pub unroll_bound: usize,
    pub max_paths: usize,
    pub timeout: Duration,
    pub backend: BackendKind,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            unroll_bound: 10,
            max_paths: 4096,
            timeout: Duration::from_secs(5),
            backend: BackendKind::Builtin,
        }
    }
}

/// Loading one of the two files failed. Fatal: no classification is
/// produced.
#[derive(Debug)]
pub enum CompareError {
    Parse {
        /// 0 for the first file, 1 for the second.
        file_index: usize,
        failure: ParseFailure,
    },
    Unsupported {
        file_index: usize,
        error: ExecError,
    },
}

/// Per-function summary of the symbolic stage.
#[derive(Clone, Debug)]
pub struct SymSummary {
    pub path_count: usize,
    pub covered_count: usize,
    pub bounded_count: usize,
    pub unbounded: bool,
    pub partial: bool,
    /// Full path listing, for verbose reporting.
    pub paths: Vec<Path>,
}

/// Everything a comparison run produced.
#[derive(Clone, Debug)]
pub struct Comparison {
    pub file_a: String,
    pub file_b: String,
    pub name_a: String,
    pub name_b: String,
    pub analysis_a: FunctionAnalysis,
    pub analysis_b: FunctionAnalysis,
    /// `None` when the symbolic stage was skipped (hash fast path or
    /// signature mismatch).
    pub sym_a: Option<SymSummary>,
    pub sym_b: Option<SymSummary>,
    /// `None` when no equivalence question was ever posed (signature
    /// mismatch).
    pub verdict: Option<Verdict>,
    /// How the verdict was reached, for the report.
    pub method: String,
    pub classification: Classification,
    pub bound: usize,
    pub solver: &'static str,
}

/// Compare two already-loaded sources.
pub fn compare_sources(
    source_a: &str,
    file_a: &str,
    source_b: &str,
    file_b: &str,
    config: &PipelineConfig,
) -> Result<Comparison, CompareError> {
    let module_a = crate::parse_source_silent(source_a, file_a)
        .map_err(|failure| CompareError::Parse {
            file_index: 0,
            failure,
        })?;
    let module_b = crate::parse_source_silent(source_b, file_b)
        .map_err(|failure| CompareError::Parse {
            file_index: 1,
            failure,
        })?;

    let analysis_a = analyze_primary(&module_a);
    let analysis_b = analyze_primary(&module_b);
    let name_a = module_a.primary().node.name.node.clone();
    let name_b = module_b.primary().node.name.node.clone();

    let mut comparison = Comparison {
        file_a: file_a.to_string(),
        file_b: file_b.to_string(),
        name_a,
        name_b,
        analysis_a,
        analysis_b,
        sym_a: None,
        sym_b: None,
        verdict: None,
        method: String::new(),
        classification: Classification::NoClone,
        bound: config.unroll_bound,
        solver: config.backend.as_str(),
    };

    // Hash fast path: identical or alpha-equivalent trees are
    // equivalent by construction, no execution needed.
    if comparison.analysis_a.exact_hash == comparison.analysis_b.exact_hash {
        comparison.verdict = Some(Verdict::Equivalent);
        comparison.method = "content hash (identical trees)".to_string();
        comparison.classification = Classification::Clone(CloneType::Type1);
        return Ok(comparison);
    }
    if comparison.analysis_a.shape_hash == comparison.analysis_b.shape_hash {
        comparison.verdict = Some(Verdict::Equivalent);
        comparison.method = "content hash (alpha-equivalent trees)".to_string();
        comparison.classification = Classification::Clone(CloneType::Type2);
        return Ok(comparison);
    }

    // Sorts and signatures.
    let sorts_a = match infer_sorts(&module_a.primary().node) {
        Ok(s) => s,
        Err(e) => return Ok(undetermined(comparison, file_a, &e.to_string())),
    };
    let sorts_b = match infer_sorts(&module_b.primary().node) {
        Ok(s) => s,
        Err(e) => return Ok(undetermined(comparison, file_b, &e.to_string())),
    };
    let unified = match unify_signatures(&sorts_a, &sorts_b) {
        Ok(u) => u,
        Err(e) => {
            // Incomparable inputs: no clone, and nothing to solve.
            comparison.method = format!("signature comparison ({e})");
            comparison.classification = Classification::NoClone;
            return Ok(comparison);
        }
    };

    // Bounded symbolic execution of both sides.
    let exec_config = ExecConfig {
        unroll_bound: config.unroll_bound,
        max_paths: config.max_paths,
    };
    let exec_a = execute(&module_a, &unified, &exec_config).map_err(|error| {
        CompareError::Unsupported {
            file_index: 0,
            error,
        }
    })?;
    let exec_b = execute(&module_b, &unified, &exec_config).map_err(|error| {
        CompareError::Unsupported {
            file_index: 1,
            error,
        }
    })?;

    let encoded_a = encode(&comparison.name_a, &unified, &exec_a);
    let encoded_b = encode(&comparison.name_b, &unified, &exec_b);

    comparison.sym_a = Some(SymSummary {
        path_count: exec_a.paths.len(),
        covered_count: exec_a.covered_count(),
        bounded_count: exec_a.bounded_count(),
        unbounded: encoded_a.unbounded,
        partial: encoded_a.partial,
        paths: exec_a.paths.clone(),
    });
    comparison.sym_b = Some(SymSummary {
        path_count: exec_b.paths.len(),
        covered_count: exec_b.covered_count(),
        bounded_count: exec_b.bounded_count(),
        unbounded: encoded_b.unbounded,
        partial: encoded_b.partial,
        paths: exec_b.paths.clone(),
    });

    // The oracle.
    let inputs: Vec<InputSig> = module_a
        .primary()
        .node
        .params
        .iter()
        .zip(&unified)
        .map(|(p, sort)| InputSig {
            name: p.name.node.clone(),
            sort: *sort,
        })
        .collect();
    let solver_config = SolverConfig {
        backend: config.backend,
        timeout: config.timeout,
    };
    let verdict = decide_equivalence(
        &encoded_a,
        &encoded_b,
        &module_a,
        &module_b,
        &inputs,
        &solver_config,
    );

    comparison.method = format!("symbolic equivalence ({})", config.backend.as_str());
    comparison.classification =
        classify(&verdict, &comparison.analysis_a, &comparison.analysis_b);
    comparison.verdict = Some(verdict);
    Ok(comparison)
}

fn undetermined(mut comparison: Comparison, file: &str, reason: &str) -> Comparison {
    let reason = format!("{reason} (in {file})");
    comparison.method = "sort inference".to_string();
    comparison.verdict = Some(Verdict::Unknown(reason.clone()));
    comparison.classification = Classification::Unknown(reason);
    comparison
}
