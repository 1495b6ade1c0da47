//! Clone classification.
//!
//! The semantic verdict gates everything: without a proof of
//! equivalence no clone type above "No clone" is claimed, and an
//! `Unknown` verdict stays `Unknown` no matter how alike the trees
//! look. Syntax only refines a proven equivalence into a type.

use std::fmt;

use crate::analyze::{same_statement_multiset, FunctionAnalysis};
use crate::solve::Verdict;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CloneType {
    /// Identical up to whitespace and comments.
    Type1,
    /// Identical up to renamed identifiers.
    Type2,
    /// Same statements, reordered or lightly edited, same behavior.
    Type3,
    /// Same behavior from dissimilar syntax.
    Type4,
}

impl CloneType {
    pub fn describe(&self) -> &'static str {
        match self {
            CloneType::Type1 => "identical code",
            CloneType::Type2 => "renamed identifiers",
            CloneType::Type3 => "reordered or lightly edited",
            CloneType::Type4 => "semantically equivalent, syntactically dissimilar",
        }
    }
}

impl fmt::Display for CloneType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let n = match self {
            CloneType::Type1 => 1,
            CloneType::Type2 => 2,
            CloneType::Type3 => 3,
            CloneType::Type4 => 4,
        };
        write!(f, "Type {n}")
    }
}

/// The final answer for a pair of functions.
#[derive(Clone, Debug)]
pub enum Classification {
    Clone(CloneType),
    NoClone,
    Unknown(String),
}

impl Classification {
    pub fn label(&self) -> String {
        match self {
            Classification::Clone(t) => format!("{t} clone ({})", t.describe()),
            Classification::NoClone => "No clone".to_string(),
            Classification::Unknown(_) => "Unknown".to_string(),
        }
    }
}

/// Combine the oracle's verdict with syntactic evidence.
pub fn classify(
    verdict: &Verdict,
    a: &FunctionAnalysis,
    b: &FunctionAnalysis,
) -> Classification {
    match verdict {
        Verdict::Equivalent => {
            if a.exact_hash == b.exact_hash {
                Classification::Clone(CloneType::Type1)
            } else if a.shape_hash == b.shape_hash {
                Classification::Clone(CloneType::Type2)
            } else if same_statement_multiset(&a.stmt_fingerprints, &b.stmt_fingerprints) {
                Classification::Clone(CloneType::Type3)
            } else {
                Classification::Clone(CloneType::Type4)
            }
        }
        Verdict::NotEquivalent(_) => Classification::NoClone,
        Verdict::Unknown(reason) => Classification::Unknown(reason.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyze::analyze_primary;
    use crate::solve::{Counterexample, Value};

    fn analysis(source: &str) -> FunctionAnalysis {
        analyze_primary(&crate::parse_source_silent(source, "test.py").unwrap())
    }

    fn cex() -> Verdict {
        Verdict::NotEquivalent(Counterexample {
            inputs: vec![("x".to_string(), Value::Int(0))],
            output_a: Value::Int(1),
            output_b: Value::Int(2),
        })
    }

    #[test]
    fn test_identical_code_is_type1() {
        let a = analysis("def f(x):\n    return x + 1\n");
        let b = analysis("def f(x):\n    return x + 1\n");
        assert!(matches!(
            classify(&Verdict::Equivalent, &a, &b),
            Classification::Clone(CloneType::Type1)
        ));
    }

    #[test]
    fn test_renamed_identifiers_are_type2() {
        let a = analysis("def f(x):\n    return x + 1\n");
        let b = analysis("def g(y):\n    return y + 1\n");
        assert!(matches!(
            classify(&Verdict::Equivalent, &a, &b),
            Classification::Clone(CloneType::Type2)
        ));
    }

    #[test]
    fn test_reordered_statements_are_type3() {
        let a = analysis("def f(x):\n    a = x + 1\n    b = x * 2\n    return a + b\n");
        let b = analysis("def f(x):\n    b = x * 2\n    a = x + 1\n    return a + b\n");
        assert!(matches!(
            classify(&Verdict::Equivalent, &a, &b),
            Classification::Clone(CloneType::Type3)
        ));
    }

    #[test]
    fn test_dissimilar_equivalents_are_type4() {
        let a = analysis("def f(x):\n    return x + x\n");
        let b = analysis("def g(y):\n    return y * 2\n");
        assert!(matches!(
            classify(&Verdict::Equivalent, &a, &b),
            Classification::Clone(CloneType::Type4)
        ));
    }

    #[test]
    fn test_not_equivalent_is_no_clone() {
        // Even identical-looking syntax cannot out-vote a confirmed
        // counterexample.
        let a = analysis("def f(x):\n    return x + 1\n");
        let b = analysis("def f(x):\n    return x + 1\n");
        assert!(matches!(classify(&cex(), &a, &b), Classification::NoClone));
    }

    #[test]
    fn test_unknown_verdict_gates_classification() {
        let a = analysis("def f(x):\n    return x + 1\n");
        let b = analysis("def f(x):\n    return x + 1\n");
        let verdict = Verdict::Unknown("solver timeout".to_string());
        match classify(&verdict, &a, &b) {
            Classification::Unknown(reason) => assert_eq!(reason, "solver timeout"),
            other => panic!("expected unknown, got {other:?}"),
        }
    }

    #[test]
    fn test_labels() {
        assert_eq!(
            Classification::Clone(CloneType::Type4).label(),
            "Type 4 clone (semantically equivalent, syntactically dissimilar)"
        );
        assert_eq!(Classification::NoClone.label(), "No clone");
    }
}
