// src/solver/conflict.rs

//! Conflict types for concretization
//!
//! A [`Conflict`] describes why one branch of the search failed. The solver
//! reports the deepest one as [`Unsatisfiable`] together with the chain of
//! constraints that led to it.

use std::fmt;

/// Why a branch of the search failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Conflict {
    /// No declared version satisfies every accumulated constraint
    NoVersionSatisfies {
        package: String,
        constraints: Vec<(String, String)>, // (origin, constraint)
    },
    /// An already bound node violates a newly added constraint
    UnsatisfiableConstraint {
        package: String,
        bound: String,
        required_constraint: String,
        required_by: String,
    },
    /// Two constraints pin one variant to different values
    ConflictingVariant {
        package: String,
        variant: String,
        values: Vec<(String, String)>, // (origin, value)
    },
    /// A constraint names a variant the recipe does not declare or a value it does not allow
    InvalidVariant {
        package: String,
        variant: String,
        value: String,
        origin: String,
    },
    /// No configured compiler satisfies the constraints on a package
    NoCompiler {
        package: String,
        constraints: Vec<String>,
    },
    /// No target satisfies the constraints on a package
    TargetMismatch {
        package: String,
        constraints: Vec<String>,
    },
    /// A recipe conflict rule holds
    ConflictRule {
        package: String,
        rule: String,
        message: Option<String>,
    },
    /// A dependency edge would close a cycle
    CircularDependency { cycle: Vec<String> },
    /// A dependency names a package with no recipe and no provider
    MissingPackage {
        package: String,
        required_by: Vec<String>,
    },
    /// The request constrains a package that nothing depends on
    UnusedConstraint { package: String },
}

impl Conflict {
    /// Package the conflict is about, if it is about one
    pub fn package(&self) -> Option<&str> {
        match self {
            Conflict::NoVersionSatisfies { package, .. }
            | Conflict::UnsatisfiableConstraint { package, .. }
            | Conflict::ConflictingVariant { package, .. }
            | Conflict::InvalidVariant { package, .. }
            | Conflict::NoCompiler { package, .. }
            | Conflict::TargetMismatch { package, .. }
            | Conflict::ConflictRule { package, .. }
            | Conflict::MissingPackage { package, .. }
            | Conflict::UnusedConstraint { package } => Some(package),
            Conflict::CircularDependency { .. } => None,
        }
    }
}

impl fmt::Display for Conflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Conflict::NoVersionSatisfies {
                package,
                constraints,
            } => {
                write!(f, "No version of {} satisfies all constraints:", package)?;
                for (origin, constraint) in constraints {
                    write!(f, "\n  - {} requires {}", origin, constraint)?;
                }
                Ok(())
            }
            Conflict::UnsatisfiableConstraint {
                package,
                bound,
                required_constraint,
                required_by,
            } => write!(
                f,
                "Package {} resolved as {} does not satisfy {} required by {}",
                package, bound, required_constraint, required_by
            ),
            Conflict::ConflictingVariant {
                package,
                variant,
                values,
            } => {
                write!(f, "Conflicting values for variant {} of {}:", variant, package)?;
                for (origin, value) in values {
                    write!(f, "\n  - {} requires {}", origin, value)?;
                }
                Ok(())
            }
            Conflict::InvalidVariant {
                package,
                variant,
                value,
                origin,
            } => write!(
                f,
                "{} requires {}={} but {} has no such variant value",
                origin, variant, value, package
            ),
            Conflict::NoCompiler {
                package,
                constraints,
            } => write!(
                f,
                "No configured compiler satisfies {} for {}",
                constraints.join(", "),
                package
            ),
            Conflict::TargetMismatch {
                package,
                constraints,
            } => write!(
                f,
                "No target satisfies {} for {}",
                constraints.join(", "),
                package
            ),
            Conflict::ConflictRule {
                package,
                rule,
                message,
            } => match message {
                Some(message) => write!(f, "{} ({}: conflicts with {})", message, package, rule),
                None => write!(f, "{} conflicts with {}", package, rule),
            },
            Conflict::CircularDependency { cycle } => {
                write!(f, "Circular dependency: {}", cycle.join(" -> "))
            }
            Conflict::MissingPackage {
                package,
                required_by,
            } => write!(
                f,
                "Missing package {} required by {}",
                package,
                required_by.join(", ")
            ),
            Conflict::UnusedConstraint { package } => write!(
                f,
                "{} is constrained but nothing depends on it",
                package
            ),
        }
    }
}

/// Concretization failure: the deepest conflict and how it was reached
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unsatisfiable {
    /// The request as given
    pub request: String,
    pub conflict: Conflict,
    /// Constraints that led to the conflict, outermost first
    pub chain: Vec<String>,
    /// Candidate bindings tried
    pub attempts: usize,
    /// Whether the search stopped because its budget ran out
    pub exhausted: bool,
}

impl fmt::Display for Unsatisfiable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Cannot satisfy '{}': {}", self.request, self.conflict)?;
        if !self.chain.is_empty() {
            write!(f, "\nConstraint chain:")?;
            for link in &self.chain {
                write!(f, "\n  {}", link)?;
            }
        }
        if self.exhausted {
            write!(
                f,
                "\nSearch stopped after {} attempts; raise solver.max_attempts to search further",
                self.attempts
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_display() {
        let conflict = Conflict::NoVersionSatisfies {
            package: "binutils".to_string(),
            constraints: vec![
                ("hpctoolkit@2020.08.03".to_string(), ":2.34".to_string()),
                ("user request".to_string(), "2.35:".to_string()),
            ],
        };
        let text = conflict.to_string();
        assert!(text.contains("No version of binutils"));
        assert!(text.contains("hpctoolkit@2020.08.03 requires :2.34"));
        assert_eq!(conflict.package(), Some("binutils"));
    }

    #[test]
    fn test_rule_message_first() {
        let conflict = Conflict::ConflictRule {
            package: "hpctoolkit".to_string(),
            rule: "+cuda when @:2019.99.99".to_string(),
            message: Some("cuda requires 2020.03.01 or later".to_string()),
        };
        assert!(conflict.to_string().starts_with("cuda requires 2020.03.01 or later"));
    }

    #[test]
    fn test_unsatisfiable_display() {
        let err = Unsatisfiable {
            request: "a +x".to_string(),
            conflict: Conflict::CircularDependency {
                cycle: vec!["a".to_string(), "b".to_string(), "a".to_string()],
            },
            chain: vec!["user request: a +x".to_string()],
            attempts: 3,
            exhausted: false,
        };
        let text = err.to_string();
        assert!(text.contains("Circular dependency: a -> b -> a"));
        assert!(text.contains("user request: a +x"));
        assert!(!text.contains("max_attempts"));
    }
}
