//! Typed construction-time validation errors.

/// Failure raised while constructing a kernel value object.
///
/// These surface at the API boundary before any search state exists;
/// a value that constructs successfully is valid for the life of the
/// search.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// `sum(priors)` deviated from 1 beyond the accepted tolerance.
    PriorSumMismatch { sum: f64 },

    /// `tactics`, `priors`, and `children_for_tactic` disagree in length.
    LengthMismatch {
        tactics: usize,
        priors: usize,
        children: usize,
    },

    /// A prior was negative, NaN, or infinite.
    BadPrior { index: usize, value: f64 },

    /// `log_critic` was NaN or infinite.
    NonFiniteCritic { value: f64 },
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PriorSumMismatch { sum } => {
                write!(f, "prior sum {sum} deviates from 1 beyond tolerance")
            }
            Self::LengthMismatch {
                tactics,
                priors,
                children,
            } => write!(
                f,
                "mismatched proposal lengths: {tactics} tactics, {priors} priors, {children} child lists"
            ),
            Self::BadPrior { index, value } => {
                write!(f, "prior at index {index} is not a valid probability: {value}")
            }
            Self::NonFiniteCritic { value } => {
                write!(f, "log_critic is not finite: {value}")
            }
        }
    }
}

impl std::error::Error for ValidationError {}
