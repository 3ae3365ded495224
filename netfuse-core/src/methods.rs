use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::constants::{CONTEXT_THRESHOLD, DISCRIMINANT_THRESHOLD, ZSCORE_THRESHOLD};
use crate::types::{FusionError, OntologyBranch};

/// Policy assigning non-negative weights to the selected features.
///
/// # Examples
///
/// ```rust
/// use netfuse_core::methods::CombiningMethod;
///
/// let method: CombiningMethod = "Automatic_Select".parse()?;
/// assert_eq!(method.resolve(3, 6), CombiningMethod::Average);
/// assert_eq!(method.resolve(6, 6), CombiningMethod::Automatic);
/// # Ok::<(), netfuse_core::types::FusionError>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CombiningMethod {
    /// `Average` for small queries, `Automatic` otherwise
    AutomaticSelect,
    /// Weights learned from relevance to the query
    Automatic,
    /// `Automatic` restricted to networks tagged biological process
    Bp,
    /// `Automatic` restricted to networks tagged molecular function
    Mf,
    /// `Automatic` restricted to networks tagged cellular component
    Cc,
    /// Equal weight per feature
    Average,
    /// Equal weight per category, split evenly within each category
    AverageCategory,
}

impl CombiningMethod {
    pub const ALL: [Self; 7] = [
        Self::AutomaticSelect,
        Self::Automatic,
        Self::Bp,
        Self::Mf,
        Self::Cc,
        Self::Average,
        Self::AverageCategory,
    ];

    /// Replace `AutomaticSelect` with the concrete method for a query of
    /// `positive_count` genes. Concrete methods are returned unchanged.
    #[must_use]
    pub const fn resolve(self, positive_count: usize, min_query_size: usize) -> Self {
        match self {
            Self::AutomaticSelect if positive_count < min_query_size => Self::Average,
            Self::AutomaticSelect => Self::Automatic,
            other => other,
        }
    }

    /// Ontology branch a restricted automatic method filters networks by
    #[must_use]
    pub const fn ontology_branch(self) -> Option<OntologyBranch> {
        match self {
            Self::Bp => Some(OntologyBranch::BiologicalProcess),
            Self::Mf => Some(OntologyBranch::MolecularFunction),
            Self::Cc => Some(OntologyBranch::CellularComponent),
            _ => None,
        }
    }

    /// Whether weights come from a relevance statistic
    #[must_use]
    pub const fn is_learned(self) -> bool {
        matches!(self, Self::Automatic | Self::Bp | Self::Mf | Self::Cc)
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::AutomaticSelect => "automatic_select",
            Self::Automatic => "automatic",
            Self::Bp => "bp",
            Self::Mf => "mf",
            Self::Cc => "cc",
            Self::Average => "average",
            Self::AverageCategory => "average_category",
        }
    }
}

impl FromStr for CombiningMethod {
    type Err = FusionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|method| method.name() == wanted)
            .ok_or_else(|| FusionError::InvalidRequest(format!("unknown combining method '{s}'")))
    }
}

impl fmt::Display for CombiningMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Vector a ranking is reported from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoringMethod {
    /// Rank and report the rescaled discriminant
    #[default]
    Discriminant,
    /// Rank and report discriminant z-scores
    ZScore,
    /// Rank by the raw discriminant, report rescaled relatedness to the query
    Context,
}

impl ScoringMethod {
    /// Reporting threshold used by [`ResultPolicy::TopScores`]
    #[must_use]
    pub const fn default_threshold(self) -> f64 {
        match self {
            Self::Discriminant => DISCRIMINANT_THRESHOLD,
            Self::ZScore => ZSCORE_THRESHOLD,
            Self::Context => CONTEXT_THRESHOLD,
        }
    }
}

impl FromStr for ScoringMethod {
    type Err = FusionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "discriminant" => Ok(Self::Discriminant),
            "z" | "zscore" | "z_score" => Ok(Self::ZScore),
            "context" => Ok(Self::Context),
            _ => Err(FusionError::InvalidRequest(format!(
                "unknown scoring method '{s}'"
            ))),
        }
    }
}

impl fmt::Display for ScoringMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Discriminant => write!(f, "discriminant"),
            Self::ZScore => write!(f, "zscore"),
            Self::Context => write!(f, "context"),
        }
    }
}

/// Which genes end up in a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResultPolicy {
    /// At most `result_limit` genes scoring above the method threshold,
    /// query genes excluded
    #[default]
    TopScores,
    /// Every gene except the query genes, no threshold
    AllScores,
}
