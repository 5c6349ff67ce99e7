//! Error type shared by every engine operation.

use crate::field::{BasisFunction, ValueLabel};
use crate::mesh::{ElementId, NodeId, Shape};
use crate::overlay::DroppedOverlayEntry;

pub type ScaffoldResult<T> = Result<T, ScaffoldError>;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ScaffoldError {
    #[error("local coordinate {xi:?} is outside {shape} element {element}")]
    ShapeMismatch {
        element: ElementId,
        shape: Shape,
        xi: Vec<f64>,
    },
    #[error("field `{field}` has no {label} parameter at node {node}")]
    MissingParameter {
        field: String,
        node: NodeId,
        label: ValueLabel,
    },
    #[error("coordinate {target:?} is not in the image of field `{field}`")]
    NotInDomain { field: String, target: Vec<f64> },
    #[error("annotation group `{0}` is built in and cannot be changed")]
    ImmutableGroup(String),
    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: String, reason: String },
    #[error("{} overlay entries no longer match the regenerated topology", .dropped.len())]
    IncompatibleOverlay { dropped: Vec<DroppedOverlayEntry> },
    #[error("non-conformant refinement: {duplicates} unshared nodes on {entities} base boundaries")]
    NonconformantRefinement { duplicates: usize, entities: usize },
    #[error("unknown node {0}")]
    UnknownNode(NodeId),
    #[error("unknown element {0}")]
    UnknownElement(ElementId),
    #[error("unknown field `{0}`")]
    UnknownField(String),
    #[error("unknown annotation group `{0}`")]
    UnknownGroup(String),
    #[error("unknown scaffold type `{name}`{}", did_you_mean(.suggestion.as_deref()))]
    UnknownScaffoldType {
        name: String,
        suggestion: Option<String>,
    },
    #[error("unknown parameter set `{0}`")]
    UnknownParameterSet(String),
    #[error("annotation group name `{0}` is already in use")]
    DuplicateGroupName(String),
    #[error("coordinate field `{field}` is degenerate in elements {elements:?}")]
    DegenerateCoordinateField {
        field: String,
        elements: Vec<ElementId>,
    },
    #[error("{basis:?} basis is not supported on {shape} elements")]
    UnsupportedBasis { shape: Shape, basis: BasisFunction },
    #[error("element {element} has shape {shape} which cannot be refined")]
    UnsupportedShape { element: ElementId, shape: Shape },
    #[error("invalid domain: {0}")]
    InvalidDomain(String),
    #[error("generation was cancelled")]
    Cancelled,
    #[error("settings error: {0}")]
    Settings(String),
}

impl ScaffoldError {
    pub(crate) fn invalid_parameter(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for ScaffoldError {
    fn from(err: serde_json::Error) -> Self {
        Self::Settings(err.to_string())
    }
}

fn did_you_mean(suggestion: Option<&str>) -> String {
    suggestion.map_or_else(String::new, |s| format!(" (did you mean `{s}`?)"))
}

/// Closest candidate by edit distance, if it is close enough to be a likely typo.
pub(crate) fn closest_name<'a, I>(name: &str, candidates: I) -> Option<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let limit = (name.chars().count() / 3).max(2);
    candidates
        .into_iter()
        .map(|candidate| (levenshtein::levenshtein(name, candidate), candidate))
        .filter(|(distance, _)| *distance <= limit)
        .min_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(b.1)))
        .map(|(_, candidate)| candidate.to_owned())
}
