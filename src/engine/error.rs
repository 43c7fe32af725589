use thiserror::Error;

use super::driver::Stage;
use super::numbering::NumberStyle;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("malformed marker `{marker}`: {reason}")]
    MalformedMarker { marker: String, reason: &'static str },

    #[error("no declaration matches `{identifier}` in catalog `{catalog}`")]
    UnresolvedReference { catalog: String, identifier: String },

    #[error("ordinal {ordinal} is outside the supported range for {style} numbering")]
    FormatRange { ordinal: u32, style: NumberStyle },

    #[error("{requested} pass requested while the driver is in the {current} stage")]
    StageOrder { requested: Stage, current: Stage },

    #[error("invalid catalog `{name}`: {reason}")]
    InvalidCatalog { name: String, reason: String },

    #[error("invalid reference prefix `{prefix}`: {reason}")]
    InvalidPrefix { prefix: String, reason: &'static str },
}
