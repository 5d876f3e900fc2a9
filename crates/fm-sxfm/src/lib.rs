//! # fm-sxfm
//!
//! Reader and writer for SXFM (Simple XML Feature Model), the text format
//! persisted model artifacts use.
//!
//! ```text
//! <feature_model name="FM_6_0">
//! <meta>
//! </meta>
//! <feature_tree>
//! :r F0 (F0)
//!     :m F1 (F1)
//!     :g (G0) [1,1]
//!         : F2 (F2)
//!         : F3 (F3)
//! </feature_tree>
//! <constraints>
//! C1: ~F1 or F2
//! </constraints>
//! </feature_model>
//! ```
//!
//! Indentation is one tab per tree level. Groups with cardinality `[1,1]`
//! are alternatives; `[1,*]` (or `[1,n]` with `n` members) are or-groups.
//! Constraints are two-literal clauses: `~a or b` is `a requires b`,
//! `~a or ~b` is `a excludes b`.

mod parser;
mod writer;

pub use parser::{parse_file, parse_str};
pub use writer::{to_sxfm_string, write_file, write_to};

use fm_core::StructureError;

pub(crate) const HEADER_OPEN: &str = "<feature_model";
pub(crate) const HEADER_CLOSE: &str = "</feature_model>";
pub(crate) const META_OPEN: &str = "<meta>";
pub(crate) const META_CLOSE: &str = "</meta>";
pub(crate) const TREE_OPEN: &str = "<feature_tree>";
pub(crate) const TREE_CLOSE: &str = "</feature_tree>";
pub(crate) const CONSTRAINTS_OPEN: &str = "<constraints>";
pub(crate) const CONSTRAINTS_CLOSE: &str = "</constraints>";

/// SXFM read/write errors.
#[derive(Debug, thiserror::Error)]
pub enum SxfmError {
    #[error("line {line}: {message}")]
    Syntax { line: usize, message: String },

    #[error("line {line}: unknown feature '{id}'")]
    UnknownFeature { line: usize, id: String },

    #[error("line {line}: duplicate feature '{id}'")]
    DuplicateFeature { line: usize, id: String },

    #[error("line {line}: unsupported constraint '{text}'")]
    UnsupportedConstraint { line: usize, text: String },

    #[error("line {line}: unsupported group cardinality '{text}'")]
    UnsupportedCardinality { line: usize, text: String },

    #[error("Missing section {0}")]
    MissingSection(&'static str),

    #[error("Feature name '{0}' cannot be written as SXFM")]
    InvalidName(String),

    #[error("Malformed model: {0}")]
    Structure(#[from] StructureError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SxfmError {
    pub(crate) fn syntax(line: usize, message: impl Into<String>) -> Self {
        SxfmError::Syntax {
            line,
            message: message.into(),
        }
    }
}
