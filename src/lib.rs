//! Online recognition of network matrices: an incremental SPQR-style
//! decomposition of the underlying graphic matroid, plus the presolver-side
//! driver that uses it to detect implied integrality of continuous columns.

pub mod components;
pub mod decomposition;
pub mod implint;
pub mod matrix;
pub mod union_find;

pub use decomposition::{
    Decomposition, DecompositionError, DecompositionResult, Digraph, DigraphArc, MatrixElement,
};
pub use implint::{find_implied_integers, DetectionResult, DetectionStats, ImplintConfig, VarKind};
