//! Build descriptor synthesis: one leaf project per successful job plus one
//! aggregator project per run.

pub mod aggregator;
pub mod leaf;

pub use aggregator::{
    content_digest, load_template, remove_stale, AggregatorDescriptor, WrittenAggregator,
    DEFAULT_TEMPLATE,
};
pub use leaf::{LeafProject, DESCRIPTOR_FILE};
