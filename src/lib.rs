//! Fills unset options of a compiler configuration document from a
//! declarative table of option descriptors.

pub mod config_annotator;
pub mod config_descriptor;
pub mod config_resolved;
pub mod config_resolver;
pub mod config_types;
pub mod logging;

pub use config_annotator::{AppliedDefault, Annotator, CommentAnnotator, DefaultReason, NoopAnnotator};
pub use config_descriptor::{DefaultPolicy, DefaultRule, DescriptorTable, ForwardReference, OptionDescriptor};
pub use config_resolved::ResolvedConfig;
pub use config_resolver::{ResolveError, resolve, resolve_in_place, resolve_with};
pub use config_types::{ConfigDocument, Region, NESTED_KEY};
