//! Workbook metadata: records, the path codec, the identity-keyed
//! collection, and the hierarchical tree projection.

pub mod codec;
pub mod collection;
pub mod record;
pub mod tree;

pub use codec::{compose_name, parse_name, path_to_url, url_to_path, ParsedName};
pub use collection::{AttrMatch, Upsert, WorkbookCollection};
pub use record::{decode_record, WorkbookRecord, WorkbookType};
pub use tree::{NodeAttrs, NodeId, NodeKind, WorkbookTree};
