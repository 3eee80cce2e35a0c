pub mod arena;
pub mod builder;
pub mod fragment;
pub mod namespaces;
pub mod node;
pub mod parser;
pub mod xname;

pub use arena::XmlDocument;
pub use fragment::XmlFragment;
pub use namespaces::{A, CP, DC, DCTERMS, M, MC, R, V, W, W14, WP};
pub use node::XmlNodeData;
pub use xname::{XAttribute, XName};
