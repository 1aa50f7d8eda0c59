//! Generic XML tree parsing, mutation, and writing primitives for firewall
//! appliance configuration documents.
//!
//! The appliance config is one large XML document; callers patch a small,
//! addressable region of it and write the whole tree back. Everything the
//! caller never touched must survive the round trip byte-for-byte at the
//! structural level (tags, attributes, text, child ordering).

pub mod parser;
pub mod tree;
pub mod writer;

pub use parser::{parse, parse_file, ParseError};
pub use tree::XmlNode;
pub use writer::{write, write_file, WriteError};
