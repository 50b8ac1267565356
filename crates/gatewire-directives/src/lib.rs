//! Channel-agnostic parser for slash directives embedded in an inbound
//! message body (`/think high`, `/stop`, `/model:opus`, …).

pub mod parser;

pub use parser::{parse_directives, Directive, DirectiveKey};
