//! An embeddable expression and aggregation engine for dashboard formulas.
//!
//! A formula such as `round(sum(${bytes}) / count(), 2)` is parsed once into
//! an [`Expression`]. Each group of rows gets its own [`Generator`] tree,
//! which accumulates rows, merges with partial results from other
//! partitions and serializes its state for transport.

pub mod ast;
pub mod cache;
pub mod compare;
pub mod config;
pub mod error;
pub mod functions;
pub mod generator;
pub mod lexer;
pub mod output;
pub mod parser;
pub mod value;

#[cfg(feature = "cli")]
pub mod cli;

pub use ast::{Expression, FieldIndex, Function, NodeId, Param, Token, TokenType};
pub use cache::Caches;
pub use config::EngineConfig;
pub use error::{ArityError, GeneratorError, ParseError};
pub use generator::{ChildData, ChildGenerators, Generator, GroupKey};
pub use lexer::{Lexer, tokenize};
pub use parser::Parser;
pub use value::{Type, Val};
