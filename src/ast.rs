//! # Expression Syntax Tree
//!
//! Formulas are small expressions evaluated once per row and, when they
//! contain aggregate functions, accumulated across the rows of a group.
//!
//! ## Architecture Overview
//!
//! - **[tokens]** - Lexical tokens produced by the lexer
//! - **[operators]** - Operator reduction order
//! - **[expressions]** - The bound tree: [`Param`], [`Function`], [`Expression`]
//!
//! ## Quick Start
//!
//! ```text
//! round(sum(${bytes}) / count(), 2)
//! ```
//!
//! Averages the `bytes` field over the group, rounded to two places.
//!
//! ## Core Concepts
//!
//! ### Literals
//!
//! Strings are single-quoted with doubled quotes as the escape
//! (`'it''s'`); numbers are plain decimals. There are no boolean or null
//! literals: use `true()`, `false()` and `null()`.
//!
//! ### Field References
//!
//! `${name}` reads a column of the current row. Names are resolved to row
//! positions through a [`FieldIndex`] shared by every expression of a query.
//!
//! ### Operators
//!
//! `^`, then `/ * %`, then `+ -`, then the comparisons `= != > >= < <=`.
//! Every operator is shorthand for a function (`+` is `add`), so
//! `add(1, 2)` and `1+2` are the same call.

pub mod expressions;
pub mod operators;
pub mod tokens;

pub use expressions::{Expression, FieldIndex, Function, NodeId, Param};
pub use tokens::{Token, TokenType};
