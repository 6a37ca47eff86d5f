//! # Path Query Language - Abstract Syntax Tree
//!
//! This module defines the tokens and syntax tree for the path query
//! language, a JSONPath-inspired dialect for selecting, filtering and
//! slicing values out of JSON-like documents.
//!
//! ## Architecture Overview
//!
//! - **[tokens]** - Lexical tokens produced by the lexer
//! - **[expressions]** - Expression nodes (names, literals, access, operations, calls)
//! - **[operators]** - Binary operators (comparison, arithmetic, logical)
//!
//! ## Quick Start
//!
//! ```text
//! root.list['id' == 2].name
//! ```
//!
//! This path selects the `name` of every element of `root.list` whose `id` is 2.
//!
//! ## Core Concepts
//!
//! ### Root Resolution
//!
//! The first bare name evaluated is looked up on the document itself, so
//! `root.child` reads the `root` field and then its `child`. A path may also
//! open with `$`, `*` or `.`, all of which stand for the whole document.
//!
//! ### Bracket Access
//!
//! - **Literal** `[0]`, `[-1]`, `["key"]` → positional or key lookup
//! - **Wildcard** `[*]` → every value of a mapping, or the sequence unchanged
//! - **Slice** `[start:end:step]` → sequence slicing, any part omittable
//! - **Filter** `["price" > 10 && "stock" > 0]` → elements whose predicate holds;
//!   quoted strings name keys of the element being tested
//!
//! ### Precedence
//!
//! From loosest to tightest: `|| &&`, then `== != < > <= >=`, then `+ -`,
//! then `* /`, then postfix access. Every tier is left-associative.
//!
//! ## Examples
//!
//! ```text
//! root.number_list[::-1]
//! root.users[("age" >= 18 && "active" == true) || "role" == "admin"].name
//! root.items[@limits.max_index()]
//! $threshold
//! ```
pub mod expressions;
pub mod operators;
pub mod tokens;

pub use expressions::{Expr, ExprKind};
pub use operators::BinOp;
pub use tokens::{Token, TokenKind};
