//! # regram
//!
//! A grammar-description compiler and structural parser.
//!
//! Grammars are written in a small line-oriented DSL, compiled into flat regular
//! expressions, and re-applied to input text to recover a concrete parse tree.
//! See [`regram::dsl`] for the grammar format and [`regram::tree`] for how trees
//! are reconstructed.

pub mod regram;
