//! Formula matching and LipidMaps annotation.
//!
//! These steps prepare the sorter's input: compound names from an instrument
//! export are matched to molecular formulas ([`match_formulas`]), and each
//! formula is classified by the LipidMaps REST API ([`LipidMapsClient`]).

mod client;
mod formula;

pub use client::{Annotation, LipidMapsClient, LipidRecord, strip_brackets};
pub use formula::{FormulaMatches, match_formulas, match_formulas_from_reader};
