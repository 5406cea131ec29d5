#![cfg_attr(all(not(feature = "std"), not(test)), no_std)]

extern crate alloc;

// Re-export for convenience so other modules don't need alloc:: prefix
#[allow(unused_imports)]
pub(crate) use alloc::{boxed::Box, format, string::String, string::ToString, vec, vec::Vec};

pub mod check;
pub mod def;
pub mod rewrite;
pub mod world;

pub use def::{Def, DefFlags, DefRef, Node, Normalizer};
pub use rewrite::pass::{BetaRed, EtaRed, Pass, Pipeline};
pub use rewrite::{Rewriter, Substituter};
pub use world::{Error, Result, World};
