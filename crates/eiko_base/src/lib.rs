//! # eiko-base
//!
//! Structural atoms shared by every Eikobot crate: byte-offset [`Span`]s,
//! identifier interning ([`Interner`]/[`Symbol`]), the source file registry
//! ([`SourceMap`]/[`FileId`]), and the error taxonomy ([`EikoError`]).
//!
//! Nothing here knows about tokens, types, or resources; the higher crates
//! (`eiko-language`, `eiko-compile`, `eiko-deploy`) build on these atoms.

pub mod error;
pub mod intern;
pub mod source;
pub mod span;

pub use error::{
    DeployError, EikoError, ErrorKind, ImportError, IndexError, PluginError, Result, TypeError,
};
pub use intern::{Interner, Symbol};
pub use source::{FileId, SourceFile, SourceMap};
pub use span::Span;
