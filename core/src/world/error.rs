//! Construction errors.
//!
//! These are user errors detected synchronously inside the [`World`] facade:
//! the offending construction is aborted (nothing is inserted into the
//! uniquing table) but the world itself stays valid. Internal contract
//! violations are not represented here; those panic.
//!
//! [`World`]: crate::world::World

use thiserror::Error;

use crate::String;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    #[error("expression `{callee}` of type `{ty}` is not callable")]
    NotCallable { callee: String, ty: String, gid: u32 },

    #[error("cannot pass `{arg}` of type `{arg_ty}` to `{callee}` of domain `{dom}`")]
    NotAssignable {
        arg: String,
        arg_ty: String,
        callee: String,
        dom: String,
        gid: u32,
    },

    #[error("cannot assign tuple `{tuple}` to incompatible type `{ty}`")]
    BadTuple { tuple: String, ty: String, gid: u32 },

    #[error("index `{index}` does not fit within arity `{arity}`")]
    BadIndex { index: String, arity: String, gid: u32 },

    #[error("literal {value} does not fit within `Idx {size}`")]
    OutOfRange { value: u64, size: String, gid: u32 },

    #[error("cannot create literal {value}: size of `{size}` is unknown")]
    UnknownSize { value: u64, size: String, gid: u32 },

    #[error("expected a shape but got `{shape}` of type `{ty}`")]
    BadShape { shape: String, ty: String, gid: u32 },

    #[error("level `{level}` of a type must be of type `□`")]
    BadLevel { level: String, gid: u32 },

    #[error("size `{size}` of an `Idx` must be of type `nat`")]
    BadSize { size: String, gid: u32 },

    #[error("a join needs at least one alternative")]
    EmptyJoin,

    #[error("value of type `{ty}` is not an alternative of join `{join}`")]
    NotAnAlternative { ty: String, join: String, gid: u32 },
}
