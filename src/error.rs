use std::fmt;
use std::io;

use thiserror::Error;

use crate::GreenletId;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Everything that can come out of a switch.
///
/// `Raised` and `GreenletExit` are "exceptions": they travel through the
/// transfer channel and surface at a greenlet's suspension point. The other
/// variants are reported to the caller of the failed operation and leave the
/// tree untouched.
#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    Usage(String),

    #[error("greenlet {0} is dead and has no live ancestor to switch to")]
    DeadGreenlet(GreenletId),

    #[error("cyclic parent chain: greenlet {parent} descends from greenlet {child}")]
    Cycle { child: GreenletId, parent: GreenletId },

    #[error("greenlet {0} belongs to a different thread")]
    ForeignThread(GreenletId),

    #[error("could not allocate a {size}-byte stack")]
    ResourceExhausted {
        size: usize,
        #[source]
        source: io::Error,
    },

    #[error("greenlet exited")]
    GreenletExit,

    #[error(transparent)]
    Raised(Box<dyn std::error::Error + Send + Sync + 'static>),
}

impl Error {
    /// Wraps an arbitrary error so it can be thrown into a greenlet.
    pub fn raise<E>(err: E) -> Error
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Error::Raised(Box::new(err))
    }

    /// Shorthand for raising a plain message.
    pub fn msg<M: fmt::Display>(msg: M) -> Error {
        Error::Raised(Box::new(Message(msg.to_string())))
    }

    pub(crate) fn usage<M: Into<String>>(msg: M) -> Error {
        Error::Usage(msg.into())
    }

    pub fn is_greenlet_exit(&self) -> bool {
        matches!(self, Error::GreenletExit)
    }

    /// Borrows the raised error as `E`, if that is what was raised.
    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: std::error::Error + 'static,
    {
        match self {
            Error::Raised(inner) => inner.downcast_ref::<E>(),
            _ => None,
        }
    }
}

/// The error type behind [`Error::msg`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message(pub String);

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for Message {}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Error, PartialEq)]
    #[error("bad input: {0}")]
    struct BadInput(u32);

    #[test]
    fn raised_errors_keep_type_and_message() {
        let err = Error::raise(BadInput(7));
        assert_eq!(err.to_string(), "bad input: 7");
        assert_eq!(err.downcast_ref::<BadInput>(), Some(&BadInput(7)));
        assert!(err.downcast_ref::<Message>().is_none());
    }

    #[test]
    fn msg_is_a_message() {
        let err = Error::msg("boom");
        assert_eq!(err.downcast_ref::<Message>().map(|m| m.0.as_str()), Some("boom"));
        assert!(!err.is_greenlet_exit());
        assert!(Error::GreenletExit.is_greenlet_exit());
    }
}
