use std::{ cmp, fmt, error, io };

/// Represents possible errors returned from lobio
#[derive(Debug)]
pub enum Error {
    /// A position, length, offset or name argument is out of its valid range.
    InvalidArgument(String),
    /// Mutation was attempted on a read-only LOB.
    NotWritable,
    /// Append was attempted somewhere other than the current end of the LOB.
    PositionInvalid { pos: u64, expected: u64 },
    /// The LOB channel failed to complete a request.
    Communication(String),
    /// The channel did not deliver what the LOB's recorded size promised.
    InternalInvariant(String),
    /// The operation is not implemented by this layer.
    Unsupported(&'static str),
    /// The LOB was freed.
    Freed,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::InvalidArgument(msg)   => write!(f, "invalid argument: {}", msg),
            Error::NotWritable            => write!(f, "LOB is read-only"),
            Error::PositionInvalid { pos, expected } => write!(f, "cannot write at position {}, LOB can only be appended at {}", pos, expected),
            Error::Communication(msg)     => write!(f, "communication error: {}", msg),
            Error::InternalInvariant(msg) => write!(f, "internal error: {}", msg),
            Error::Unsupported(op)        => write!(f, "{} is not supported", op),
            Error::Freed                  => write!(f, "LOB has been freed"),
        }
    }
}

impl error::Error for Error {}

impl cmp::PartialEq for Error {
    fn eq(&self, other: &Error) -> bool {
        match (self, other) {
            (Error::InvalidArgument(_),   Error::InvalidArgument(_))   => true,
            (Error::NotWritable,          Error::NotWritable)          => true,
            (Error::PositionInvalid {..}, Error::PositionInvalid {..}) => true,
            (Error::Communication(_),     Error::Communication(_))     => true,
            (Error::InternalInvariant(_), Error::InternalInvariant(_)) => true,
            (Error::Unsupported(this_op), Error::Unsupported(other_op)) => this_op == other_op,
            (Error::Freed,                Error::Freed)                => true,
            _ => false,
        }
    }
}

impl From<Error> for io::Error {
    fn from(err: Error) -> Self {
        let kind = match err {
            Error::InvalidArgument(_) => io::ErrorKind::InvalidInput,
            Error::NotWritable        => io::ErrorKind::PermissionDenied,
            _ => io::ErrorKind::Other,
        };
        io::Error::new(kind, err)
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Communication(err.to_string())
    }
}

impl Error {
    pub(crate) fn invalid_arg(msg: &str) -> Self {
        Error::InvalidArgument( msg.to_owned() )
    }

    pub(crate) fn invariant(msg: String) -> Self {
        Error::InternalInvariant(msg)
    }

    /// Recovers the crate error from an error returned by one of the stream adapters.
    pub fn from_io(err: &io::Error) -> Option<&Error> {
        err.get_ref().and_then(|inner| inner.downcast_ref::<Error>())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compares_by_kind() {
        assert_eq!(Error::PositionInvalid { pos: 1, expected: 6 }, Error::PositionInvalid { pos: 9, expected: 2 });
        assert_eq!(Error::Communication("a".into()), Error::Communication("b".into()));
        assert_ne!(Error::Unsupported("truncate"), Error::Unsupported("position"));
        assert_ne!(Error::Freed, Error::NotWritable);
    }

    #[test]
    fn survives_io_round_trip() {
        let err: io::Error = Error::NotWritable.into();
        assert_eq!(err.kind(), io::ErrorKind::PermissionDenied);
        assert_eq!(Error::from_io(&err), Some(&Error::NotWritable));
    }
}
