pub(crate) use crate::errors::Error;

pub(crate) type Result<T, E = Error> = std::result::Result<T, E>;
