//! Helpers for errors that are logged and then dropped.
use std::error::Error;
use std::fmt::Write;

/// Renders `err` followed by each of its sources, e.g. `a: b: c`.
pub fn chain(err: &dyn Error) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(err) = source {
        let _ = write!(out, ": {err}");
        source = err.source();
    }
    out
}

pub trait ResultOkLogExt<T, E> {
    /// Logs the error with its sources, prefixed by `what`, and discards it.
    fn ok_log(self, what: &str) -> Option<T>;
}

impl<T, E> ResultOkLogExt<T, E> for std::result::Result<T, E>
where
    E: Error,
{
    fn ok_log(self, what: &str) -> Option<T> {
        match self {
            Ok(ok) => Some(ok),
            Err(err) => {
                log::error!("{what}: {}", chain(&err));
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("outer")]
    struct Outer(#[source] std::io::Error);

    #[test]
    fn test_chain_includes_sources() {
        let err = Outer(std::io::Error::other("inner"));
        assert_eq!(chain(&err), "outer: inner");
    }

    #[test]
    fn test_ok_log() {
        let ok: Result<u8, std::io::Error> = Ok(1);
        assert_eq!(ok.ok_log("reading"), Some(1));
        let err: Result<u8, std::io::Error> = Err(std::io::Error::other("boom"));
        assert_eq!(err.ok_log("reading"), None);
    }
}
