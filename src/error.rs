//! Error aggregation.
//!
//! A conversion can fail in more than one place at once: the sink may reject a
//! batch and then closing the source may fail as well. Neither failure is
//! allowed to hide the other, so they are collected into a [`JoinedError`].
//!
//! - [`join`] merges any number of `Result<()>` values into one.
//! - [`find`] / [`is`] look for a concrete error type anywhere inside an
//!   `anyhow::Error`, walking context chains and nested joins.

use anyhow::Result;
use std::error::Error as StdError;
use std::fmt;
use std::io;

/// Failures raised by the batch reader itself (as opposed to Parquet/Arrow
/// errors it forwards).
#[derive(Debug, thiserror::Error)]
pub enum ReadError {
    /// The configured batch size cannot drive a decoder.
    #[error("invalid batch size {0}: must be greater than zero")]
    InvalidBatchSize(i64),

    /// The source was read after the reader closed it.
    #[error("source is closed")]
    SourceClosed,
}

/// Several independent errors reported as one.
///
/// Displays each cause on its own line. Individual causes stay inspectable
/// through [`JoinedError::errors`] and [`find`].
#[derive(Debug)]
pub struct JoinedError {
    errors: Vec<anyhow::Error>,
}

impl JoinedError {
    /// The joined causes, in the order they were produced.
    #[must_use]
    pub fn errors(&self) -> &[anyhow::Error] {
        &self.errors
    }

    /// Number of joined causes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Always `false` for errors built by [`join`].
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }
}

impl fmt::Display for JoinedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, err) in self.errors.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            if f.alternate() {
                write!(f, "{err:#}")?;
            } else {
                write!(f, "{err}")?;
            }
        }
        Ok(())
    }
}

impl StdError for JoinedError {}

/// Merge results, keeping every error.
///
/// Returns `Ok(())` when all results are ok, the single error unchanged when
/// exactly one failed, and a [`JoinedError`] otherwise.
///
/// # Errors
/// Returns an error if any of the inputs is an error.
pub fn join<I>(results: I) -> Result<()>
where
    I: IntoIterator<Item = Result<()>>,
{
    let mut errors: Vec<anyhow::Error> = results.into_iter().filter_map(Result::err).collect();
    match errors.len() {
        0 => Ok(()),
        1 => Err(errors.remove(0)),
        _ => Err(anyhow::Error::new(JoinedError { errors })),
    }
}

/// Attach the outcome of a cleanup step to an error that already happened.
#[must_use]
pub fn join_error(err: anyhow::Error, cleanup: Result<()>) -> anyhow::Error {
    match cleanup {
        Ok(()) => err,
        Err(other) => anyhow::Error::new(JoinedError {
            errors: vec![err, other],
        }),
    }
}

/// Find the first error of type `E` inside `err`.
///
/// Looks at every link of the context chain, inside custom `io::Error`s, and
/// descends into [`JoinedError`]s, depth first.
#[must_use]
pub fn find<E>(err: &anyhow::Error) -> Option<&E>
where
    E: StdError + Send + Sync + 'static,
{
    if let Some(hit) = err.downcast_ref::<E>() {
        return Some(hit);
    }
    err.chain().find_map(find_in::<E>)
}

/// Whether `err` contains an error of type `E` anywhere.
#[must_use]
pub fn is<E>(err: &anyhow::Error) -> bool
where
    E: StdError + Send + Sync + 'static,
{
    find::<E>(err).is_some()
}

fn find_in<'a, E>(cause: &'a (dyn StdError + 'static)) -> Option<&'a E>
where
    E: StdError + Send + Sync + 'static,
{
    if let Some(hit) = cause.downcast_ref::<E>() {
        return Some(hit);
    }
    // `io::Error::source` skips the wrapped error, so look inside explicitly.
    if let Some(inner) = cause.downcast_ref::<io::Error>().and_then(io::Error::get_ref) {
        return find_in::<E>(inner);
    }
    cause
        .downcast_ref::<JoinedError>()
        .and_then(|joined| joined.errors.iter().find_map(find::<E>))
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Context, anyhow};

    #[derive(Debug, thiserror::Error)]
    #[error("sentinel")]
    struct Sentinel;

    #[test]
    fn join_of_oks_is_ok() {
        assert!(join([Ok(()), Ok(())]).is_ok());
        assert!(join(std::iter::empty()).is_ok());
    }

    #[test]
    fn join_keeps_single_error_unwrapped() {
        let err = join([Ok(()), Err(Sentinel.into())]).unwrap_err();
        assert!(err.downcast_ref::<JoinedError>().is_none());
        assert!(err.downcast_ref::<Sentinel>().is_some());
    }

    #[test]
    fn join_keeps_every_cause() {
        let err = join([Err(anyhow!("first")), Err(Sentinel.into())]).unwrap_err();
        let joined = err.downcast_ref::<JoinedError>().expect("joined");
        assert_eq!(joined.len(), 2);
        assert_eq!(err.to_string(), "first\nsentinel");
        assert!(is::<Sentinel>(&err));
    }

    #[test]
    fn find_walks_context_and_nested_joins() {
        let inner = join([Err(anyhow!("a")), Err(anyhow::Error::new(Sentinel).context("wrapped"))])
            .unwrap_err();
        let outer = join([Err(inner), Err(anyhow!("b"))])
            .context("convert")
            .unwrap_err();
        assert!(is::<Sentinel>(&outer));
        assert!(!is::<ReadError>(&outer));
    }
}
