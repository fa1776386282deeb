use std::sync::Arc;

use crate::app::Context;
use crate::router::Params;

/// What a handler reports back to the dispatch loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The request is answered; stop trying further routes
    Handled,
    /// Not this route's request; try the next matching route
    Pass,
}

impl Outcome {
    #[must_use]
    pub fn is_handled(self) -> bool {
        self == Outcome::Handled
    }
}

/// Conversion from a handler's return value into an [`Outcome`].
///
/// `()` and [`Outcome::Handled`] mean handled, `false` means pass, and a
/// `Result` contributes its error to the dispatch loop.
pub trait IntoOutcome {
    fn into_outcome(self) -> anyhow::Result<Outcome>;
}

impl IntoOutcome for Outcome {
    fn into_outcome(self) -> anyhow::Result<Outcome> {
        Ok(self)
    }
}

impl IntoOutcome for () {
    fn into_outcome(self) -> anyhow::Result<Outcome> {
        Ok(Outcome::Handled)
    }
}

impl IntoOutcome for bool {
    fn into_outcome(self) -> anyhow::Result<Outcome> {
        Ok(if self { Outcome::Handled } else { Outcome::Pass })
    }
}

impl<T, E> IntoOutcome for Result<T, E>
where
    T: IntoOutcome,
    E: Into<anyhow::Error>,
{
    fn into_outcome(self) -> anyhow::Result<Outcome> {
        self.map_err(Into::into)?.into_outcome()
    }
}

/// A route handler.
///
/// Handlers bind parameters by name through [`Params`] and write their output
/// into the [`Context`]. Any `Fn(&Params, &mut Context) -> impl IntoOutcome`
/// closure is a handler.
pub trait Handler: Send + Sync {
    fn call(&self, params: &Params, ctx: &mut Context<'_>) -> anyhow::Result<Outcome>;
}

impl<F, R> Handler for F
where
    F: Fn(&Params, &mut Context<'_>) -> R + Send + Sync,
    R: IntoOutcome,
{
    fn call(&self, params: &Params, ctx: &mut Context<'_>) -> anyhow::Result<Outcome> {
        self(params, ctx).into_outcome()
    }
}

/// Box a closure as a shared handler, letting the compiler infer its argument
/// types.
pub fn handler_fn<F, R>(f: F) -> Arc<dyn Handler>
where
    F: Fn(&Params, &mut Context<'_>) -> R + Send + Sync + 'static,
    R: IntoOutcome,
{
    Arc::new(f)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_conversions() {
        assert_eq!(().into_outcome().unwrap(), Outcome::Handled);
        assert_eq!(true.into_outcome().unwrap(), Outcome::Handled);
        assert_eq!(false.into_outcome().unwrap(), Outcome::Pass);
        assert_eq!(Outcome::Pass.into_outcome().unwrap(), Outcome::Pass);

        let ok: anyhow::Result<bool> = Ok(false);
        assert_eq!(ok.into_outcome().unwrap(), Outcome::Pass);

        let err: Result<(), std::fmt::Error> = Err(std::fmt::Error);
        assert!(err.into_outcome().is_err());
    }
}
