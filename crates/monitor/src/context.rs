//! Caller-supplied cancellation and deadline for provider calls.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use deadcheck_provider::ProviderError;

/// Bounds every provider call made for one orchestration step.
///
/// The deadline is fixed when the context is created and shared by all calls
/// made under it. Nothing is rolled back when a call is cut short.
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    cancel: CancellationToken,
    deadline: Option<(Instant, Duration)>,
}

/// Why a call under a [`CallContext`] did not produce a value.
#[derive(Debug)]
pub(crate) enum CallError {
    Cancelled,
    Provider(ProviderError),
}

impl CallContext {
    /// No deadline, never cancelled unless the token is.
    pub fn background() -> Self {
        Self::default()
    }

    /// Bound the whole step to `timeout` from now.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Some((Instant::now() + timeout, timeout));
        self
    }

    /// Abort calls when `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Drive `call` unless the context is cancelled or past its deadline first.
    pub(crate) async fn run<T, F>(&self, call: F) -> Result<T, CallError>
    where
        F: Future<Output = Result<T, ProviderError>>,
    {
        let bounded = async {
            match self.deadline {
                Some((deadline, timeout)) => match tokio::time::timeout_at(deadline, call).await {
                    Ok(result) => result,
                    Err(_) => Err(ProviderError::Timeout(timeout)),
                },
                None => call.await,
            }
        };

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(CallError::Cancelled),
            result = bounded => result.map_err(CallError::Provider),
        }
    }
}
