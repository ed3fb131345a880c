use std::future::Future;

use tokio_util::sync::CancellationToken;

use crate::error::AdalError;

/// Per-call context carrying the caller's cancellation token.
///
/// Every database await inside a repository goes through [`Context::run`], so a cancelled
/// token stops the operation at its next suspension point. Transactions abandoned this way
/// are rolled back by the repository before `AdalError::Cancelled` is returned.
#[derive(Debug, Clone, Default)]
pub struct Context {
    cancel: CancellationToken,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(cancel: CancellationToken) -> Self {
        Self { cancel }
    }

    pub fn token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Child context cancelled together with this one
    pub fn child(&self) -> Self {
        Self {
            cancel: self.cancel.child_token(),
        }
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Race `fut` against cancellation
    pub async fn run<F, T>(&self, fut: F) -> Result<T, AdalError>
    where
        F: Future<Output = Result<T, AdalError>>,
    {
        if self.cancel.is_cancelled() {
            return Err(AdalError::Cancelled);
        }
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(AdalError::Cancelled),
            result = fut => result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::time::Duration;

    #[tokio::test]
    async fn run_returns_future_output() {
        let ctx = Context::new();
        let out = ctx.run(async { Ok::<_, AdalError>(7) }).await.unwrap();
        assert_eq!(out, 7);
    }

    #[tokio::test]
    async fn cancelled_before_start() {
        let ctx = Context::new();
        ctx.cancel();
        let err = ctx.run(async { Ok::<_, AdalError>(()) }).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Cancelled);
    }

    #[tokio::test]
    async fn cancelled_while_pending() {
        let ctx = Context::new();
        let canceller = ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            canceller.cancel();
        });
        let err = ctx
            .run(async {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok::<_, AdalError>(())
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Cancelled);
    }

    #[test]
    fn child_follows_parent() {
        let ctx = Context::new();
        let child = ctx.child();
        ctx.cancel();
        assert!(child.is_cancelled());
    }
}
