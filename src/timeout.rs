//! Deadline for the connect + TLS phase of a dial, on futures_timer so it runs on any executor.

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use futures_timer::Delay;
use futures_util::ready;
use pin_project_lite::pin_project;

/// Run `future` for at most `dur`. Elapsing is an `io::ErrorKind::TimedOut` error.
pub(crate) fn timeout<F: Future>(dur: Duration, future: F) -> Timeout<F> {
    Timeout {
        future,
        delay: Delay::new(dur),
        dur,
    }
}

pin_project! {
    pub(crate) struct Timeout<F> {
        #[pin]
        future: F,
        #[pin]
        delay: Delay,
        dur: Duration,
    }
}

impl<F: Future> Future for Timeout<F> {
    type Output = io::Result<F::Output>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();
        if let Poll::Ready(v) = this.future.poll(cx) {
            return Poll::Ready(Ok(v));
        }
        ready!(this.delay.poll(cx));
        Poll::Ready(Err(io::Error::new(
            io::ErrorKind::TimedOut,
            format!("connection not established within {:?}", this.dur),
        )))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_timeout_elapses() {
        smol::block_on(async {
            let err = timeout(Duration::from_millis(10), futures_util::future::pending::<()>())
                .await
                .unwrap_err();
            assert_eq!(err.kind(), io::ErrorKind::TimedOut);
            assert_eq!(err.to_string(), "connection not established within 10ms");
        });
    }

    #[test]
    fn test_timeout_passes_value_through() {
        smol::block_on(async {
            let res = timeout(Duration::from_secs(5), async { 7 }).await;
            assert_eq!(res.unwrap(), 7);
        });
    }
}
