use {
    crate::*,
    std::{
        path::PathBuf,
        sync::{Mutex, PoisonError},
    },
    tokio::sync::oneshot,
};

pub type CompletionResult = Result<PathBuf, PipelineError>;

/// Resolving side of a `Completion`. Only the first `resolve` has any effect.
pub(crate) struct CompletionSender {
    sender: Mutex<Option<oneshot::Sender<CompletionResult>>>,
}

impl CompletionSender {
    /// Returns `false` if the signal was already resolved.
    pub(crate) fn resolve(&self, result: CompletionResult) -> bool {
        let sender = self
            .sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match sender {
            Some(sender) => {
                // the receiver may be gone, which is fine
                let _ = sender.send(result);
                true
            }
            None => false,
        }
    }

    pub(crate) fn is_resolved(&self) -> bool {
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }
}

/// Resolves once with the output path or the error that ended the session.
pub struct Completion {
    receiver: oneshot::Receiver<CompletionResult>,
}

pub(crate) fn completion_channel() -> (CompletionSender, Completion) {
    let (sender, receiver) = oneshot::channel();
    (
        CompletionSender {
            sender: Mutex::new(Some(sender)),
        },
        Completion { receiver },
    )
}

fn abandoned() -> PipelineError {
    PipelineError::EncodingFailure("encoder dropped before completing".to_string())
}

impl Completion {
    pub async fn wait(self) -> CompletionResult {
        self.receiver.await.unwrap_or_else(|_| Err(abandoned()))
    }

    /// Blocking variant of `wait`. Must not be called from async code.
    pub fn blocking_wait(self) -> CompletionResult {
        self.receiver.blocking_recv().unwrap_or_else(|_| Err(abandoned()))
    }

    /// The result, if the session already ended.
    pub fn try_result(&mut self) -> Option<CompletionResult> {
        match self.receiver.try_recv() {
            Ok(result) => Some(result),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => Some(Err(abandoned())),
        }
    }
}
