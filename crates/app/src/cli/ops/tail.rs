use clap::Args;
use futures::StreamExt;
use tokio::io::AsyncWriteExt;

use common::prelude::EntryError;

#[derive(Args, Debug, Clone)]
pub struct Tail {
    /// Path of the entry to follow
    pub path: String,
}

#[derive(Debug, thiserror::Error)]
pub enum TailError {
    #[error(transparent)]
    Entry(#[from] EntryError),
    #[error("failed to write output: {0}")]
    Io(#[from] std::io::Error),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Tail {
    type Error = TailError;
    type Output = String;

    /// Follow until the stream ends or the user interrupts
    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let mut stream = ctx.namespace()?.stream(&self.path).await?;
        let mut stdout = tokio::io::stdout();
        let interrupted = tokio::signal::ctrl_c();
        tokio::pin!(interrupted);

        let result = loop {
            tokio::select! {
                chunk = stream.next() => match chunk {
                    Some(Ok(chunk)) => {
                        if let Err(err) = write_chunk(&mut stdout, &chunk).await {
                            break Err(TailError::Io(err));
                        }
                    }
                    Some(Err(err)) => break Err(TailError::Entry(err)),
                    None => break Ok(()),
                },
                _ = &mut interrupted => {
                    tracing::debug!(path = %self.path, "interrupted");
                    break Ok(());
                }
            }
        };

        stream.close().await;
        result.map(|_| String::new())
    }
}

async fn write_chunk(stdout: &mut tokio::io::Stdout, chunk: &[u8]) -> std::io::Result<()> {
    stdout.write_all(chunk).await?;
    stdout.flush().await
}
