use clap::Args;

use common::prelude::EntryError;

#[derive(Args, Debug, Clone)]
pub struct Meta {
    /// Path of the entry to describe
    pub path: String,
}

#[derive(Debug, thiserror::Error)]
pub enum MetaError {
    #[error(transparent)]
    Entry(#[from] EntryError),
    #[error("failed to encode metadata: {0}")]
    Json(#[from] serde_json::Error),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Meta {
    type Error = MetaError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let meta = ctx.namespace()?.metadata(&self.path).await?;
        Ok(serde_json::to_string_pretty(meta.as_ref())?)
    }
}
