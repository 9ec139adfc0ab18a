use clap::Args;

use common::prelude::EntryError;

#[derive(Args, Debug, Clone)]
pub struct Rm {
    /// Path of the entry to delete
    pub path: String,
}

#[derive(Debug, thiserror::Error)]
pub enum RmError {
    #[error(transparent)]
    Entry(#[from] EntryError),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Rm {
    type Error = RmError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let deleted = ctx.namespace()?.delete(&self.path).await?;
        if deleted {
            Ok(format!("deleted {}", self.path))
        } else {
            Ok(format!("deletion of {} is in progress", self.path))
        }
    }
}
