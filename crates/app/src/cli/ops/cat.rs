use clap::Args;

use common::prelude::EntryError;

#[derive(Args, Debug, Clone)]
pub struct Cat {
    /// Path of the entry to read, e.g. /volumes/data/a.txt
    pub path: String,
}

#[derive(Debug, thiserror::Error)]
pub enum CatError {
    #[error(transparent)]
    Entry(#[from] EntryError),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Cat {
    type Error = CatError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let data = ctx.namespace()?.read_all(&self.path).await?;
        let text = String::from_utf8_lossy(&data);
        // println adds the final newline back
        Ok(text.strip_suffix('\n').unwrap_or(&text).to_string())
    }
}
