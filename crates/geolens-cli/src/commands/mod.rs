use async_trait::async_trait;
use eyre::Result;

pub mod ask;
pub mod models;
pub mod session;

#[async_trait]
pub trait Command {
    async fn execute(&self) -> Result<()>;
}
