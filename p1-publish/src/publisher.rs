//! Publisher trait

use async_trait::async_trait;
use p1_core::P1Result;
use p1_telegram::TelegramRecord;

/// Receiver of one record per successfully parsed telegram
#[async_trait]
pub trait Publisher: Send {
    /// Publish one record
    ///
    /// Fields absent from the record are not published.
    async fn publish(&mut self, record: &TelegramRecord) -> P1Result<()>;
}

#[async_trait]
impl<P: Publisher + ?Sized> Publisher for Box<P> {
    async fn publish(&mut self, record: &TelegramRecord) -> P1Result<()> {
        (**self).publish(record).await
    }
}
