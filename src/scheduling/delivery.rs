use async_trait::async_trait;

use crate::storage::UserId;

/// Transport seam for scheduled tip delivery. The scheduler only knows how
/// to hand a tip to a user, not what the gateway looks like.
#[async_trait]
pub trait TipDeliveryChannel: Send + Sync + 'static {
    async fn send_tip(&self, user_id: UserId, text: &str) -> anyhow::Result<()>;
}
