mod delivery;
mod tip_scheduler;

pub use delivery::TipDeliveryChannel;
pub use tip_scheduler::{DailyTipScheduler, TipScheduler};
