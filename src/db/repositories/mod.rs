pub mod cup_profiles;
pub mod daily_goals;
pub mod sip_events;
pub mod stats;
pub mod user_settings;

pub use daily_goals::GoalRefresh;
pub use sip_events::SipEventFilter;
