pub mod cup_profile;
pub mod daily_goal;
pub mod sip_event;
pub mod user_settings;

pub use cup_profile::CupProfile;
pub use daily_goal::DailyGoal;
pub use sip_event::{EventSource, SipEvent};
pub use user_settings::UserSettings;
