pub mod history;
pub mod notification;

pub use history::DecisionHistoryLog;
pub use notification::NotificationCache;
