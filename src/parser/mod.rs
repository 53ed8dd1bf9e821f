//! Rule-based understanding of user text, used when the external classifier
//! is unavailable. Everything here is pure and synchronous.

pub mod cancel;
pub mod intent;
pub mod reminder;

pub use cancel::{parse_cancel_target, CancelTarget};
pub use intent::{classify_intent, Intent};
pub use reminder::{parse_reminder, ReminderParse, ReminderRequest};
