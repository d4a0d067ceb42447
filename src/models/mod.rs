pub mod actor;
pub mod booking;
pub mod event;
pub mod history;
pub mod location;
pub mod refund;

pub use actor::{Actor, ActorRole};
pub use booking::{Booking, BookingStatus};
pub use event::{BookingEvent, BookingEventKind};
pub use history::HistoryEntry;
pub use location::{Addon, Location, PriceUnit};
pub use refund::RefundRecord;
