pub mod bookings;
pub mod events;
pub mod history;
pub mod locations;
pub mod notifications;
pub mod pricing;
pub mod refunds;
pub mod transitions;
