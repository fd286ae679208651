pub mod booking;
pub mod elicitation;
pub mod session;
