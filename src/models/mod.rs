pub mod attendee;
pub mod email;
pub mod health;
pub mod message;
pub mod notification;
pub mod response;
pub mod status;
pub mod validation;
