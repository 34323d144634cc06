pub mod customer;
pub mod event;
pub mod health;
pub mod message;
pub mod resend;
pub mod response;
pub mod retry;
pub mod status;
pub mod template;
