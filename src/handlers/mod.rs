pub mod account;
pub mod calls;
pub mod checkout;
pub mod public;
pub mod webhooks;
