mod twilio;

pub use twilio::{TwilioCallStatus, TwilioClient};
