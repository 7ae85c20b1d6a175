mod stripe;

pub use stripe::{
    StripeCheckoutSession, StripeClient, StripeMetadata, StripeWebhookEvent,
};
