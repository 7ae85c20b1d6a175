mod call;
mod influencer;
mod minute_pack;
mod payment_session;
mod phone_verification;
mod profile;
mod transaction;

pub use call::*;
pub use influencer::*;
pub use minute_pack::*;
pub use payment_session::*;
pub use phone_verification::*;
pub use profile::*;
pub use transaction::*;
