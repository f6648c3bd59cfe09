pub mod payments;
pub mod prices;
pub mod referrals;

pub use payments::{gateway_webhook, payment_lookup, payment_qr};
pub use prices::update_resale_price;
pub use referrals::{downline, tree};
