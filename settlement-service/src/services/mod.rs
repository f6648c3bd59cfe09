pub mod cascade;
pub mod commission;
pub mod database;
pub mod gateway;
pub mod graph;
pub mod metrics;
pub mod settlement;
pub mod store;

pub use cascade::{CascadeOutcome, PriceCascade};
pub use commission::ChainWalker;
pub use database::Database;
pub use gateway::PixGatewayClient;
pub use graph::{ReferralGraph, ReferralTreeNode};
pub use metrics::{get_metrics, init_metrics};
pub use settlement::{PaymentEvent, SettlementEngine, SettlementOutcome};
pub use store::{BalanceLedger, NotificationSink, PricingStore, ReferralStore, SettlementStore};
