pub mod pfd_transactions;
pub mod subscription_registry;

pub use pfd_transactions::TransactionReservation;
pub use subscription_registry::{RegistryLimits, Reservation, SubscriptionRegistry};
