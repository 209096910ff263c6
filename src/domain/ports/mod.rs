mod af_notifier;
mod pfd_southbound;
mod southbound_client;

pub use af_notifier::{AfNotifier, NotifyError};
pub use pfd_southbound::PfdSouthbound;
pub use southbound_client::{SouthboundClient, SouthboundCreated, SouthboundError, SouthboundResponse};
