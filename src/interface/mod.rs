pub mod clock;
pub mod invitation_service;
pub mod progress_gateway;

pub use clock::{Clock, SystemClock};
pub use invitation_service::InvitationValidationService;
pub use progress_gateway::RemoteProgressGateway;

#[cfg(test)]
pub use invitation_service::MockInvitationValidationService;
#[cfg(test)]
pub use progress_gateway::MockRemoteProgressGateway;
