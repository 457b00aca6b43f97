pub mod draft_store;
pub mod invitation_loader;

pub use draft_store::LocalDraftStore;
pub use invitation_loader::InvitationDataLoader;
