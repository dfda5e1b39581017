//! Record types shared between the server and the storage backends.

mod address;
mod devices;
mod failures;
mod ids;
mod keycards;
mod orgkeys;
mod prereg;
mod workspaces;

pub use address::{classify_address, Address, AddressKind};
pub use devices::{Device, DeviceStatus};
pub use failures::{FailureKind, FailureRecord};
pub use ids::{DeviceId, Domain, Uid, Wid};
pub use keycards::{KeycardEntry, ORG_OWNER};
pub use orgkeys::{OrgKeyPair, OrgKeyPurpose};
pub use prereg::{Prereg, RegId};
pub use workspaces::{Workspace, WorkspaceParams, WorkspaceStatus, WorkspaceType};
