//! Address resolution against the store.

use crate::store::Store;
use crate::types::{Address, WorkspaceType, Wid};
use crate::StoreError;

/// Resolve an address to its canonical WID.
///
/// Workspace addresses are confirmed to exist and follow at most one alias
/// hop; user addresses are looked up by `(uid, domain)`. The alias target is
/// returned as-is, never re-resolved.
pub async fn resolve_address(store: &dyn Store, address: &Address) -> Result<Wid, StoreError> {
    match address {
        Address::Workspace(wid, _) => {
            let workspace = store.get_workspace(wid).await?;
            if workspace.wtype == WorkspaceType::Alias {
                store.get_alias_target(wid).await
            } else {
                Ok(wid.clone())
            }
        }
        Address::User(uid, domain) => store.lookup_uid(uid, domain).await,
    }
}
