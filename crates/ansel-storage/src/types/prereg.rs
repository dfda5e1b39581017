//! Pre-registration types.

use crate::types::ids::{Domain, Uid, Wid};

/// A pending account: redeemed exactly once by its registration code.
///
/// The code is stored in the clear. A server compromise already defeats the
/// confidentiality of accounts that do not exist yet.
#[derive(Clone, Debug)]
pub struct Prereg {
    pub wid: Wid,
    pub uid: Option<Uid>,
    pub domain: Domain,
    pub regcode: String,
}

/// Which identifier a registration code is redeemed against.
#[derive(Clone, Debug)]
pub enum RegId {
    Wid(Wid),
    Uid(Uid),
}
