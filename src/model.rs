pub use self::{
    amount::*, asset::*, events::*, inventory::*, reports::*, results::*, stats::*,
};

pub(crate) mod amount;
pub mod asset;
pub mod events;
pub(crate) mod inventory;
pub mod reports;
pub mod results;
mod stats;
