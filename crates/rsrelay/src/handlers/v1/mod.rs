//! `/api/v1` handlers.

mod download;
mod resources;
mod search;
mod session;
mod settings;

pub use download::download;
pub use resources::{get_collection, get_partner, get_partner_collections, get_resource, list_partners, ping};
pub use search::{autocomplete, search};
pub use session::{establish_session, logout};
pub use settings::{update_password, update_profile};
