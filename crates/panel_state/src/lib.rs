mod error;
mod paths;
mod schema;
mod store;

pub use error::PanelStateError;
pub use paths::{default_state_path, state_dir, PANEL_STATE_DIR, PANEL_STATE_FILE};
pub use schema::PanelState;
pub use store::PanelStateStore;
