pub mod api;
pub mod db;
pub mod error;
pub mod models;
pub mod service;
pub mod state;
pub mod stream;

use error::AppResult;
use state::AppState;

/// Opens the local store and builds the shared state the embedding surface
/// (or the bundled terminal harness) drives.
pub fn bootstrap() -> AppResult<AppState> {
    let conn = db::migrations::init_db()?;
    let api = api::client::ApiClient::from_env();
    Ok(AppState::new(conn, api))
}
