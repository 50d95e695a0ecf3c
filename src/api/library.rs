//! `/library`, `/library/{name}`: sample-log library.

use axum::extract::Path;
use axum::Json;

use crate::error::ApiError;
use crate::runtime::library::{self, LibrarySample};

use super::Items;

pub async fn list() -> Json<Items<LibrarySample>> {
    Json(Items::new(library::all()))
}

pub async fn get_one(Path(name): Path<String>) -> Result<Json<LibrarySample>, ApiError> {
    library::get(&name)
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("library sample {name} not found")))
}
