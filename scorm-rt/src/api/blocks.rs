//! Block view, settings, and package upload endpoints

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Path, State},
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use scorm_common::time;

use crate::api::{CurrentUser, StaffUser};
use crate::cmi::ProtocolVersion;
use crate::db::{self, AspectRatio, Block, BlockSettings, IconClass};
use crate::error::{ApiResult, Error};
use crate::package::PackageDescriptor;
use crate::state::{RuntimeState, ScormStatus};
use crate::AppState;

/// Largest package archive accepted
pub const MAX_PACKAGE_BYTES: usize = 512 * 1024 * 1024;

/// Package info the player page is rendered with
#[derive(Debug, Serialize)]
pub struct PackageView {
    pub url: String,
    pub version: ProtocolVersion,
    /// Echoed back by the player as `package_date`
    pub package_date: String,
}

/// GET /api/blocks/:block_id response
#[derive(Debug, Serialize)]
pub struct StudentView {
    pub block_id: String,
    #[serde(flatten)]
    pub settings: BlockSettings,
    pub package: Option<PackageView>,
    pub status: ScormStatus,
    pub score: f64,
    pub progress: f64,
}

/// Partial settings update; absent fields keep their value
#[derive(Debug, Default, Deserialize)]
pub struct SettingsUpdate {
    pub display_name: Option<String>,
    pub has_score: Option<bool>,
    pub weight: Option<f64>,
    pub allow_rescore: Option<bool>,
    pub ratio: Option<String>,
    pub icon_class: Option<String>,
    /// Any accepted timestamp format; an empty string clears the due date
    pub due: Option<String>,
}

impl SettingsUpdate {
    fn apply(self, mut settings: BlockSettings) -> crate::error::Result<BlockSettings> {
        if let Some(display_name) = self.display_name {
            settings.display_name = display_name;
        }
        if let Some(has_score) = self.has_score {
            settings.has_score = has_score;
        }
        if let Some(weight) = self.weight {
            settings.weight = weight;
        }
        if let Some(allow_rescore) = self.allow_rescore {
            settings.allow_rescore = allow_rescore;
        }
        if let Some(ratio) = self.ratio {
            settings.ratio = ratio.parse::<AspectRatio>()?;
        }
        if let Some(icon_class) = self.icon_class {
            settings.icon_class = icon_class.parse::<IconClass>()?;
        }
        if let Some(due) = self.due {
            settings.due = time::parse_timestamp(&due)
                .map_err(|e| Error::BadRequest(format!("due: {}", e)))?;
        }
        Ok(settings)
    }
}

/// GET /api/blocks/:block_id
///
/// Everything the student view needs to render the player.
pub async fn student_view(
    State(state): State<AppState>,
    Path(block_id): Path<String>,
    CurrentUser(user_id): CurrentUser,
) -> ApiResult<Json<StudentView>> {
    let block = db::load_block(&state.db, &block_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Block {}", block_id)))?;
    let learner = state
        .runtime
        .learner_state(&user_id, &block_id)
        .await?
        .unwrap_or_default();

    Ok(Json(render_view(&state, block, &learner)))
}

/// PUT /api/blocks/:block_id/settings
///
/// Staff only.
pub async fn update_settings(
    State(state): State<AppState>,
    Path(block_id): Path<String>,
    StaffUser(_author): StaffUser,
    Json(update): Json<SettingsUpdate>,
) -> ApiResult<Json<BlockSettings>> {
    let current = state.runtime.block(&block_id).await?.settings;
    let settings = update.apply(current)?;
    let block = state.packages.update_settings(&block_id, settings).await?;

    Ok(Json(block.settings))
}

/// POST /api/blocks/:block_id/package
///
/// Staff only. Body is the raw zip archive.
pub async fn upload_package(
    State(state): State<AppState>,
    Path(block_id): Path<String>,
    StaffUser(author): StaffUser,
    body: Bytes,
) -> ApiResult<Json<PackageView>> {
    tracing::debug!(block_id = %block_id, author = %author, bytes = body.len(), "Package upload");
    let descriptor = state.packages.upload(&block_id, body.to_vec()).await?;
    Ok(Json(package_view(&state, &descriptor)))
}

pub fn block_routes() -> Router<AppState> {
    Router::new()
        .route("/api/blocks/:block_id", get(student_view))
        .route("/api/blocks/:block_id/settings", put(update_settings))
        .route(
            "/api/blocks/:block_id/package",
            post(upload_package).layer(DefaultBodyLimit::max(MAX_PACKAGE_BYTES)),
        )
}

fn render_view(state: &AppState, block: Block, learner: &RuntimeState) -> StudentView {
    let progress = block
        .package
        .as_ref()
        .map(|p| learner.progress(p.version))
        .unwrap_or(0.0);

    StudentView {
        package: block.package.as_ref().map(|p| package_view(state, p)),
        block_id: block.block_id,
        settings: block.settings,
        status: learner.status,
        score: learner.score,
        progress,
    }
}

fn package_view(state: &AppState, package: &PackageDescriptor) -> PackageView {
    PackageView {
        url: state.packages.launch_url(package),
        version: package.version,
        package_date: time::format_timestamp(&package.modified_at),
    }
}
