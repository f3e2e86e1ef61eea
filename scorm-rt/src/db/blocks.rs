//! Block settings and the current package descriptor

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Row, SqlitePool};
use std::fmt;
use std::str::FromStr;

use scorm_common::db::retry_on_lock;
use scorm_common::time;

use crate::cmi::ProtocolVersion;
use crate::error::{Error, Result};
use crate::package::PackageDescriptor;
use crate::reconcile::GradingPolicy;

/// Player frame aspect ratio
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AspectRatio {
    #[default]
    #[serde(rename = "4:3")]
    Standard,
    #[serde(rename = "16:9")]
    Wide,
    #[serde(rename = "1:1")]
    Square,
}

impl AspectRatio {
    pub fn as_str(&self) -> &'static str {
        match self {
            AspectRatio::Standard => "4:3",
            AspectRatio::Wide => "16:9",
            AspectRatio::Square => "1:1",
        }
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AspectRatio {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "4:3" => Ok(AspectRatio::Standard),
            "16:9" => Ok(AspectRatio::Wide),
            "1:1" => Ok(AspectRatio::Square),
            other => Err(Error::BadRequest(format!("Unsupported ratio: {}", other))),
        }
    }
}

/// Icon the host shows next to the block in course navigation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IconClass {
    #[default]
    Problem,
    Video,
    Other,
}

impl IconClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            IconClass::Problem => "problem",
            IconClass::Video => "video",
            IconClass::Other => "other",
        }
    }
}

impl FromStr for IconClass {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "problem" => Ok(IconClass::Problem),
            "video" => Ok(IconClass::Video),
            "other" => Ok(IconClass::Other),
            other => Err(Error::BadRequest(format!("Unsupported icon class: {}", other))),
        }
    }
}

/// Instructor-editable block fields
///
/// `due` is only stored and shown; deadlines are enforced by the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockSettings {
    pub display_name: String,
    pub has_score: bool,
    pub weight: f64,
    pub allow_rescore: bool,
    pub ratio: AspectRatio,
    pub icon_class: IconClass,
    pub due: Option<DateTime<Utc>>,
}

impl Default for BlockSettings {
    fn default() -> Self {
        Self {
            display_name: "Scorm".to_string(),
            has_score: true,
            weight: 1.0,
            allow_rescore: true,
            ratio: AspectRatio::default(),
            icon_class: IconClass::default(),
            due: None,
        }
    }
}

impl BlockSettings {
    pub fn validate(&self) -> Result<()> {
        if !self.weight.is_finite() || self.weight < 0.0 {
            return Err(Error::BadRequest(format!(
                "Weight must be a non-negative number, got {}",
                self.weight
            )));
        }
        if self.display_name.trim().is_empty() {
            return Err(Error::BadRequest("Display name must not be empty".to_string()));
        }
        Ok(())
    }

    pub fn grading_policy(&self) -> GradingPolicy {
        GradingPolicy {
            allow_rescore: self.allow_rescore,
            ..GradingPolicy::default()
        }
    }
}

/// One block: settings plus the package currently attached
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub block_id: String,
    pub settings: BlockSettings,
    pub package: Option<PackageDescriptor>,
}

impl Block {
    /// A block nobody has configured yet
    pub fn unconfigured(block_id: &str) -> Self {
        Self {
            block_id: block_id.to_string(),
            settings: BlockSettings::default(),
            package: None,
        }
    }
}

/// Load a block, `None` if it has never been configured
pub async fn load_block(pool: &SqlitePool, block_id: &str) -> Result<Option<Block>> {
    let row = sqlx::query(
        r#"
        SELECT block_id, display_name, has_score, weight, allow_rescore, ratio,
               icon_class, due, package_path, package_version, package_launch_data, package_modified
        FROM blocks
        WHERE block_id = ?
        "#,
    )
    .bind(block_id)
    .fetch_optional(pool)
    .await
    .map_err(scorm_common::Error::Database)?;

    let Some(row) = row else {
        return Ok(None);
    };

    let ratio: String = row.get("ratio");
    let icon_class: String = row.get("icon_class");
    let due: Option<String> = row.get("due");
    let settings = BlockSettings {
        display_name: row.get("display_name"),
        has_score: row.get::<i64, _>("has_score") != 0,
        weight: row.get("weight"),
        allow_rescore: row.get::<i64, _>("allow_rescore") != 0,
        ratio: ratio.parse().map_err(|e: Error| corrupt("ratio", e))?,
        icon_class: icon_class.parse().map_err(|e: Error| corrupt("icon_class", e))?,
        due: due.as_deref().map(time::from_storage).transpose()?,
    };

    let package_path: Option<String> = row.get("package_path");
    let package_version: Option<String> = row.get("package_version");
    let package_modified: Option<String> = row.get("package_modified");

    let package = match (package_path, package_version, package_modified) {
        (Some(entry_path), Some(version), Some(modified)) => Some(PackageDescriptor {
            version: version
                .parse::<ProtocolVersion>()
                .map_err(|e| corrupt("package_version", e))?,
            entry_path,
            launch_data: row.get("package_launch_data"),
            modified_at: time::from_storage(&modified)?,
        }),
        _ => None,
    };

    Ok(Some(Block {
        block_id: row.get("block_id"),
        settings,
        package,
    }))
}

/// Insert or update a block's editable fields
pub async fn save_settings(
    pool: &SqlitePool,
    block_id: &str,
    settings: &BlockSettings,
    max_wait_ms: u64,
) -> Result<()> {
    let ratio = settings.ratio.as_str();
    let icon_class = settings.icon_class.as_str();
    let due = settings.due.as_ref().map(time::to_storage);

    retry_on_lock("save_settings", max_wait_ms, || async {
        sqlx::query(
            r#"
            INSERT INTO blocks (block_id, display_name, has_score, weight, allow_rescore, ratio, icon_class, due)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(block_id) DO UPDATE SET
                display_name = excluded.display_name,
                has_score = excluded.has_score,
                weight = excluded.weight,
                allow_rescore = excluded.allow_rescore,
                ratio = excluded.ratio,
                icon_class = excluded.icon_class,
                due = excluded.due
            "#,
        )
        .bind(block_id)
        .bind(&settings.display_name)
        .bind(settings.has_score)
        .bind(settings.weight)
        .bind(settings.allow_rescore)
        .bind(ratio)
        .bind(icon_class)
        .bind(&due)
        .execute(pool)
        .await?;

        Ok(())
    })
    .await?;

    Ok(())
}

/// Replace a block's package descriptor, creating the block if needed
pub async fn save_package(
    pool: &SqlitePool,
    block_id: &str,
    package: &PackageDescriptor,
    max_wait_ms: u64,
) -> Result<()> {
    let version = package.version.as_str();
    let modified = time::to_storage(&package.modified_at);

    retry_on_lock("save_package", max_wait_ms, || async {
        sqlx::query(
            r#"
            INSERT INTO blocks (block_id, package_path, package_version, package_launch_data, package_modified)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(block_id) DO UPDATE SET
                package_path = excluded.package_path,
                package_version = excluded.package_version,
                package_launch_data = excluded.package_launch_data,
                package_modified = excluded.package_modified
            "#,
        )
        .bind(block_id)
        .bind(&package.entry_path)
        .bind(version)
        .bind(&package.launch_data)
        .bind(&modified)
        .execute(pool)
        .await?;

        Ok(())
    })
    .await?;

    Ok(())
}

fn corrupt(column: &str, err: Error) -> Error {
    Error::Common(scorm_common::Error::Internal(format!(
        "Corrupt blocks.{}: {}",
        column, err
    )))
}
