use thiserror::Error;

/// Errors surfaced by a [`crate::WorldStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    /// An entity addressed by id does not exist.
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },
    /// The world clock has already moved past `week`.
    #[error("world {world} is at {current}; week {week} is closed")]
    WeekClosed {
        world: String,
        week: sim_core::GameWeek,
        current: sim_core::GameWeek,
    },
    #[error("invalid snapshot: {0}")]
    Invalid(#[from] sim_core::ValidationError),
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
    #[error("encoding error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    pub fn not_found(kind: &'static str, id: impl ToString) -> Self {
        StoreError::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    pub(crate) fn week_closed(world: impl ToString, week: sim_core::GameWeek, current: sim_core::GameWeek) -> Self {
        StoreError::WeekClosed {
            world: world.to_string(),
            week,
            current,
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
