//! Products API: filterable, paginated CRUD over a PostgreSQL `products` table.

pub mod config;
pub mod error;
pub mod handlers;
pub mod migration;
pub mod response;
pub mod routes;
pub mod service;
pub mod sql;
pub mod state;
pub mod store;

pub use config::{load_dotenv, Settings};
pub use error::{AppError, ConfigError};
pub use migration::{apply_migrations, Migrator};
pub use routes::app;
pub use state::AppState;
pub use store::{connect_pool, connect_pool_lazy, ensure_database_exists};
