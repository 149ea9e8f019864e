//! Event logging facade for the Tally analytics event logger.
//!
//! [`Analytics`] is the handle applications hold: it opens the database,
//! gates every query behind the schema migrations, enriches incoming events
//! with parsed user-agent attributes, and exposes listing, counting, and
//! cohort-tracking queries.
//!
//! # Modules
//!
//! - [`analytics`] -- The [`Analytics`] handle and its query sugar.
//! - [`config`] -- Configuration loading from YAML into strongly-typed structs.
//! - [`useragent`] -- `User-Agent` header parsing.
//! - [`telemetry`] -- Tracing subscriber installation.
//! - [`error`] -- Top-level error type.

pub mod analytics;
pub mod config;
pub mod error;
pub mod telemetry;
pub mod useragent;

pub use analytics::Analytics;
pub use config::TallyConfig;
pub use error::TallyError;
