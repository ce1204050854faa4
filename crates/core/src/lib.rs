//! SmeHub report lifecycle core.
//!
//! - [`request`]: wire types for report requests and responses
//! - [`generator`]: the pluggable report generator and its placeholder
//! - [`lifecycle`]: the coordinator driving a report's status transitions

pub mod generator;
pub mod lifecycle;
pub mod request;

pub use generator::{GenerationError, ReportGenerator, TemplateReportGenerator};
pub use lifecycle::{is_lifecycle_transition, LifecycleCoordinator, LifecycleError};
pub use request::{BusinessInfo, ReportRequest, ReportResponse, SUCCESS_MESSAGE};
