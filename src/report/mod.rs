/// Audit CSV export and terminal dashboard rendering
pub mod audit_csv;
pub mod dashboard_view;

pub use audit_csv::{escape_field, write_audit_csv, REPORT_TITLE};
pub use dashboard_view::{render_dashboard, render_event_status};
