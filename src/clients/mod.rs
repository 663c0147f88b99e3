pub mod console_client;
pub mod csrf;

pub use console_client::{ConsoleClient, ReportApi};
pub use csrf::resolve_csrf_token;
