pub mod agent;
pub mod cdp;
pub mod session;
pub mod tool;

pub use tool::BrowserUseTool;
