// ABOUTME: Main library module for the atest-render template toolkit
// ABOUTME: Exports the template engine, its function library and the CLI

pub mod cli;
pub mod template;

// Re-export commonly used types
pub use cli::{App, Args, Config};
pub use template::{
    AdvancedFunction, FunctionRegistry, SecretResolver, TemplateEngine, TemplateError,
    TemplateFunction,
};

// Error handling
pub type Result<T> = anyhow::Result<T>;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
