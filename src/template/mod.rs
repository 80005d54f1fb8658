// ABOUTME: Template rendering module for generating randomized test data
// ABOUTME: Wires the function registry, the handlebars engine and the step snippet emitter together

pub mod assets;
pub mod crypto;
pub mod emitter;
pub mod engine;
pub mod error;
pub mod function;
pub mod helpers;
pub mod random;
pub mod registry;
pub mod secret;
pub mod usage;

pub use emitter::{ExecutionContext, StepMatcher};
pub use engine::TemplateEngine;
pub use error::{
    CryptoError, EmitError, FunctionError, InlineText, Result, SecretError, TemplateError,
};
pub use function::TemplateFunction;
pub use random::WeightedItem;
pub use registry::{AdvancedFunction, FunctionRegistry, FunctionTable};
pub use secret::{
    ChainedSecretResolver, EnvSecretResolver, NoSecretServer, SecretResolver, SecretValue,
    StaticSecretResolver,
};
pub use usage::func_usage;
