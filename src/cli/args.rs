// ABOUTME: Command line argument definitions and parsing using Clap
// ABOUTME: Defines the main CLI structure and subcommands for atest-render

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "atest-render")]
#[command(about = "Render test data templates with random, crypto and secret helpers")]
#[command(version)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(short, long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(short, long, global = true, help = "Path to configuration file")]
    pub config: Option<PathBuf>,

    #[arg(long, global = true, help = "Disable colored output")]
    pub no_color: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Render a template file
    Render {
        #[arg(help = "Path to template file")]
        template: PathBuf,

        #[arg(
            short = 'V',
            long = "var",
            help = "Template variables (key=value)"
        )]
        vars: Vec<String>,

        #[arg(short, long, help = "YAML or JSON file with template data")]
        data: Option<PathBuf>,

        #[arg(short, long, help = "Write the rendered output to a file")]
        output: Option<PathBuf>,

        #[arg(long, help = "Fail on variables missing from the context")]
        strict: bool,
    },

    /// Check template syntax without rendering
    Validate {
        #[arg(help = "Path to template file")]
        template: PathBuf,
    },

    /// List every function available to templates
    Functions,

    /// Show usage notes for a template function
    Usage {
        #[arg(help = "Function name")]
        name: String,
    },

    /// Print the template snippet for a natural-language step
    Emit {
        #[arg(help = "Step sentence, e.g. \"a random string of length 8\"")]
        step: String,
    },
}

impl Args {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Parse variables from key=value format
    pub fn parse_variables(
        vars: &[String],
    ) -> anyhow::Result<std::collections::HashMap<String, String>> {
        let mut variables = std::collections::HashMap::new();

        for var in vars {
            if let Some((key, value)) = var.split_once('=') {
                variables.insert(key.to_string(), value.to_string());
            } else {
                return Err(anyhow::anyhow!(
                    "Invalid variable format '{}'. Expected 'key=value'",
                    var
                ));
            }
        }

        Ok(variables)
    }
}
