#![forbid(unsafe_code)]

use std::env;
use std::io;

use leadform_os::config::LeadFormConfig;
use leadform_tools::form_cli::execute_form_command;
use tracing_subscriber::{fmt, EnvFilter};

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).with_writer(io::stderr).init();

    if let Err(err) = run() {
        eprintln!("{err}");
        std::process::exit(2);
    }
}

fn run() -> Result<(), String> {
    let args: Vec<String> = env::args().skip(1).collect();
    let config = LeadFormConfig::from_env().map_err(|e| format!("invalid configuration: {e}"))?;
    let output = execute_form_command(&config, &args)?;
    if !output.is_empty() {
        println!("{output}");
    }
    Ok(())
}
