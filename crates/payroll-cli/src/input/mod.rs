pub mod config;
pub mod file;
pub mod stdin;

use serde::de::DeserializeOwned;

/// Read a command's input from `--input` or, failing that, piped stdin.
pub fn read_input<T: DeserializeOwned>(
    path: Option<&str>,
    what: &str,
) -> Result<T, Box<dyn std::error::Error>> {
    if let Some(path) = path {
        return file::read_document(path);
    }
    stdin::read_stdin()?.ok_or_else(|| format!("--input <file> or stdin required for {what}").into())
}
