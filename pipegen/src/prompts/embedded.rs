//! Embedded prompts
//!
//! These are compiled into the binary from .pmt files at build time.

use tracing::debug;

/// Pipeline schema and response layout given to the generator
pub const SYSTEM: &str = include_str!("../../prompts/system.pmt");

/// Layout of the full generation prompt
pub const GENERATE: &str = include_str!("../../prompts/generate.pmt");

/// Get the embedded prompt by name
pub fn get_embedded(name: &str) -> Option<&'static str> {
    debug!(%name, "get_embedded: called");
    match name {
        "system" => {
            debug!("get_embedded: matched system");
            Some(SYSTEM)
        }
        "generate" => {
            debug!("get_embedded: matched generate");
            Some(GENERATE)
        }
        _ => {
            debug!("get_embedded: no match found");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_embedded_system() {
        let system = get_embedded("system").unwrap();
        assert!(system.contains("PIPELINE_YAML:"));
        assert!(system.contains("NOTEBOOKS:"));
        assert!(system.contains("# Notebook:"));
        assert!(system.contains("notebookId"));
        assert!(system.contains("EveryHour"));
    }

    #[test]
    fn test_get_embedded_generate() {
        let generate = get_embedded("generate").unwrap();
        assert!(generate.contains("{{system}}"));
        assert!(generate.contains("{{metadata}}"));
        assert!(generate.contains("{{request}}"));
    }

    #[test]
    fn test_get_embedded_unknown() {
        assert!(get_embedded("unknown-template").is_none());
    }
}
