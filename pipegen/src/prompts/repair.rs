//! Repair prompt construction

use crate::validation::ValidationFinding;

/// Build the prompt asking the generator to fix a rejected artifact
///
/// Findings are listed in the order given, each with its category, message
/// and suggestion. Deterministic for equal inputs.
pub fn build_fix_prompt(original_prompt: &str, last_artifact: &str, findings: &[ValidationFinding]) -> String {
    let problems: Vec<String> = findings
        .iter()
        .enumerate()
        .map(|(i, f)| match &f.suggestion {
            Some(suggestion) => format!("{}. [{}] {} → Suggestion: {}", i + 1, f.category, f.message, suggestion),
            None => format!("{}. [{}] {}", i + 1, f.category, f.message),
        })
        .collect();

    format!(
        "PREVIOUS REQUEST:
{original_prompt}

CURRENT PIPELINE (with errors):
{last_artifact}

VALIDATION ERRORS FOUND:
{problems}

INSTRUCTIONS:
Fix the errors above and regenerate the complete pipeline. Make sure to:
1. Address each error listed above
2. Keep the original intent of the pipeline
3. Use only table and file names that appear in the metadata
4. Follow the pipeline YAML schema and response layout exactly

Generate the corrected pipeline:
",
        problems = problems.join("\n")
    )
}
