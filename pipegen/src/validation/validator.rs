//! Schema validator for generated pipeline artifacts

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;
use serde_yaml::Value;
use tracing::{debug, info};

use crate::artifact::Artifact;
use crate::domain::DomainMetadata;
use crate::pipeline::{Activity, ActivityKind, ActivityList, PipelineDocument, ScheduleKind};

use super::{Category, ValidationFinding, ValidationResult};

/// Position suffix serde_yaml appends to its messages, relative to the extracted document
static YAML_POSITION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r" at line \d+ column \d+").expect("yaml position pattern is a valid regex"));

/// How unknown table references are treated
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ResourceCheck {
    /// Unknown tables are logged only
    #[default]
    Lenient,
    /// Unknown tables become blocking findings (only when metadata lists tables)
    Strict,
}

/// Validates artifact text against the pipeline schema
///
/// Pure: the same artifact and metadata always give the same findings in
/// the same order.
#[derive(Debug, Clone, Copy, Default)]
pub struct SchemaValidator {
    resource_check: ResourceCheck,
}

impl SchemaValidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_resource_check(resource_check: ResourceCheck) -> Self {
        Self { resource_check }
    }

    pub fn resource_check(&self) -> ResourceCheck {
        self.resource_check
    }

    pub fn validate(&self, artifact_text: &str, metadata: &DomainMetadata) -> ValidationResult {
        debug!(
            artifact_len = artifact_text.len(),
            resource_check = ?self.resource_check,
            "SchemaValidator::validate: called"
        );
        let artifact = Artifact::parse(artifact_text);

        let root = match self.parse(&artifact) {
            Ok(root) => root,
            Err(finding) => {
                debug!("SchemaValidator::validate: stopping at parse stage");
                return ValidationResult::from_findings(vec![finding]);
            }
        };

        let pipeline = PipelineDocument::from_value(&root);
        let mut findings = Vec::new();

        if pipeline.name.is_none() {
            debug!("SchemaValidator::validate: pipeline name missing");
            findings.push(
                ValidationFinding::error(Category::MissingField, "Pipeline is missing required field: name")
                    .with_suggestion("Add a \"name\" field to the pipeline"),
            );
        }

        match &pipeline.activities {
            ActivityList::Missing => {
                debug!("SchemaValidator::validate: activities missing");
                findings.push(no_activities("Pipeline has no activities defined"));
            }
            ActivityList::NotAList => {
                debug!("SchemaValidator::validate: activities is not a list");
                findings.push(no_activities("Pipeline activities must be a list of activity objects"));
            }
            ActivityList::Items(items) if items.is_empty() => {
                debug!("SchemaValidator::validate: activities list is empty");
                findings.push(no_activities("Pipeline has no activities defined"));
            }
            ActivityList::Items(items) => {
                debug!(activity_count = items.len(), "SchemaValidator::validate: checking activities");
                for activity in items {
                    check_activity(activity, &mut findings);
                }
                self.check_resources(items, metadata, &mut findings);
            }
        }

        check_schedule(&pipeline, &mut findings);

        let result = ValidationResult::from_findings(findings);
        info!(
            is_valid = result.is_valid,
            findings = result.findings.len(),
            blocking = result.blocking().count(),
            "Validation finished"
        );
        result
    }

    fn parse(&self, artifact: &Artifact) -> Result<Value, ValidationFinding> {
        let document = artifact.document();
        debug!(document_len = document.len(), "SchemaValidator::parse: called");
        if document.trim().is_empty() {
            debug!("SchemaValidator::parse: document is empty");
            return Err(empty_pipeline());
        }

        match serde_yaml::from_str::<Value>(document) {
            Ok(Value::Null) => {
                debug!("SchemaValidator::parse: parsed to null");
                Err(empty_pipeline())
            }
            Ok(root) => Ok(root),
            Err(e) => {
                // Report the line of the artifact as generated, not of the extracted document
                let line = e
                    .location()
                    .and_then(|loc| artifact.raw_line(loc.line()))
                    .map(|line| line.to_string())
                    .unwrap_or_else(|| "unknown".to_string());
                let detail = YAML_POSITION.replace_all(&e.to_string(), "").into_owned();
                debug!(%line, error = %e, "SchemaValidator::parse: yaml error");
                Err(
                    ValidationFinding::critical(Category::Syntax, format!("Invalid YAML at line {}: {}", line, detail))
                        .with_suggestion("Check for proper indentation and YAML syntax"),
                )
            }
        }
    }

    fn check_resources(&self, activities: &[Activity], metadata: &DomainMetadata, findings: &mut Vec<ValidationFinding>) {
        let known = metadata.known_tables();
        if known.is_empty() {
            debug!("SchemaValidator::check_resources: no known tables, skipping");
            return;
        }

        for activity in activities {
            let ActivityKind::Copy { source: Some(source), .. } = &activity.kind else {
                continue;
            };
            if source.is_file_path() {
                continue;
            }
            let Some(table) = source.table_name() else {
                continue;
            };
            if known.contains(table) {
                continue;
            }

            match self.resource_check {
                ResourceCheck::Lenient => {
                    info!(
                        %table,
                        known = %join(&known),
                        activity = %activity.label(),
                        "Table not in known tables"
                    );
                }
                ResourceCheck::Strict => {
                    debug!(%table, "SchemaValidator::check_resources: strict, adding finding");
                    findings.push(
                        ValidationFinding::error(
                            Category::ResourceReference,
                            format!(
                                "Copy activity \"{}\" reads table \"{}\" which is not in the available metadata",
                                activity.label(),
                                table
                            ),
                        )
                        .with_suggestion(format!("Use one of the known tables: {}", join(&known))),
                    );
                }
            }
        }
    }
}

fn empty_pipeline() -> ValidationFinding {
    ValidationFinding::critical(Category::MissingField, "Pipeline definition is empty")
        .with_suggestion("Start the document with a top-level \"pipeline:\" key")
}

fn no_activities(message: &str) -> ValidationFinding {
    ValidationFinding::error(Category::MissingField, message)
        .with_suggestion("Add at least one activity to the pipeline")
}

fn check_activity(activity: &Activity, findings: &mut Vec<ValidationFinding>) {
    debug!(position = activity.position, name = ?activity.name, "check_activity: called");
    if activity.name.is_none() {
        findings.push(ValidationFinding::error(
            Category::ActivityError,
            format!("Activity {} is missing a name", activity.position),
        ));
    }

    match &activity.kind {
        ActivityKind::Untyped => {
            findings.push(ValidationFinding::error(
                Category::ActivityError,
                format!("Activity \"{}\" is missing a type", activity.label()),
            ));
        }
        ActivityKind::Copy { source, sink } => {
            if source.is_none() {
                findings.push(ValidationFinding::error(
                    Category::ActivityError,
                    format!("Copy activity \"{}\" is missing source configuration", activity.label()),
                ));
            }
            if sink.is_none() {
                findings.push(ValidationFinding::error(
                    Category::ActivityError,
                    format!("Copy activity \"{}\" is missing sink/target configuration", activity.label()),
                ));
            }
        }
        ActivityKind::Notebook { notebook_id: None, .. } => {
            findings.push(
                ValidationFinding::warning(
                    Category::ActivityError,
                    format!("Notebook activity \"{}\" is missing notebookId", activity.label()),
                )
                .with_suggestion("Add a notebookId or the system will use a placeholder"),
            );
        }
        ActivityKind::Dataflow { dataflow_id: None } => {
            findings.push(
                ValidationFinding::warning(
                    Category::ActivityError,
                    format!("Dataflow activity \"{}\" is missing dataflowId", activity.label()),
                )
                .with_suggestion("Add the dataflowId of the dataflow to run"),
            );
        }
        ActivityKind::Other { type_name } => {
            findings.push(
                ValidationFinding::warning(
                    Category::SchemaViolation,
                    format!("Activity \"{}\" has unsupported type \"{}\"", activity.label(), type_name),
                )
                .with_suggestion("Use one of the supported activity types: Copy, Notebook, Dataflow"),
            );
        }
        ActivityKind::Notebook { .. } | ActivityKind::Dataflow { .. } => {}
    }
}

fn check_schedule(pipeline: &PipelineDocument, findings: &mut Vec<ValidationFinding>) {
    const SUGGESTION: &str = "Add a schedule with type (Once, EveryHour, Daily or Weekly) and a numeric interval";

    let Some(schedule) = &pipeline.schedule else {
        debug!("check_schedule: no schedule");
        findings.push(
            ValidationFinding::warning(Category::SchemaViolation, "Pipeline has no schedule defined")
                .with_suggestion(SUGGESTION),
        );
        return;
    };

    match &schedule.kind {
        None => {
            findings.push(
                ValidationFinding::warning(Category::SchemaViolation, "Schedule is missing a type")
                    .with_suggestion(SUGGESTION),
            );
        }
        Some(ScheduleKind::Unknown(kind)) => {
            findings.push(
                ValidationFinding::warning(Category::SchemaViolation, format!("Unknown schedule type \"{}\"", kind))
                    .with_suggestion(SUGGESTION),
            );
        }
        Some(_) => {}
    }

    if schedule.interval.is_none() {
        findings.push(
            ValidationFinding::warning(Category::SchemaViolation, "Schedule is missing a numeric interval")
                .with_suggestion(SUGGESTION),
        );
    }
}

fn join(tables: &BTreeSet<String>) -> String {
    tables.iter().map(String::as_str).collect::<Vec<_>>().join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::Severity;
    use proptest::prelude::*;

    const VALID: &str = r#"PIPELINE_YAML:
pipeline:
  name: SalesPipeline
  activities:
    - name: LoadSales
      type: Copy
      source:
        type: Lakehouse
        path: Tables/sales_raw
      sink:
        type: Lakehouse
        path: Tables/sales_clean
    - name: Aggregate
      type: Notebook
      notebookId: nb-agg-001
      dependsOn: [LoadSales]
  schedule:
    type: Daily
    interval: 1

NOTEBOOKS:
# Notebook: nb-agg-001
df = spark.read.format("delta").load("Tables/sales_clean")
"#;

    fn metadata_with_tables(tables: &[&str]) -> DomainMetadata {
        serde_json::from_value(serde_json::json!({
            "lakehouses": [{ "id": "lh-1", "name": "lh", "tables": tables }]
        }))
        .unwrap()
    }

    #[test]
    fn test_missing_name_and_empty_activities() {
        let result = SchemaValidator::new().validate("PIPELINE_YAML:\npipeline:\n  activities: []\n", &DomainMetadata::default());

        assert!(!result.is_valid);
        let errors: Vec<_> = result.blocking().collect();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].message, "Pipeline is missing required field: name");
        assert_eq!(errors[0].severity, Severity::Error);
        assert_eq!(errors[1].message, "Pipeline has no activities defined");
        assert_eq!(errors[1].severity, Severity::Error);
    }

    #[test]
    fn test_copy_missing_sink() {
        let text = "PIPELINE_YAML:\npipeline:\n  name: P\n  activities:\n    - name: LoadSales\n      type: Copy\n      source: { type: Lakehouse, path: Files/a.csv }\n  schedule: { type: Daily, interval: 1 }\n";
        let result = SchemaValidator::new().validate(text, &DomainMetadata::default());

        assert!(!result.is_valid);
        let errors: Vec<_> = result.blocking().collect();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].category, Category::ActivityError);
        assert!(errors[0].message.contains("LoadSales"));
        assert!(errors[0].message.contains("sink"));
    }

    #[test]
    fn test_well_formed_with_no_known_tables() {
        let result = SchemaValidator::new().validate(VALID, &DomainMetadata::default());
        assert!(result.is_valid);
        assert!(result.findings.is_empty());
    }

    #[test]
    fn test_syntax_error_stops_validation() {
        let text = "PIPELINE_YAML:\npipeline:\n  name: [unclosed\n  activities: {\n";
        let result = SchemaValidator::new().validate(text, &DomainMetadata::default());

        assert!(!result.is_valid);
        assert_eq!(result.findings.len(), 1);
        assert_eq!(result.findings[0].category, Category::Syntax);
        assert_eq!(result.findings[0].severity, Severity::Critical);
        assert!(result.findings[0].message.starts_with("Invalid YAML at line"));
    }

    #[test]
    fn test_syntax_error_line_counts_raw_artifact() {
        // Error on document line 2, which is raw line 5 after the preamble, label and fence
        let text = "Here you go.\nPIPELINE_YAML:\n```yaml\npipeline:\n  name: a: b\n```\n";
        let result = SchemaValidator::new().validate(text, &DomainMetadata::default());

        assert_eq!(result.findings.len(), 1);
        let message = &result.findings[0].message;
        assert!(message.starts_with("Invalid YAML at line 5: "), "{message}");
        assert!(!message.contains("column"), "{message}");
    }

    #[test]
    fn test_empty_document() {
        for text in ["", "PIPELINE_YAML:\n", "PIPELINE_YAML:\n---\n~\n"] {
            let result = SchemaValidator::new().validate(text, &DomainMetadata::default());
            assert!(!result.is_valid, "{text:?}");
            assert_eq!(result.findings.len(), 1);
            assert_eq!(result.findings[0].message, "Pipeline definition is empty");
            assert_eq!(result.findings[0].severity, Severity::Critical);
        }
    }

    #[test]
    fn test_activity_errors_in_declaration_order() {
        let text = r#"pipeline:
  name: P
  activities:
    - type: Copy
    - name: NoType
    - name: Nb
      type: notebook
  schedule: { type: Once, interval: 1 }
"#;
        let result = SchemaValidator::new().validate(text, &DomainMetadata::default());
        let messages: Vec<&str> = result.findings.iter().map(|f| f.message.as_str()).collect();
        assert_eq!(
            messages,
            vec![
                "Activity 1 is missing a name",
                "Copy activity \"1\" is missing source configuration",
                "Copy activity \"1\" is missing sink/target configuration",
                "Activity \"NoType\" is missing a type",
                "Notebook activity \"Nb\" is missing notebookId",
            ]
        );
        assert_eq!(result.findings[4].severity, Severity::Warning);
    }

    #[test]
    fn test_activities_not_a_list() {
        let result = SchemaValidator::new().validate("pipeline:\n  name: P\n  activities: copy\n", &DomainMetadata::default());
        assert!(!result.is_valid);
        assert!(result.findings.iter().any(|f| f.message.contains("must be a list")));
    }

    #[test]
    fn test_legacy_fields_satisfy_copy() {
        let text = "pipeline:\n  name: P\n  activities:\n    - name: A\n      type: Copy\n      settings:\n        source: { path: Files/a.csv }\n        target: { path: Tables/b }\n  schedule: { type: Weekly, interval: 1 }\n";
        let result = SchemaValidator::new().validate(text, &DomainMetadata::default());
        assert!(result.is_valid);
        assert!(result.findings.is_empty());
    }

    #[test]
    fn test_schedule_warnings_do_not_block() {
        let text = "pipeline:\n  name: P\n  activities:\n    - name: F\n      type: Dataflow\n  schedule: { type: Monthly }\n";
        let result = SchemaValidator::new().validate(text, &DomainMetadata::default());
        assert!(result.is_valid);
        let categories: Vec<Category> = result.findings.iter().map(|f| f.category).collect();
        assert_eq!(
            categories,
            vec![Category::ActivityError, Category::SchemaViolation, Category::SchemaViolation]
        );
        assert!(result.findings.iter().all(|f| f.severity == Severity::Warning));
    }

    #[test]
    fn test_unknown_table_is_lenient_by_default() {
        let metadata = metadata_with_tables(&["customers"]);
        let result = SchemaValidator::new().validate(VALID, &metadata);
        assert!(result.is_valid);
        assert!(!result.findings.iter().any(|f| f.category == Category::ResourceReference));
    }

    #[test]
    fn test_strict_flags_unknown_table() {
        let metadata = metadata_with_tables(&["customers"]);
        let result = SchemaValidator::with_resource_check(ResourceCheck::Strict).validate(VALID, &metadata);
        assert!(!result.is_valid);
        assert_eq!(result.findings.len(), 1);
        assert_eq!(result.findings[0].category, Category::ResourceReference);
        assert!(result.findings[0].message.contains("sales_raw"));

        let known = metadata_with_tables(&["sales_raw"]);
        assert!(SchemaValidator::with_resource_check(ResourceCheck::Strict).validate(VALID, &known).is_valid);
    }

    #[test]
    fn test_strict_without_known_tables_is_lenient() {
        let result = SchemaValidator::with_resource_check(ResourceCheck::Strict).validate(VALID, &DomainMetadata::default());
        assert!(result.is_valid);
    }

    fn path_strategy() -> impl Strategy<Value = String> {
        prop_oneof![
            Just("Tables/sales_raw".to_string()),
            Just("Files/input.csv".to_string()),
            "Tables/[a-z_]{1,12}",
            "[a-zA-Z/_]{0,20}",
        ]
    }

    fn artifact_strategy() -> impl Strategy<Value = String> {
        let activity = (
            proptest::option::of("[A-Za-z]{1,10}"),
            prop_oneof![Just("Copy"), Just("copy"), Just("Notebook"), Just("Dataflow"), Just("Other"), Just("")],
            proptest::option::of(path_strategy()),
            proptest::option::of(path_strategy()),
        )
            .prop_map(|(name, kind, source, sink)| {
                let mut s = String::from("    -");
                if let Some(name) = name {
                    s.push_str(&format!(" name: {}\n     ", name));
                }
                s.push_str(&format!(" type: \"{}\"\n", kind));
                if let Some(source) = source {
                    s.push_str(&format!("      source: {{ path: \"{}\" }}\n", source));
                }
                if let Some(sink) = sink {
                    s.push_str(&format!("      sink: {{ path: \"{}\" }}\n", sink));
                }
                s
            });
        (
            proptest::option::of("[A-Za-z]{1,10}"),
            proptest::collection::vec(activity, 0..5),
            any::<bool>(),
        )
            .prop_map(|(name, activities, garbage)| {
                let mut s = String::from("PIPELINE_YAML:\npipeline:\n");
                if let Some(name) = name {
                    s.push_str(&format!("  name: {}\n", name));
                }
                s.push_str("  activities:\n");
                for a in activities {
                    s.push_str(&a);
                }
                if garbage {
                    s.push_str("  : [\n");
                }
                s
            })
    }

    proptest! {
        #[test]
        fn prop_validation_is_deterministic(text in artifact_strategy()) {
            let validator = SchemaValidator::new();
            let metadata = metadata_with_tables(&["sales_raw"]);
            let first = validator.validate(&text, &metadata);
            let second = validator.validate(&text, &metadata);
            prop_assert_eq!(first, second);
        }

        #[test]
        fn prop_no_blocking_resource_findings_without_tables(
            text in prop_oneof![artifact_strategy(), ".{0,200}"],
            strict in any::<bool>(),
        ) {
            let check = if strict { ResourceCheck::Strict } else { ResourceCheck::Lenient };
            let result = SchemaValidator::with_resource_check(check).validate(&text, &DomainMetadata::default());
            prop_assert!(!result
                .findings
                .iter()
                .any(|f| f.category == Category::ResourceReference && f.severity.is_blocking()));
        }
    }
}
