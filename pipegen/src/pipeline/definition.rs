//! Typed view over a parsed pipeline document
//!
//! Generated documents are loosely shaped: fields may be missing, have the
//! wrong type, or live under legacy names. Everything here is built from a
//! `serde_yaml::Value` and never fails; absent or unusable fields become
//! `None` so the validator can report them.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde_yaml::{Mapping, Value};
use tracing::debug;

static TABLE_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Tables/([^/]+)").expect("table path pattern is a valid regex"));

/// Activity type, matched case-insensitively against the document
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivityKind {
    /// No usable `type` field
    Untyped,
    Copy {
        source: Option<Endpoint>,
        sink: Option<Endpoint>,
    },
    Notebook {
        notebook_id: Option<String>,
        inputs: Vec<String>,
        outputs: Vec<String>,
    },
    Dataflow {
        dataflow_id: Option<String>,
    },
    Other {
        type_name: String,
    },
}

impl ActivityKind {
    pub fn type_name(&self) -> Option<&str> {
        match self {
            Self::Untyped => None,
            Self::Copy { .. } => Some("Copy"),
            Self::Notebook { .. } => Some("Notebook"),
            Self::Dataflow { .. } => Some("Dataflow"),
            Self::Other { type_name } => Some(type_name),
        }
    }
}

/// Source or sink of a Copy activity
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Endpoint {
    pub kind: Option<String>,
    pub path: Option<String>,
}

impl Endpoint {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Mapping(map) => Some(Self {
                kind: text(map.get("type")),
                path: text(map.get("path")),
            }),
            Value::String(s) if !s.trim().is_empty() => Some(Self {
                kind: None,
                path: Some(s.trim().to_string()),
            }),
            _ => None,
        }
    }

    /// Table name for a `Tables/<name>` path, case-insensitive on the prefix
    pub fn table_name(&self) -> Option<&str> {
        let path = self.path.as_deref()?;
        TABLE_PATH.captures(path).and_then(|c| c.get(1)).map(|m| m.as_str())
    }

    pub fn is_file_path(&self) -> bool {
        self.path.as_deref().is_some_and(|p| p.starts_with("Files/"))
    }
}

/// One entry of the `activities` list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Activity {
    /// 1-based position in the document
    pub position: usize,
    pub name: Option<String>,
    pub kind: ActivityKind,
    pub depends_on: Vec<String>,
}

impl Activity {
    fn from_value(position: usize, value: &Value) -> Self {
        let Value::Mapping(map) = value else {
            debug!(position, "Activity::from_value: entry is not a mapping");
            return Self {
                position,
                name: None,
                kind: ActivityKind::Untyped,
                depends_on: Vec::new(),
            };
        };

        let name = text(map.get("name"));
        let kind = match text(map.get("type")) {
            None => ActivityKind::Untyped,
            Some(type_name) => match type_name.to_lowercase().as_str() {
                "copy" => {
                    debug!(position, "Activity::from_value: copy activity");
                    ActivityKind::Copy {
                        source: resolve_endpoint(map, &[&["source"], &["settings", "source"]]),
                        sink: resolve_endpoint(
                            map,
                            &[&["sink"], &["target"], &["settings", "target"], &["settings", "sink"]],
                        ),
                    }
                }
                "notebook" => {
                    debug!(position, "Activity::from_value: notebook activity");
                    ActivityKind::Notebook {
                        notebook_id: text(map.get("notebookId")),
                        inputs: datasets(map.get("inputs")),
                        outputs: datasets(map.get("outputs")),
                    }
                }
                "dataflow" => {
                    debug!(position, "Activity::from_value: dataflow activity");
                    ActivityKind::Dataflow {
                        dataflow_id: text(map.get("dataflowId")),
                    }
                }
                _ => {
                    debug!(position, %type_name, "Activity::from_value: other activity type");
                    ActivityKind::Other { type_name }
                }
            },
        };

        Self {
            position,
            name,
            kind,
            depends_on: string_list(map.get("dependsOn")),
        }
    }

    /// Name for messages; falls back to the position when unnamed
    pub fn label(&self) -> String {
        self.name.clone().unwrap_or_else(|| self.position.to_string())
    }
}

/// State of the `activities` field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivityList {
    Missing,
    NotAList,
    Items(Vec<Activity>),
}

impl ActivityList {
    pub fn items(&self) -> &[Activity] {
        match self {
            Self::Items(items) => items,
            _ => &[],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduleKind {
    Once,
    EveryHour,
    Daily,
    Weekly,
    Unknown(String),
}

impl ScheduleKind {
    fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "once" => Self::Once,
            "everyhour" => Self::EveryHour,
            "daily" => Self::Daily,
            "weekly" => Self::Weekly,
            _ => Self::Unknown(s.to_string()),
        }
    }
}

impl fmt::Display for ScheduleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Once => write!(f, "Once"),
            Self::EveryHour => write!(f, "EveryHour"),
            Self::Daily => write!(f, "Daily"),
            Self::Weekly => write!(f, "Weekly"),
            Self::Unknown(s) => write!(f, "{}", s),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schedule {
    pub kind: Option<ScheduleKind>,
    pub interval: Option<u64>,
}

/// The pipeline object, normalized
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineDocument {
    pub name: Option<String>,
    pub description: Option<String>,
    pub activities: ActivityList,
    pub schedule: Option<Schedule>,
}

impl PipelineDocument {
    /// Build from the parsed document root
    ///
    /// Uses the value under a top-level `pipeline` key when present,
    /// otherwise the root itself.
    pub fn from_value(root: &Value) -> Self {
        let pipeline = match root.get("pipeline") {
            Some(inner) if !inner.is_null() => {
                debug!("PipelineDocument::from_value: using pipeline key");
                inner
            }
            _ => {
                debug!("PipelineDocument::from_value: using document root");
                root
            }
        };

        let activities = match pipeline.get("activities") {
            None | Some(Value::Null) => ActivityList::Missing,
            Some(Value::Sequence(seq)) => ActivityList::Items(
                seq.iter()
                    .enumerate()
                    .map(|(i, v)| Activity::from_value(i + 1, v))
                    .collect(),
            ),
            Some(_) => ActivityList::NotAList,
        };

        let schedule = pipeline.get("schedule").and_then(|s| match s {
            Value::Mapping(map) => Some(Schedule {
                kind: text(map.get("type")).map(|t| ScheduleKind::parse(&t)),
                interval: map.get("interval").and_then(interval),
            }),
            _ => None,
        });

        Self {
            name: text(pipeline.get("name")),
            description: text(pipeline.get("description")),
            activities,
            schedule,
        }
    }
}

/// Non-empty scalar as text
fn text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn interval(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn lookup<'a>(map: &'a Mapping, path: &[&str]) -> Option<&'a Value> {
    let (first, rest) = path.split_first()?;
    let mut current = map.get(*first)?;
    for key in rest {
        current = current.get(*key)?;
    }
    Some(current)
}

/// First alias that yields a usable endpoint
fn resolve_endpoint(map: &Mapping, aliases: &[&[&str]]) -> Option<Endpoint> {
    aliases
        .iter()
        .find_map(|path| lookup(map, path).and_then(Endpoint::from_value))
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Sequence(seq)) => seq.iter().filter_map(|v| text(Some(v))).collect(),
        Some(v) => text(Some(v)).into_iter().collect(),
        None => Vec::new(),
    }
}

/// `[{dataset: ...}]` or bare strings
fn datasets(value: Option<&Value>) -> Vec<String> {
    let Some(Value::Sequence(seq)) = value else {
        return Vec::new();
    };
    seq.iter()
        .filter_map(|v| match v {
            Value::Mapping(map) => text(map.get("dataset")),
            other => text(Some(other)),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(yaml: &str) -> PipelineDocument {
        let value: Value = serde_yaml::from_str(yaml).unwrap();
        PipelineDocument::from_value(&value)
    }

    #[test]
    fn test_full_document() {
        let doc = parse(
            r#"
pipeline:
  name: Sales
  description: Loads sales
  activities:
    - name: Load
      type: copy
      source: { type: Lakehouse, path: Files/sales.csv }
      sink: { type: Lakehouse, path: Tables/sales_clean }
    - name: Agg
      type: Notebook
      notebookId: nb-agg-001
      inputs: [{ dataset: Tables/sales_clean }]
      outputs: [{ dataset: Tables/sales_by_region }]
      dependsOn: [Load]
    - name: Flow
      type: DATAFLOW
      dataflowId: df-1
  schedule: { type: Daily, interval: 1 }
"#,
        );

        assert_eq!(doc.name.as_deref(), Some("Sales"));
        assert_eq!(doc.description.as_deref(), Some("Loads sales"));
        let items = doc.activities.items();
        assert_eq!(items.len(), 3);
        assert!(matches!(&items[0].kind, ActivityKind::Copy { source: Some(_), sink: Some(_) }));
        assert_eq!(
            items[1].kind,
            ActivityKind::Notebook {
                notebook_id: Some("nb-agg-001".to_string()),
                inputs: vec!["Tables/sales_clean".to_string()],
                outputs: vec!["Tables/sales_by_region".to_string()],
            }
        );
        assert_eq!(items[1].depends_on, vec!["Load"]);
        assert_eq!(items[2].kind.type_name(), Some("Dataflow"));
        assert_eq!(
            doc.schedule,
            Some(Schedule {
                kind: Some(ScheduleKind::Daily),
                interval: Some(1)
            })
        );
    }

    #[test]
    fn test_legacy_aliases_are_resolved() {
        let doc = parse(
            r#"
pipeline:
  name: Legacy
  activities:
    - name: A
      type: Copy
      settings:
        source: { path: Tables/a }
        target: { path: Tables/b }
    - name: B
      type: Copy
      source: Tables/c
      target: { path: Tables/d }
"#,
        );
        let items = doc.activities.items();
        let ActivityKind::Copy { source, sink } = &items[0].kind else {
            panic!("expected copy");
        };
        assert_eq!(source.as_ref().unwrap().table_name(), Some("a"));
        assert_eq!(sink.as_ref().unwrap().table_name(), Some("b"));

        let ActivityKind::Copy { source, sink } = &items[1].kind else {
            panic!("expected copy");
        };
        assert_eq!(source.as_ref().unwrap().path.as_deref(), Some("Tables/c"));
        assert_eq!(sink.as_ref().unwrap().path.as_deref(), Some("Tables/d"));
    }

    #[test]
    fn test_root_without_pipeline_key() {
        let doc = parse("name: Bare\nactivities: []\n");
        assert_eq!(doc.name.as_deref(), Some("Bare"));
        assert_eq!(doc.activities, ActivityList::Items(vec![]));
    }

    #[test]
    fn test_activity_list_states() {
        assert_eq!(parse("pipeline:\n  name: X\n").activities, ActivityList::Missing);
        assert_eq!(parse("pipeline:\n  activities: nope\n").activities, ActivityList::NotAList);
    }

    #[test]
    fn test_non_mapping_activity() {
        let doc = parse("pipeline:\n  activities: [just-a-string]\n");
        let activity = &doc.activities.items()[0];
        assert_eq!(activity.name, None);
        assert_eq!(activity.kind, ActivityKind::Untyped);
        assert_eq!(activity.label(), "1");
    }

    #[test]
    fn test_table_name_extraction() {
        let ep = |p: &str| Endpoint {
            kind: None,
            path: Some(p.to_string()),
        };
        assert_eq!(ep("Tables/users").table_name(), Some("users"));
        assert_eq!(ep("/tables/users/part").table_name(), Some("users"));
        assert_eq!(ep("Files/users.csv").table_name(), None);
        assert!(ep("Files/users.csv").is_file_path());
    }

    #[test]
    fn test_schedule_kinds() {
        let doc = parse("pipeline:\n  schedule: { type: Monthly, interval: '2' }\n");
        let schedule = doc.schedule.unwrap();
        assert_eq!(schedule.kind, Some(ScheduleKind::Unknown("Monthly".to_string())));
        assert_eq!(schedule.interval, Some(2));
    }
}
