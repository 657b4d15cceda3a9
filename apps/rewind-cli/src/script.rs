use std::path::Path;

use anyhow::Context;
use rewind_store::{Key, Operation, Store, StoreConfig, Value};
use serde::Deserialize;

/// A scripted sequence of store operations.
#[derive(Debug, Deserialize)]
pub struct Script {
    #[serde(default)]
    pub config: StoreConfig,
    /// Initial state. Defaults to an empty map.
    #[serde(default)]
    pub initial: Option<serde_json::Value>,
    pub steps: Vec<Step>,
}

#[derive(Debug, Deserialize)]
pub struct Step {
    pub op: String,
    #[serde(default)]
    pub args: Vec<serde_json::Value>,
}

/// What a single step produced.
#[derive(Debug, PartialEq)]
pub enum StepOutput {
    /// A navigation call; `false` when the pointer did not move.
    Moved(bool),
    Flag(bool),
    Cleared,
    Read(Option<Value>),
    Wrote(Value),
}

impl std::fmt::Display for StepOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Moved(true) => write!(f, "moved"),
            Self::Moved(false) => write!(f, "no move"),
            Self::Flag(flag) => write!(f, "{flag}"),
            Self::Cleared => write!(f, "history cleared"),
            Self::Read(Some(value)) => write!(f, "read {value}"),
            Self::Read(None) => write!(f, "read <missing>"),
            Self::Wrote(state) => write!(f, "wrote {state}"),
        }
    }
}

impl Script {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading script {}", path.display()))?;
        let script = serde_json::from_str(&text)
            .with_context(|| format!("parsing script {}", path.display()))?;
        Ok(script)
    }

    pub fn build_store(&self) -> Store {
        match &self.initial {
            Some(initial) => Store::with_config(initial.clone(), self.config),
            None => Store::from_value(Value::map(), self.config),
        }
    }
}

/// Run one step against `store`.
pub fn execute(store: &Store, step: &Step) -> anyhow::Result<StepOutput> {
    tracing::debug!(op = %step.op, args = step.args.len(), "executing step");
    let output = match step.op.as_str() {
        "stepBack" => StepOutput::Moved(store.step_back().is_some()),
        "stepForward" => StepOutput::Moved(store.step_forward().is_some()),
        "jumpToStart" => StepOutput::Moved(store.jump_to_start().is_some()),
        "jumpToEnd" => StepOutput::Moved(store.jump_to_end().is_some()),
        "hasNext" => StepOutput::Flag(store.has_next()),
        "hasPrevious" => StepOutput::Flag(store.has_previous()),
        "clearHistory" => {
            store.clear_history();
            StepOutput::Cleared
        }
        name => {
            let op = Operation::from_json(name, &step.args)?;
            let is_read = op.kind() == rewind_store::OperationKind::Read;
            let result = store.dispatch(op)?;
            if is_read {
                StepOutput::Read(result)
            } else {
                StepOutput::Wrote(result.unwrap_or_default())
            }
        }
    };
    Ok(output)
}

/// Parse a dotted path such as `user.tags.0`. Purely numeric segments are
/// list indices.
pub fn parse_watch_path(dotted: &str) -> Vec<Key> {
    if dotted.is_empty() {
        return Vec::new();
    }
    dotted
        .split('.')
        .map(|segment| match segment.parse::<usize>() {
            Ok(index) => Key::Index(index),
            Err(_) => Key::from(segment),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rewind_store::{StoreError, WritePolicy};
    use serde_json::json;
    use std::io::Write;

    fn step(op: &str, args: serde_json::Value) -> Step {
        Step {
            op: op.into(),
            args: serde_json::from_value(args).unwrap(),
        }
    }

    #[test]
    fn load_reads_config_and_steps() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "config": {{"write_policy": "append_detached"}},
                "initial": {{"counter": 0}},
                "steps": [{{"op": "set", "args": ["counter", 1]}}, {{"op": "stepBack"}}]
            }}"#
        )
        .unwrap();

        let script = Script::load(file.path()).unwrap();
        assert_eq!(script.config.write_policy, WritePolicy::AppendDetached);
        assert_eq!(script.steps.len(), 2);
        assert!(script.steps[1].args.is_empty());

        let store = script.build_store();
        assert_eq!(store.to_json(), json!({"counter": 0}));
    }

    #[test]
    fn load_defaults_to_empty_store() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"steps": []}}"#).unwrap();

        let script = Script::load(file.path()).unwrap();
        assert_eq!(script.config, StoreConfig::default());
        assert_eq!(script.build_store().to_json(), json!({}));
    }

    #[test]
    fn load_reports_bad_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        let err = Script::load(file.path()).unwrap_err();
        assert!(err.to_string().contains("parsing script"));
    }

    #[test]
    fn load_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = Script::load(&dir.path().join("absent.json")).unwrap_err();
        assert!(err.to_string().contains("reading script"));
    }

    #[test]
    fn execute_routes_navigation_and_operations() {
        let store = Store::new(json!({"counter": 0}));
        let wrote = execute(&store, &step("set", json!(["counter", 1]))).unwrap();
        assert_eq!(wrote, StepOutput::Wrote(Value::from_json(json!({"counter": 1}))));

        assert_eq!(execute(&store, &step("hasNext", json!([]))).unwrap(), StepOutput::Flag(false));
        assert_eq!(execute(&store, &step("stepBack", json!([]))).unwrap(), StepOutput::Moved(true));
        assert_eq!(execute(&store, &step("stepBack", json!([]))).unwrap(), StepOutput::Moved(false));
        assert_eq!(
            execute(&store, &step("get", json!(["counter"]))).unwrap(),
            StepOutput::Read(Some(Value::from(0)))
        );
        assert_eq!(execute(&store, &step("clearHistory", json!([]))).unwrap(), StepOutput::Cleared);
        assert_eq!(store.history_len(), 1);
    }

    #[test]
    fn execute_rejects_unknown_operation() {
        let store = Store::empty();
        let err = execute(&store, &step("frobnicate", json!([]))).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<StoreError>(),
            Some(StoreError::UnsupportedOperation(name)) if name == "frobnicate"
        ));
        assert_eq!(store.history_len(), 1);
    }

    #[test]
    fn watch_paths_split_on_dots() {
        assert_eq!(
            parse_watch_path("user.tags.0"),
            vec![Key::from("user"), Key::from("tags"), Key::Index(0)]
        );
        assert!(parse_watch_path("").is_empty());
    }

    #[test]
    fn step_output_display() {
        assert_eq!(StepOutput::Moved(false).to_string(), "no move");
        assert_eq!(StepOutput::Read(None).to_string(), "read <missing>");
    }
}
