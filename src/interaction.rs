use std::collections::HashMap;
use std::fmt;

/// Result of the most recent call of a function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success(String),
    Failed(String),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success(value) => write!(f, "{}", value),
            Self::Failed(message) => write!(f, "Error: {}", message),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FunctionState {
    inputs: Vec<String>,
    pub outcome: Option<Outcome>,
    pub busy: bool,
}

impl FunctionState {
    pub fn inputs(&self) -> &[String] {
        &self.inputs
    }

    /// Input at `index`, empty when it was never set.
    pub fn input(&self, index: usize) -> &str {
        self.inputs.get(index).map(String::as_str).unwrap_or("")
    }
}

/// Per-function inputs, outcomes and in-flight flags, keyed by function key.
#[derive(Debug, Clone, Default)]
pub struct InteractionStore {
    states: HashMap<String, FunctionState>,
}

impl InteractionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&FunctionState> {
        self.states.get(key)
    }

    /// Inputs padded with empty strings up to `arity` so they line up with
    /// the declared parameters.
    pub fn inputs_for(&self, key: &str, arity: usize) -> Vec<String> {
        let mut inputs = self
            .states
            .get(key)
            .map(|s| s.inputs.clone())
            .unwrap_or_default();
        if inputs.len() < arity {
            inputs.resize(arity, String::new());
        }
        inputs
    }

    pub fn set_input(&mut self, key: &str, index: usize, value: impl Into<String>) {
        let state = self.entry(key);
        if state.inputs.len() <= index {
            state.inputs.resize(index + 1, String::new());
        }
        state.inputs[index] = value.into();
    }

    pub fn record_outcome(&mut self, key: &str, outcome: Outcome) {
        self.entry(key).outcome = Some(outcome);
    }

    pub fn set_busy(&mut self, key: &str, busy: bool) {
        self.entry(key).busy = busy;
    }

    pub fn is_busy(&self, key: &str) -> bool {
        self.states.get(key).is_some_and(|s| s.busy)
    }

    /// Drop state for functions that are no longer part of the document.
    pub fn retain_keys<'a>(&mut self, keys: impl IntoIterator<Item = &'a str>) {
        let keep: Vec<&str> = keys.into_iter().collect();
        self.states.retain(|key, _| keep.contains(&key.as_str()));
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    fn entry(&mut self, key: &str) -> &mut FunctionState {
        self.states.entry(key.to_string()).or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_input_fills_gaps() {
        let mut store = InteractionStore::new();
        store.set_input("transfer", 2, "100");

        let state = store.get("transfer").unwrap();
        assert_eq!(state.inputs(), &["", "", "100"]);
        assert_eq!(state.input(5), "");
        assert!(!state.busy);
        assert!(state.outcome.is_none());

        store.set_input("transfer", 0, "0xabc");
        assert_eq!(store.get("transfer").unwrap().inputs(), &["0xabc", "", "100"]);
    }

    #[test]
    fn test_inputs_for_pads_to_arity() {
        let mut store = InteractionStore::new();
        assert_eq!(store.inputs_for("approve", 2), vec!["", ""]);

        store.set_input("approve", 0, "0x01");
        assert_eq!(store.inputs_for("approve", 2), vec!["0x01", ""]);
    }

    #[test]
    fn test_outcome_overwrites() {
        let mut store = InteractionStore::new();
        store.record_outcome("owner", Outcome::Failed("reverted".to_string()));
        store.record_outcome("owner", Outcome::Success("0x1234".to_string()));

        let outcome = store.get("owner").unwrap().outcome.clone().unwrap();
        assert!(outcome.is_success());
        assert_eq!(outcome.to_string(), "0x1234");
    }

    #[test]
    fn test_failed_outcome_display() {
        let outcome = Outcome::Failed("execution reverted".to_string());
        assert_eq!(outcome.to_string(), "Error: execution reverted");
    }

    #[test]
    fn test_busy_flag() {
        let mut store = InteractionStore::new();
        assert!(!store.is_busy("mint"));
        store.set_busy("mint", true);
        assert!(store.is_busy("mint"));
        store.set_busy("mint", false);
        assert!(!store.is_busy("mint"));
    }

    #[test]
    fn test_retain_keys_drops_stale_entries() {
        let mut store = InteractionStore::new();
        store.set_input("a", 0, "1");
        store.set_input("b", 0, "2");
        store.retain_keys(["b", "c"]);

        assert!(store.get("a").is_none());
        assert_eq!(store.get("b").unwrap().input(0), "2");
        assert_eq!(store.len(), 1);
    }
}
