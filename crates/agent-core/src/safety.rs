//! Safety Gate
//!
//! Tool calls declare whether they mutate a resource through the
//! `modifies_resource` argument. Mutating calls need explicit confirmation
//! before they run.

use serde_json::Value;

/// Argument carrying the mutation declaration
pub const MODIFIES_RESOURCE: &str = "modifies_resource";

/// Argument naming the affected resource
pub const MODIFIED_RESOURCE_NAME: &str = "modified_resource_name";

const DEFAULT_RESOURCE_NAME: &str = "This resource";

/// What a tool call declares about its side effects
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mutation {
    Yes,
    No,
    Unknown,
    /// Flag present with a value outside yes/no/unknown (e.g. a boolean)
    Unrecognized,
    /// Flag absent or arguments not a mapping
    Undeclared,
}

impl Mutation {
    /// Read the declaration from decoded arguments
    pub fn from_args(args: &Value) -> Self {
        let Some(flag) = args.get(MODIFIES_RESOURCE) else {
            return Self::Undeclared;
        };
        let Some(flag) = flag.as_str() else {
            return Self::Unrecognized;
        };

        match flag.trim().to_lowercase().as_str() {
            "yes" => Self::Yes,
            "no" => Self::No,
            "unknown" => Self::Unknown,
            _ => Self::Unrecognized,
        }
    }
}

/// User's answer to a confirmation prompt
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Confirmation {
    /// Proceed with this call only
    Proceed,
    /// Proceed and stop asking for the rest of the session
    ProceedAlways,
    /// Abort the whole run
    Abort,
}

/// Source of confirmations (terminal prompt, scripted answers in tests)
pub trait Confirmer: Send + Sync {
    fn confirm(&self, resource_name: &str) -> Confirmation;
}

/// Gate verdict for one tool call
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verdict {
    Proceed,
    Abort,
}

impl Verdict {
    pub const fn is_proceed(self) -> bool {
        matches!(self, Self::Proceed)
    }
}

/// Confirmation checkpoint for resource-mutating tool calls
pub struct SafetyGate {
    confirmer: Box<dyn Confirmer>,
    skip_confirmation: bool,
    confirm_unknown: bool,
}

impl SafetyGate {
    pub fn new(confirmer: Box<dyn Confirmer>) -> Self {
        Self {
            confirmer,
            skip_confirmation: false,
            confirm_unknown: false,
        }
    }

    /// Also prompt when a call declares its effect as unknown
    #[must_use]
    pub fn confirm_unknown(mut self, enabled: bool) -> Self {
        self.confirm_unknown = enabled;
        self
    }

    /// Start with confirmations already waived
    #[must_use]
    pub fn skip_confirmation(mut self, skip: bool) -> Self {
        self.skip_confirmation = skip;
        self
    }

    /// Whether the sticky "don't ask again" flag is set
    pub const fn is_skipping(&self) -> bool {
        self.skip_confirmation
    }

    /// Clear the sticky flag
    pub const fn reset(&mut self) {
        self.skip_confirmation = false;
    }

    /// Decide whether a call with these arguments may run
    pub fn check(&mut self, args: &Value) -> Verdict {
        let needs_confirmation = match Mutation::from_args(args) {
            Mutation::Yes | Mutation::Unrecognized => true,
            Mutation::Unknown => self.confirm_unknown,
            Mutation::No | Mutation::Undeclared => false,
        };

        if !needs_confirmation || self.skip_confirmation {
            return Verdict::Proceed;
        }

        let resource = args
            .get(MODIFIED_RESOURCE_NAME)
            .and_then(Value::as_str)
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(DEFAULT_RESOURCE_NAME);

        match self.confirmer.confirm(resource) {
            Confirmation::Proceed => Verdict::Proceed,
            Confirmation::ProceedAlways => {
                tracing::info!("Confirmation waived for the rest of the session");
                self.skip_confirmation = true;
                Verdict::Proceed
            }
            Confirmation::Abort => {
                tracing::info!(resource, "Modification declined, aborting run");
                Verdict::Abort
            }
        }
    }
}

impl std::fmt::Debug for SafetyGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SafetyGate")
            .field("skip_confirmation", &self.skip_confirmation)
            .field("confirm_unknown", &self.confirm_unknown)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    /// Replays answers and records the resource names it was asked about
    struct Scripted {
        answers: Mutex<Vec<Confirmation>>,
        asked: Arc<Mutex<Vec<String>>>,
    }

    impl Scripted {
        fn new(answers: Vec<Confirmation>) -> (Self, Arc<Mutex<Vec<String>>>) {
            let asked = Arc::new(Mutex::new(Vec::new()));
            let confirmer = Self {
                answers: Mutex::new(answers.into_iter().rev().collect()),
                asked: Arc::clone(&asked),
            };
            (confirmer, asked)
        }
    }

    impl Confirmer for Scripted {
        fn confirm(&self, resource_name: &str) -> Confirmation {
            self.asked.lock().unwrap().push(resource_name.to_string());
            self.answers.lock().unwrap().pop().expect("unexpected prompt")
        }
    }

    #[test]
    fn test_mutation_parsing() {
        assert_eq!(Mutation::from_args(&json!({"modifies_resource": "YES "})), Mutation::Yes);
        assert_eq!(Mutation::from_args(&json!({"modifies_resource": "no"})), Mutation::No);
        assert_eq!(
            Mutation::from_args(&json!({"modifies_resource": "unknown"})),
            Mutation::Unknown
        );
        assert_eq!(
            Mutation::from_args(&json!({"modifies_resource": true})),
            Mutation::Unrecognized
        );
        assert_eq!(
            Mutation::from_args(&json!({"modifies_resource": "maybe"})),
            Mutation::Unrecognized
        );
        assert_eq!(Mutation::from_args(&json!({"command": "x"})), Mutation::Undeclared);
        assert_eq!(Mutation::from_args(&json!("raw text")), Mutation::Undeclared);
    }

    #[test]
    fn test_non_mutating_never_prompts() {
        let (confirmer, asked) = Scripted::new(vec![]);
        let mut gate = SafetyGate::new(Box::new(confirmer));

        assert_eq!(gate.check(&json!({"modifies_resource": "no"})), Verdict::Proceed);
        assert_eq!(gate.check(&json!({"modifies_resource": "unknown"})), Verdict::Proceed);
        assert_eq!(gate.check(&json!({})), Verdict::Proceed);
        assert!(asked.lock().unwrap().is_empty());
    }

    #[test]
    fn test_unrecognized_flag_requires_confirmation() {
        let (confirmer, asked) = Scripted::new(vec![Confirmation::Abort, Confirmation::Abort]);
        let mut gate = SafetyGate::new(Box::new(confirmer));

        assert_eq!(gate.check(&json!({"modifies_resource": true})), Verdict::Abort);
        assert_eq!(gate.check(&json!({"modifies_resource": "perhaps"})), Verdict::Abort);
        assert_eq!(asked.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_abort() {
        let (confirmer, asked) = Scripted::new(vec![Confirmation::Abort]);
        let mut gate = SafetyGate::new(Box::new(confirmer));

        let args = json!({"modifies_resource": "yes", "modified_resource_name": "my-bucket"});
        assert_eq!(gate.check(&args), Verdict::Abort);
        assert_eq!(*asked.lock().unwrap(), vec!["my-bucket".to_string()]);
        assert!(!gate.is_skipping());
    }

    #[test]
    fn test_proceed_once_asks_again() {
        let (confirmer, asked) =
            Scripted::new(vec![Confirmation::Proceed, Confirmation::Proceed]);
        let mut gate = SafetyGate::new(Box::new(confirmer));

        let args = json!({"modifies_resource": "yes"});
        assert!(gate.check(&args).is_proceed());
        assert!(gate.check(&args).is_proceed());
        assert_eq!(asked.lock().unwrap().len(), 2);
        assert_eq!(asked.lock().unwrap()[0], "This resource");
    }

    #[test]
    fn test_proceed_always_is_sticky() {
        let (confirmer, asked) = Scripted::new(vec![Confirmation::ProceedAlways]);
        let mut gate = SafetyGate::new(Box::new(confirmer));

        let args = json!({"modifies_resource": "yes"});
        assert!(gate.check(&args).is_proceed());
        assert!(gate.is_skipping());
        assert!(gate.check(&args).is_proceed());
        assert_eq!(asked.lock().unwrap().len(), 1);

        gate.reset();
        assert!(!gate.is_skipping());
    }

    #[test]
    fn test_confirm_unknown_policy() {
        let (confirmer, asked) = Scripted::new(vec![Confirmation::Abort]);
        let mut gate = SafetyGate::new(Box::new(confirmer)).confirm_unknown(true);

        assert_eq!(gate.check(&json!({"modifies_resource": "unknown"})), Verdict::Abort);
        assert_eq!(asked.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_preset_skip() {
        let (confirmer, asked) = Scripted::new(vec![]);
        let mut gate = SafetyGate::new(Box::new(confirmer)).skip_confirmation(true);

        assert!(gate.check(&json!({"modifies_resource": "yes"})).is_proceed());
        assert!(asked.lock().unwrap().is_empty());
    }
}
