use super::*;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

type Reply = Result<Option<String>, BackendError>;

/// Backend that answers from a per-model script and records every call.
/// Models without a script (or with an exhausted one) report not found.
#[derive(Default)]
pub struct ScriptedBackend {
    replies: Mutex<HashMap<String, VecDeque<Reply>>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(self, model: &str, reply: Reply) -> Self {
        self.replies
            .lock()
            .expect("script mutex should lock")
            .entry(model.to_string())
            .or_default()
            .push_back(reply);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("calls mutex should lock").clone()
    }
}

#[async_trait]
impl BackendCaller for ScriptedBackend {
    async fn generate(&self, model: &str, _prompt: &str, _system_instruction: &str) -> Reply {
        self.calls.lock().expect("calls mutex should lock").push(model.to_string());
        self.replies
            .lock()
            .expect("script mutex should lock")
            .get_mut(model)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| Err(BackendError::ModelNotFound { model: model.to_string() }))
    }
}

pub fn models(names: &[&str]) -> Vec<String> {
    names.iter().map(ToString::to_string).collect()
}
