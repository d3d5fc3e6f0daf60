use std::{collections::VecDeque, sync::Arc};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::json;
use shared::{
    protocol::{ControlRequest, TelemetrySnapshot},
    recipe::RecipeDefinition,
};
use tokio::sync::Mutex;

use crate::control_plane::ControlPlane;

/// In-memory control service. Serves the scripted snapshots in order, then
/// keeps repeating the last one.
pub(crate) struct ScriptedControlPlane {
    script: Mutex<VecDeque<TelemetrySnapshot>>,
    last: Mutex<TelemetrySnapshot>,
    meta_failures_left: Mutex<u32>,
    fail_commands: bool,
    hang_commands: bool,
    pub(crate) commands: Arc<Mutex<Vec<ControlRequest>>>,
    pub(crate) meta_calls: Arc<Mutex<u32>>,
}

impl ScriptedControlPlane {
    pub(crate) fn new(script: Vec<TelemetrySnapshot>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            last: Mutex::new(TelemetrySnapshot::default()),
            meta_failures_left: Mutex::new(0),
            fail_commands: false,
            hang_commands: false,
            commands: Arc::new(Mutex::new(Vec::new())),
            meta_calls: Arc::new(Mutex::new(0)),
        }
    }

    pub(crate) fn constant(snapshot: TelemetrySnapshot) -> Self {
        Self::new(vec![snapshot])
    }

    pub(crate) fn unreachable() -> Self {
        let mut control = Self::new(Vec::new()).failing_commands();
        control.meta_failures_left = Mutex::new(u32::MAX);
        control
    }

    pub(crate) fn failing_meta(mut self, times: u32) -> Self {
        self.meta_failures_left = Mutex::new(times);
        self
    }

    pub(crate) fn failing_commands(mut self) -> Self {
        self.fail_commands = true;
        self
    }

    /// Commands are recorded, then never answered.
    pub(crate) fn hanging_commands(mut self) -> Self {
        self.hang_commands = true;
        self
    }

    pub(crate) async fn set_meta_failures(&self, times: u32) {
        *self.meta_failures_left.lock().await = times;
    }

    pub(crate) async fn sent(&self) -> Vec<ControlRequest> {
        self.commands.lock().await.clone()
    }
}

#[async_trait]
impl ControlPlane for ScriptedControlPlane {
    async fn latest_meta(&self) -> Result<TelemetrySnapshot> {
        *self.meta_calls.lock().await += 1;

        let mut failures_left = self.meta_failures_left.lock().await;
        if *failures_left > 0 {
            *failures_left -= 1;
            return Err(anyhow!("control service unreachable"));
        }
        drop(failures_left);

        let mut last = self.last.lock().await;
        if let Some(next) = self.script.lock().await.pop_front() {
            *last = next;
        }
        Ok(last.clone())
    }

    async fn send_command(&self, request: &ControlRequest) -> Result<()> {
        self.commands.lock().await.push(request.clone());
        if self.hang_commands {
            std::future::pending::<()>().await;
        }
        if self.fail_commands {
            return Err(anyhow!("control service unreachable"));
        }
        Ok(())
    }
}

pub(crate) fn classification(
    model: &str,
    label: &str,
    boolean: bool,
    interval: f64,
) -> TelemetrySnapshot {
    TelemetrySnapshot::from_json_value(json!({
        "type": "meta",
        "attributes": {
            "interval": interval,
            "classification_data": {
                model: { label: { "boolean": boolean } }
            }
        }
    }))
    .expect("snapshot")
}

pub(crate) fn recipe(raw: &str) -> RecipeDefinition {
    RecipeDefinition::from_toml_str(raw).expect("recipe")
}

pub(crate) fn set_classifiers(value: &str) -> ControlRequest {
    ControlRequest::SetClassifiers {
        value: value.to_string(),
    }
}
