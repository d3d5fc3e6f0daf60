use std::{sync::Arc, time::Duration};

use shared::{
    protocol::{ControlRequest, TelemetrySnapshot},
    recipe::Action,
};
use tracing::{debug, info, warn};

use crate::{control_plane::ControlPlane, state::Interrupt, telemetry::TelemetryCache};

/// Runs substep actions: predicates are evaluated against the cached
/// telemetry, setters are posted to the control service.
pub struct ActionDispatcher {
    control: Arc<dyn ControlPlane>,
    telemetry: TelemetryCache,
    settle_factor: f64,
}

impl ActionDispatcher {
    pub fn new(
        control: Arc<dyn ControlPlane>,
        telemetry: TelemetryCache,
        settle_factor: f64,
    ) -> Self {
        Self {
            control,
            telemetry,
            settle_factor,
        }
    }

    /// `true` once the action is complete and the stepper may advance.
    pub async fn execute(&self, action: &Action, interrupt: &mut Interrupt) -> bool {
        match action {
            Action::Classify { model, label } => self.classify(model, label, interrupt).await,
            Action::SetClassifiers { value } => self.set_classifiers(value, interrupt).await,
            Action::SetFixedSetpoint { value } => self.set_fixed_setpoint(value, interrupt).await,
            Action::SetTemperatureTarget { value } => {
                self.set_temperature_target(value, interrupt).await
            }
            Action::SetHobOff => self.set_hob_off(interrupt).await,
        }
    }

    /// A positive reading only counts after it has been allowed to settle
    /// for `interval * settle_factor`. Missing results are a plain `false`.
    pub async fn classify(&self, model: &str, label: &str, interrupt: &mut Interrupt) -> bool {
        debug!(model, label, "classifying");
        let snapshot = self.telemetry.latest().await;
        if snapshot.classification(model, label) != Some(true) {
            return false;
        }

        let Some(settle) = self.settle_duration(&snapshot) else {
            warn!(
                model,
                label,
                interval = ?snapshot.interval(),
                "classifier returned true without a usable interval"
            );
            return false;
        };

        info!(
            model,
            label,
            settle_secs = settle.as_secs_f64(),
            "classifier returned true, settling"
        );
        if !interrupt.sleep(settle).await {
            info!(model, label, "settle wait interrupted");
            return false;
        }
        true
    }

    pub async fn set_classifiers(&self, value: &str, interrupt: &mut Interrupt) -> bool {
        let request = ControlRequest::SetClassifiers {
            value: value.to_string(),
        };
        self.send(request, interrupt).await
    }

    pub async fn set_fixed_setpoint(&self, value: &str, interrupt: &mut Interrupt) -> bool {
        let request = ControlRequest::SetFixedSetpoint {
            value: value.to_string(),
        };
        self.send(request, interrupt).await
    }

    pub async fn set_temperature_target(&self, value: &str, interrupt: &mut Interrupt) -> bool {
        let request = ControlRequest::SetTemperatureTarget {
            value: value.to_string(),
        };
        self.send(request, interrupt).await
    }

    pub async fn set_hob_off(&self, interrupt: &mut Interrupt) -> bool {
        self.send(ControlRequest::SetHobOff, interrupt).await
    }

    fn settle_duration(&self, snapshot: &TelemetrySnapshot) -> Option<Duration> {
        Duration::try_from_secs_f64(snapshot.interval()? * self.settle_factor).ok()
    }

    // Delivery is not confirmed; a failed or abandoned post still counts as
    // attempted. Only a stop request abandons an in-flight post.
    async fn send(&self, request: ControlRequest, interrupt: &mut Interrupt) -> bool {
        info!(command = request.name(), "dispatching command");
        tokio::select! {
            result = self.control.send_command(&request) => {
                if let Err(error) = result {
                    warn!("{} was not delivered: {error:#}", request.name());
                }
            }
            _ = interrupt.stop_requested() => {
                warn!(command = request.name(), "stop requested, abandoning command");
            }
        }
        true
    }
}

#[cfg(test)]
#[path = "tests/dispatcher_tests.rs"]
mod tests;
