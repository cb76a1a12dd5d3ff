//! Advisor plugin wiring the active provider, the pending stage, and telemetry.
use std::sync::Arc;

use bevy::prelude::*;

use crate::core::FairguardSettings;

use super::{
    broker::{advisor_from_env, ConsequenceAdvisor},
    events::{
        ConsequenceDecision, ConsequenceFailedEvent, ConsequenceRequested,
        ConsequenceSettledEvent, ConsequenceSuggestedEvent,
    },
    pending::PendingConsequence,
    systems::{
        apply_consequence_decisions, cancel_consequence_on_selection, poll_consequence_tasks,
        start_consequence_requests, ActiveConsequenceAdvisor, AdvisorTasks,
    },
    telemetry::{
        flush_advisor_telemetry_log, record_advisor_telemetry, AdvisorTelemetry,
        AdvisorTelemetryLog,
    },
};

/// Uses the environment-configured advisor unless one is injected.
#[derive(Default, Clone)]
pub struct AdvisorPlugin {
    advisor: Option<Arc<dyn ConsequenceAdvisor>>,
}

impl AdvisorPlugin {
    #[cfg(test)]
    pub fn with_advisor(advisor: Arc<dyn ConsequenceAdvisor>) -> Self {
        Self {
            advisor: Some(advisor),
        }
    }
}

impl Plugin for AdvisorPlugin {
    fn build(&self, app: &mut App) {
        let settings = app
            .world()
            .get_resource::<FairguardSettings>()
            .cloned()
            .unwrap_or_default();

        let advisor = self
            .advisor
            .clone()
            .unwrap_or_else(|| Arc::from(advisor_from_env()));
        let telemetry_log =
            AdvisorTelemetryLog::new(&settings.telemetry_log_path).with_advisor(advisor.as_ref());

        app.insert_resource(ActiveConsequenceAdvisor::new(advisor))
            .insert_resource(AdvisorTelemetry::new(settings.telemetry_capacity))
            .insert_resource(telemetry_log)
            .init_resource::<PendingConsequence>()
            .init_resource::<AdvisorTasks>()
            .add_message::<ConsequenceRequested>()
            .add_message::<ConsequenceDecision>()
            .add_message::<ConsequenceSuggestedEvent>()
            .add_message::<ConsequenceFailedEvent>()
            .add_message::<ConsequenceSettledEvent>()
            .add_systems(Startup, log_advisor_provider)
            .add_systems(
                Update,
                (
                    start_consequence_requests,
                    poll_consequence_tasks,
                    apply_consequence_decisions,
                    cancel_consequence_on_selection,
                    record_advisor_telemetry,
                    flush_advisor_telemetry_log,
                )
                    .chain(),
            );
    }
}

fn log_advisor_provider(active: Res<ActiveConsequenceAdvisor>) {
    let advisor = active.advisor();
    info!(
        "AdvisorPlugin initialised with provider: {} ({})",
        advisor.provider_kind(),
        advisor.connection_state().label()
    );
}
