//! ---
//! rig_section: "04-client"
//! rig_subsection: "module"
//! rig_type: "source"
//! rig_scope: "code"
//! rig_description: "Runs the routine, then terminates every target."
//! rig_version: "v0.1.0"
//! rig_owner: "tbd"
//! ---
use std::any::Any;

use tokio::task::JoinError;
use tracing::{error, info, warn};

use crate::plan::ClientPlan;
use crate::routine::RoutineCatalog;
use crate::stubs::StubSet;
use crate::summary::ClientSummary;
use crate::terminate::{terminate_endpoint, terminate_stub, TerminateOrigin};

/// Execute one client run.
///
/// Routine failures, panics included, end up in `routine_error`. The
/// terminate step runs for every target regardless.
pub async fn drive(plan: &ClientPlan, routines: &RoutineCatalog) -> ClientSummary {
    let mut summary = ClientSummary {
        routine: plan.routine.clone(),
        ..ClientSummary::default()
    };

    let stubs = match StubSet::from_plan(plan) {
        Ok(stubs) => stubs,
        Err(err) => {
            error!(error = %err, "unable to build stubs; terminating by address");
            summary.routine_error = plan.routine.as_ref().map(|_| err.to_string());
            for target in &plan.targets {
                let outcome = terminate_endpoint(
                    &target.name,
                    &plan.connect_host,
                    target.port,
                    plan.terminate_timeout,
                    TerminateOrigin::Client,
                )
                .await;
                summary.terminations.push(outcome);
            }
            return summary;
        }
    };

    if let Some(name) = &plan.routine {
        summary.routine_error = run_routine(name, &stubs, routines).await;
    }

    for stub in stubs.iter() {
        let outcome = terminate_stub(stub, plan.terminate_timeout).await;
        summary.terminations.push(outcome);
    }
    summary
}

async fn run_routine(name: &str, stubs: &StubSet, routines: &RoutineCatalog) -> Option<String> {
    let Some(routine) = routines.get(name) else {
        warn!(routine = %name, "routine is not registered with this driver");
        return Some(format!("unknown routine '{name}'"));
    };

    info!(routine = %name, services = stubs.len(), "running test routine");
    let task_stubs = stubs.clone();
    let handle = tokio::spawn(async move { routine.run(&task_stubs).await });
    match handle.await {
        Ok(Ok(())) => {
            info!(routine = %name, "test routine finished");
            None
        }
        Ok(Err(err)) => {
            warn!(routine = %name, error = %format!("{err:#}"), "test routine failed");
            Some(format!("{err:#}"))
        }
        Err(join) => {
            let message = join_message(join);
            error!(routine = %name, error = %message, "test routine aborted");
            Some(message)
        }
    }
}

fn join_message(err: JoinError) -> String {
    if err.is_panic() {
        format!("routine panicked: {}", panic_text(err.into_panic()))
    } else {
        "routine task was cancelled".to_owned()
    }
}

fn panic_text(payload: Box<dyn Any + Send>) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        (*text).to_owned()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn panic_payloads_become_messages() {
        let err = tokio::spawn(async { panic!("stub exploded") })
            .await
            .unwrap_err();
        assert_eq!(join_message(err), "routine panicked: stub exploded");

        let err = tokio::spawn(async { std::panic::panic_any(7_u8) })
            .await
            .unwrap_err();
        assert_eq!(join_message(err), "routine panicked: non-string panic payload");
    }
}
