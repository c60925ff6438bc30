//! Action dispatch and the visibility guard

use std::sync::Arc;
use std::time::Duration;

use rehearse_core_types::EventType;
use rehearse_dom::{
    ActionDescriptor, DocumentView, NodeHandle, Transport, TransportError,
};
use tracing::{debug, warn};

use crate::errors::StepError;

/// Perform the concrete action for one step on an already-resolved node.
///
/// A computed-hidden node is forced visible for the duration of the
/// action and restored on a short delay afterwards; some interaction
/// frameworks refuse events on elements not currently painted.
pub async fn perform_action(
    document: &Arc<dyn DocumentView>,
    transport: &Arc<dyn Transport>,
    handle: &NodeHandle,
    event: EventType,
    value: Option<&str>,
    action_timeout: Duration,
    restore_delay: Duration,
) -> Result<(), StepError> {
    let snapshot = document
        .snapshot(handle)
        .await
        .map_err(|e| StepError::Document(e.to_string()))?
        .ok_or_else(|| StepError::ActionFailed(format!("target {} is detached", handle)))?;

    let forced = document
        .force_visible(handle)
        .await
        .map_err(|e| StepError::Document(e.to_string()))?;
    if forced {
        debug!(node = %handle, "hidden element forced visible for the action");
    }

    let dispatch = dispatch_event(
        document,
        transport,
        handle,
        event,
        value,
        snapshot.in_form,
        action_timeout,
    )
    .await;

    if forced {
        // Roll the override back after the triggered notifications have
        // had a moment to settle, without holding up the step.
        let document = document.clone();
        let handle = handle.clone();
        tokio::spawn(async move {
            tokio::time::sleep(restore_delay).await;
            if let Err(e) = document.clear_visibility_override(&handle).await {
                warn!(node = %handle, error = %e, "failed to restore visibility override");
            }
        });
    }

    dispatch
}

async fn dispatch_event(
    document: &Arc<dyn DocumentView>,
    transport: &Arc<dyn Transport>,
    handle: &NodeHandle,
    event: EventType,
    value: Option<&str>,
    in_form: bool,
    action_timeout: Duration,
) -> Result<(), StepError> {
    let descriptor = match event {
        EventType::Click => {
            document
                .scroll_into_view(handle)
                .await
                .map_err(|e| StepError::Document(e.to_string()))?;
            ActionDescriptor::Click
        }
        EventType::Input => {
            let value = value.unwrap_or_default();
            document
                .set_value_bypass(handle, value)
                .await
                .map_err(|e| StepError::Document(e.to_string()))?;
            ActionDescriptor::Input {
                value: value.to_string(),
            }
        }
        EventType::Enter => {
            if let Some(value) = value {
                document
                    .set_value_bypass(handle, value)
                    .await
                    .map_err(|e| StepError::Document(e.to_string()))?;
            }
            ActionDescriptor::PressEnter {
                submit_form: in_form,
            }
        }
        // Navigation is the page-load collaborator's concern.
        EventType::Open => return Ok(()),
    };

    let outcome = transport
        .send(handle, &descriptor, action_timeout)
        .await
        .map_err(|e| match e {
            TransportError::Unavailable(reason) => StepError::TransportUnavailable(reason),
            TransportError::Timeout(ms) => {
                StepError::ActionFailed(format!("transport timed out after {}ms", ms))
            }
            TransportError::Failed(reason) => StepError::ActionFailed(reason),
        })?;

    if !outcome.ok {
        let detail = outcome
            .detail
            .map(|d| d.to_string())
            .unwrap_or_else(|| "remote side reported failure".to_string());
        return Err(StepError::ActionFailed(detail));
    }
    Ok(())
}
