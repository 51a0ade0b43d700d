//! monit-stream entry point.
//!
//! Connects to the monitoring backend, keeps the stores in sync with the
//! live feed, re-fetches the roster and alerts after every (re)connect,
//! and logs clinically relevant events until Ctrl-C.

use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::EnvFilter;

use monit_stream::api::HttpApi;
use monit_stream::config::ClientConfig;
use monit_stream::domain::{EventKind, EventPayload};
use monit_stream::service::{AlertService, PatientService};
use monit_stream::stream::ConnectionState;
use monit_stream::WsMonitorClient;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = ClientConfig::from_env()?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if config.log_json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
    tracing::info!(ws = %config.ws_url, api = %config.api_base_url, "starting monit-stream");

    let client = WsMonitorClient::from_config(&config)?;
    register_subscribers(&client);

    // Backfill after every (re)connect; the stream does not replay missed events
    let backfill = tokio::spawn(backfill_on_open(
        client.connection().subscribe_state(),
        client.patients().clone(),
        client.alerts().clone(),
    ));
    client.connection().on_connectivity(|state| {
        tracing::info!(connected = state == ConnectionState::Open, state = %state, "connectivity");
    });

    client.start();

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutting down");
    client.shutdown().await;
    backfill.abort();

    Ok(())
}

fn register_subscribers(client: &WsMonitorClient) {
    let registry = client.subscribers();

    registry.subscribe(EventKind::Alert, |event| {
        if let EventPayload::Alert(alert) = &event.payload {
            tracing::warn!(
                alert_id = %alert.alert_id,
                patient_id = %alert.patient_id,
                severity = ?alert.severity,
                status = %alert.asserted_status(),
                message = %alert.message,
                "alert"
            );
        }
        Ok(())
    });

    registry.subscribe(EventKind::AgentLog, |event| {
        if let EventPayload::AgentLog(log) = &event.payload {
            tracing::info!(agent = ?log.agent, patient_id = ?log.patient_id, message = %log.message, "agent");
        }
        Ok(())
    });

    registry.subscribe(EventKind::System, |event| {
        if let EventPayload::System(notice) = &event.payload {
            tracing::info!(notice = %notice, "system");
        }
        Ok(())
    });

    registry.subscribe(EventKind::Vitals, |event| {
        if let EventPayload::Vitals(vitals) = &event.payload {
            tracing::debug!(
                patient_id = %vitals.patient_id,
                heart_rate = vitals.heart_rate,
                o2_saturation = vitals.o2_saturation,
                "vitals"
            );
        }
        Ok(())
    });
}

async fn backfill_on_open(
    mut states: tokio::sync::broadcast::Receiver<ConnectionState>,
    patients: PatientService<HttpApi>,
    alerts: AlertService<HttpApi>,
) {
    loop {
        match states.recv().await {
            Ok(ConnectionState::Open) => {
                match patients.fetch_patients().await {
                    Ok(roster) => tracing::info!(patients = roster.len(), "roster refreshed"),
                    Err(e) => tracing::warn!(error = %e, "roster refresh failed"),
                }
                match alerts.fetch_alerts(None).await {
                    Ok(list) => {
                        let active = alerts.active_count().await;
                        tracing::info!(alerts = list.len(), active, "alerts refreshed");
                    }
                    Err(e) => tracing::warn!(error = %e, "alert refresh failed"),
                }
            }
            Ok(_) => {}
            Err(RecvError::Lagged(skipped)) => {
                tracing::debug!(skipped, "state updates lagged");
            }
            Err(RecvError::Closed) => break,
        }
    }
}
