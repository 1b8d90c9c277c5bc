use std::time::Duration;

use crossbeam::channel::Receiver;
use tokio::sync::mpsc;

use crate::actor::hub::HubActor;
use crate::actor::messages::HubMsg;

/// How often the shutdown signal is checked.
const SHUTDOWN_POLL: Duration = Duration::from_millis(100);

/// Longest the hub gets to close its connections.
const SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

/// Run the hub until it stops on its own or shutdown is signalled.
pub(super) async fn run_hub(
    hub: HubActor,
    hub_tx: mpsc::Sender<HubMsg>,
    shutdown_rx: Option<Receiver<()>>,
) {
    let hub_handle = tokio::spawn(hub.run());

    let Some(rx) = shutdown_rx else {
        let _ = hub_handle.await;
        return;
    };

    loop {
        if rx.try_recv().is_ok() {
            crate::debug!("actor"; "shutdown signal received");
            break;
        }
        if hub_handle.is_finished() {
            return;
        }
        tokio::time::sleep(SHUTDOWN_POLL).await;
    }

    crate::debug!("actor"; "sending shutdown to hub");
    let _ = hub_tx.send(HubMsg::Shutdown).await;
    let _ = tokio::time::timeout(SHUTDOWN_GRACE, hub_handle).await;
}
