// Outbound engine events
//
// Published after the owning transaction commits. Delivery is fire-and-forget:
// a full or subscriber-less channel never fails the command that emitted it.

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::trace;
use uuid::Uuid;

use crate::models::Rail;
use crate::propositions::status::PropositionStatus;
use crate::settlement::disputes::DisputeStatus;

const CHANNEL_CAPACITY: usize = 1024;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event")]
pub enum EngineEvent {
    #[serde(rename = "proposition.updated")]
    PropositionUpdated { proposition_id: Uuid, status: PropositionStatus },

    #[serde(rename = "settlement.complete")]
    SettlementComplete {
        proposition_id: Uuid,
        winning_option_id: Uuid,
        fully_finalized: bool,
    },

    #[serde(rename = "wallet.updated")]
    WalletUpdated { user_id: String },

    #[serde(rename = "finalize.updated")]
    FinalizeUpdated { proposition_id: Uuid, rail: Rail, finalized: bool },

    #[serde(rename = "dispute.updated")]
    DisputeUpdated { dispute_id: Uuid, proposition_id: Uuid, status: DisputeStatus },
}

impl EngineEvent {
    pub fn name(&self) -> &'static str {
        match self {
            EngineEvent::PropositionUpdated { .. } => "proposition.updated",
            EngineEvent::SettlementComplete { .. } => "settlement.complete",
            EngineEvent::WalletUpdated { .. } => "wallet.updated",
            EngineEvent::FinalizeUpdated { .. } => "finalize.updated",
            EngineEvent::DisputeUpdated { .. } => "dispute.updated",
        }
    }
}

#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<EngineEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.sender.subscribe()
    }

    pub fn publish(&self, event: EngineEvent) {
        trace!(event = event.name(), "publish");
        // Err only means nobody is listening
        let _ = self.sender.send(event);
    }

    pub fn wallets_updated<I: IntoIterator<Item = String>>(&self, users: I) {
        for user_id in users {
            self.publish(EngineEvent::WalletUpdated { user_id });
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
