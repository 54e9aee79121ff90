use crate::{AddNodeOutcome, NodeRegistry, PeerfsError, Result};
use std::sync::Arc;

/// Register and deregister fleet peers.
#[derive(Clone)]
pub struct NodeMembershipOperation {
    registry: Arc<NodeRegistry>,
}

#[derive(Debug, Clone)]
pub struct AddNodeOperationRequest {
    pub address: String,
}

#[derive(Debug, Clone)]
pub struct RemoveNodeOperationRequest {
    pub address: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeMembershipOperationOutcome {
    Added { address: String },
    AlreadyRegistered { address: String },
    /// Reported whether or not the address was registered.
    Removed { address: String },
}

impl NodeMembershipOperationOutcome {
    pub fn address(&self) -> &str {
        match self {
            Self::Added { address }
            | Self::AlreadyRegistered { address }
            | Self::Removed { address } => address,
        }
    }
}

impl NodeMembershipOperation {
    pub fn new(registry: Arc<NodeRegistry>) -> Self {
        Self { registry }
    }

    pub async fn run_add(
        &self,
        request: AddNodeOperationRequest,
    ) -> Result<NodeMembershipOperationOutcome> {
        let address = normalize_address(&request.address)?;

        match self.registry.add_node(&address)? {
            AddNodeOutcome::Added => {
                tracing::info!("registered node {}", address);
                Ok(NodeMembershipOperationOutcome::Added { address })
            }
            AddNodeOutcome::AlreadyRegistered => {
                tracing::debug!("node {} was already registered", address);
                Ok(NodeMembershipOperationOutcome::AlreadyRegistered { address })
            }
        }
    }

    pub async fn run_remove(
        &self,
        request: RemoveNodeOperationRequest,
    ) -> Result<NodeMembershipOperationOutcome> {
        let address = normalize_address(&request.address)?;

        if self.registry.remove_node(&address)? {
            tracing::info!("deregistered node {}", address);
        } else {
            tracing::debug!("node {} was not registered", address);
        }

        Ok(NodeMembershipOperationOutcome::Removed { address })
    }
}

fn normalize_address(address: &str) -> Result<String> {
    let trimmed = address.trim();
    if trimmed.is_empty() {
        return Err(PeerfsError::InvalidRequest(
            "node address cannot be empty".to_string(),
        ));
    }
    Ok(trimmed.to_string())
}
