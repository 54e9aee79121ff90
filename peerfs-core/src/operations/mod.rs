pub mod clone_file;
pub mod delete_file;
pub mod ingest_file;
pub mod node_membership;
pub mod query_hash;

#[cfg(test)]
pub(crate) mod test_support;

pub use clone_file::{CloneFileOperation, CloneFileOperationOutcome, CloneFileOperationRequest};
pub use delete_file::{
    DeleteFileOperation, DeleteFileOperationOutcome, DeleteFileOperationRequest,
};
pub use ingest_file::{
    IngestFileOperation, IngestFileOperationOutcome, IngestFileOperationRequest,
};
pub use node_membership::{
    AddNodeOperationRequest, NodeMembershipOperation, NodeMembershipOperationOutcome,
    RemoveNodeOperationRequest,
};
pub use query_hash::{QueryHashOperation, QueryHashOperationOutcome, QueryHashOperationRequest};
