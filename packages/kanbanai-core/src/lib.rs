/// KanbanAI board core: board state, optimistic mutations, drag coordination.
///
/// Nothing here performs I/O. The network is reached through `store::RemoteStore`
/// and the view through `host::BoardHost`; `kanbanai-client` provides both.
pub mod drag;
pub mod engine;
pub mod error;
pub mod host;
pub mod state;
pub mod store;
pub mod sync;
pub mod types;
pub mod validate;

pub use engine::{DeleteOutcome, MutationEngine};
pub use error::{EngineError, StoreError, ValidationError};
pub use state::{BoardState, Mutation};
