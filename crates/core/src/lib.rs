pub mod config;
pub mod domain;
pub mod errors;
pub mod inventory;

pub use domain::chat::{ChatMessage, FeedbackKind, FeedbackStats};
pub use domain::field::{FieldPath, IDENTITY_FIELDS, SCHEMA_FIELDS};
pub use domain::session::{ContextUpdate, Session, SessionContext, SessionId, Turn};
pub use domain::vehicle::{VehicleRecord, UNKNOWN};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use inventory::{
    Catalog, FilterOutcome, Inventory, InventoryError, InventoryStore, Projection, SearchPredicate,
};
