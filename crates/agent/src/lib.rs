//! Conversational layer of the dealership assistant.
//!
//! The orchestrator turns a customer message into one of three response
//! shapes (`formatted`, `raw_data`, `info`) by routing it through three
//! reasoning capabilities:
//!
//! - an intent classifier (route labels, the interest field, full-listing check)
//! - a parameter extractor (search predicate over the fixed field schema)
//! - a response composer (natural-language answers in a chosen framing)
//!
//! The capabilities are traits (`capability`) so that tests can inject canned
//! doubles; `llm_capabilities` implements all three over an
//! OpenAI-compatible chat endpoint (`llm`).
//!
//! The model never decides what is in stock. Inventory matching and projection
//! are deterministic and live in `dealerbot-core`.

pub mod capability;
pub mod comparison;
pub mod llm;
pub mod llm_capabilities;
pub mod orchestrator;
pub mod parsing;
pub mod prompts;
pub mod router;

pub use capability::{
    Capabilities, CapabilityError, ComposeRequest, Framing, IntentClassifier, ParameterExtractor,
    ResponseComposer,
};
pub use comparison::{Comparison, VehicleComparator};
pub use llm::{LlmClient, OpenAiCompatibleClient};
pub use llm_capabilities::LlmCapabilities;
pub use orchestrator::{Orchestrator, QueryResponse, ResponseKind};
pub use router::Route;
