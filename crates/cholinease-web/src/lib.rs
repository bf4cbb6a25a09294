//! cholinease-web — Web front end for CholinEase.
//! Provides:
//!   - The SMILES entry form and prediction results page
//!   - A JSON prediction API
//!   - Pipeline progress over SSE
//!   - System status (Java check, model files)

pub mod router;
pub mod handlers;
pub mod state;
pub mod sse;
