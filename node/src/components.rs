//! Components
//!
//! Components are the building blocks of the consensus core. The admission components decide
//! which deploys and blocks may enter the DAG; the consensus component runs finality detection
//! and the era lifecycle on top of it.
pub mod block_validator;
pub mod consensus;
pub mod deploy_acceptor;
pub mod gas_cost_model;
