//! Model training module
//!
//! Provides training for window-to-next-value sequence models:
//! - Elman recurrent network trained with backpropagation through time
//! - Feed-forward network over the whole window
//! - Linear autoregression
//!
//! plus the optimizers, per-key locking and cancellation the training loop
//! relies on.

mod cancel;
mod config;
mod engine;
mod linear;
mod locks;
mod mlp;
mod model;
mod optimizer;
mod recurrent;

pub use cancel::CancellationToken;
pub use config::TrainingConfig;
pub use engine::{Trainer, TrainingReport};
pub use linear::LinearAutoregressor;
pub use locks::{KeyGuard, KeyLocks, LockPolicy};
pub use mlp::WindowMlp;
pub use model::{init_model, restore_model, Activation, Architecture, ModelParameters, SequenceModel};
pub use optimizer::{Optimizer, OptimizerKind};
pub use recurrent::RecurrentNetwork;
