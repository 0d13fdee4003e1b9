//! Data preprocessing module
//!
//! Feature scaling applied to the model matrix. Scalers are fitted on the
//! training split and reused on validation and test data.

mod scaler;

pub use scaler::{Scaler, ScalerType};
