//! Error types for fan-out operations.

use thiserror::Error;

/// Request-level validation failures.
///
/// These reject the whole request before any branch starts. Failures of a
/// single branch never surface here; they become branch errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FanoutError {
    /// The prompt is missing or blank.
    #[error("El prompt es requerido")]
    MissingPrompt,

    /// No branch was selected.
    #[error("Se requiere al menos un proveedor")]
    NoSelections,

    /// A selection names a provider that is not registered.
    #[error("Provider debe ser: {expected}")]
    UnknownProvider { provider: String, expected: String },

    /// A selection's temperature is outside `[0, 1]`.
    #[error("La temperatura de {provider} debe estar entre 0 y 1 (recibido {value})")]
    InvalidTemperature { provider: String, value: f32 },
}
