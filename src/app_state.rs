//! Estado compartido de la aplicación para los handlers de axum.

use crate::rag::RagChain;

/// Estado compartido por los handlers. Los servicios se construyen una vez
/// al arrancar y se clonan por referencia (`Arc`) en cada petición.
#[derive(Clone)]
pub struct AppState {
    pub rag: RagChain,
}

impl AppState {
    pub fn new(rag: RagChain) -> Self {
        Self { rag }
    }
}
