//! Inicialización del logging con `tracing`.

use tracing_subscriber::EnvFilter;

/// Logs a stdout con formato `fmt`; `RUST_LOG` filtra y, si no existe, se usa `info`.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // Ignora el error si ya había un subscriber (p. ej. en tests).
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
