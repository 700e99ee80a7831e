use anyhow::Result;
use tokio::net::TcpListener;
use tracing::{debug, error, info, trace};

use crate::config::{initialize_app_state, AppConfig};
use crate::router::create_router;

pub async fn serve(config: &AppConfig) -> Result<()> {
    trace!("Entering serve function");
    info!("EasyBill application starting up");
    let bind_address = &config.server.bind_address;
    debug!("Bind address: {}", bind_address);

    let state = match initialize_app_state(config).await {
        Ok(state) => {
            debug!("Application state initialized successfully");
            state
        }
        Err(e) => {
            error!("Failed to initialize application state: {}", e);
            return Err(e);
        }
    };

    let app = create_router(state);
    debug!("Router created successfully");

    info!("Starting server on {}", bind_address);
    let listener = match TcpListener::bind(bind_address).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to address {}: {}", bind_address, e);
            return Err(e.into());
        }
    };

    info!("EasyBill API server running on http://{}", bind_address);
    info!("Swagger UI available at http://{}/swagger-ui", bind_address);

    if let Err(e) = axum::serve(listener, app).await {
        error!("Server error: {}", e);
        return Err(e.into());
    }

    info!("Server shutdown gracefully");
    Ok(())
}
