use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use dotenvy::dotenv;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use collection_codes::config::{DatabaseConfig, EnvironmentConfig, StoreBackend};
use collection_codes::database::DatabaseConnection;
use collection_codes::models::EntityKind;
use collection_codes::repositories::{CodeStore, MemoryCodeStore, PgCodeStore};
use collection_codes::routes::create_router;
use collection_codes::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Cargar variables de entorno
    dotenv().ok();

    // Configurar logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,collection_codes=debug")),
        )
        .init();

    info!("🏷️  Collection Codes - Asignación de códigos jerárquicos");
    info!("================================================");

    let config = EnvironmentConfig::from_env()?;

    let store: Arc<dyn CodeStore> = match config.store_backend {
        StoreBackend::Postgres => {
            let db_connection = match DatabaseConnection::new(&DatabaseConfig::from_env()?).await {
                Ok(conn) => conn,
                Err(e) => {
                    error!("❌ Error conectando a la base de datos: {:#}", e);
                    return Err(e);
                }
            };
            Arc::new(PgCodeStore::new(db_connection.pool().clone()))
        }
        StoreBackend::Memory => {
            warn!("⚠️ Usando almacén en memoria: los datos se pierden al reiniciar");
            Arc::new(MemoryCodeStore::new())
        }
    };

    let addr: SocketAddr = config.server_url().parse()?;
    let app = create_router(AppState::new(store, config));

    info!("🌐 Servidor iniciando en http://{}", addr);
    info!("🔍 Endpoints disponibles:");
    info!("   GET  /health - Health check");
    for kind in EntityKind::ALL {
        info!("📍 Endpoints - {}:", kind);
        info!("   POST   /api/{} - Crear", kind.plural());
        info!("   GET    /api/{} - Listar", kind.plural());
        info!("   GET    /api/{}/:id - Obtener", kind.plural());
        info!("   PUT    /api/{}/:id - Actualizar datos", kind.plural());
        info!("   DELETE /api/{}/:id - Desactivar", kind.plural());
        info!("   POST   /api/{}/:id/activate - Reactivar", kind.plural());
        info!("   GET    /api/{}/:id/next-code - Próximo código", kind.plural());
    }
    info!("🔢 Endpoints - Códigos:");
    info!("   POST /api/codes/assemble - Ensamblar código");
    info!("   POST /api/codes/validate - Validar duplicado");
    info!("   GET  /api/codes/:code/decompose - Descomponer código");
    info!("   GET  /api/codes/audit?kind= - Auditar códigos");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!("❌ Error del servidor: {}", e);
        return Err(e.into());
    }

    info!("👋 Servidor terminado");
    Ok(())
}

/// Señal de apagado graceful
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("❌ No se pudo instalar el handler de Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("❌ No se pudo instalar el handler de SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("🛑 Señal Ctrl+C recibida, apagando servidor...");
        },
        _ = terminate => {
            info!("🛑 Señal de terminación recibida, apagando servidor...");
        },
    }
}
