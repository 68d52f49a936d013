use std::sync::Arc;

use portcullis_api::app;
use portcullis_api::middleware::ClaimsSource;
use portcullis_auth::Hs256TokenVerifier;

#[tokio::main]
async fn main() {
    portcullis_observability::init();

    let claims = match std::env::var("CLAIMS_SOURCE").as_deref() {
        Ok("gateway") => ClaimsSource::Gateway {
            header: std::env::var("CLAIMS_HEADER")
                .unwrap_or_else(|_| "x-verified-claims".to_string()),
        },
        _ => {
            let secret = std::env::var("JWT_SECRET").unwrap_or_else(|_| {
                tracing::warn!("JWT_SECRET not set; using insecure dev default");
                "dev-secret".to_string()
            });
            ClaimsSource::Bearer {
                verifier: Arc::new(Hs256TokenVerifier::new(secret.as_bytes())),
            }
        }
    };

    let services = match std::env::var("DATABASE_URL") {
        Ok(url) => {
            let pool = sqlx::PgPool::connect(&url)
                .await
                .expect("failed to connect to DATABASE_URL");
            // No external identity-provider adapter is wired in yet; the
            // in-memory one keeps dev/staging deployments self-contained.
            let idp = Arc::new(portcullis_infra::InMemoryIdentityProvider::new());
            tracing::warn!("using in-memory identity provider with postgres stores");
            app::build_postgres(pool, idp)
        }
        Err(_) => {
            tracing::info!("DATABASE_URL not set; using in-memory backends");
            app::build_in_memory().0
        }
    };

    let app = app::build_app(services, claims);

    let bind = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .unwrap_or_else(|e| panic!("failed to bind {bind}: {e}"));

    tracing::info!("listening on {}", listener.local_addr().unwrap());

    axum::serve(listener, app).await.unwrap();
}
