mod config;
mod error;
mod handlers;
mod inference;
mod models;
mod preprocess;

#[cfg(test)]
mod fixtures;

use std::io;

use actix_web::middleware::Logger;
use actix_web::{web, App, HttpServer};
use log::{error, info};

use config::Config;
use handlers::AppState;
use inference::ModelHost;

#[actix_web::main]
async fn main() -> io::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let config = Config::from_env().map_err(|e| {
        error!("invalid configuration: {e}");
        io::Error::new(io::ErrorKind::InvalidInput, e)
    })?;

    // No listener is bound until the model is in memory.
    let host = ModelHost::initialize(&config).map_err(|e| {
        error!("{e}");
        io::Error::new(io::ErrorKind::Other, e)
    })?;

    let state = web::Data::new(AppState {
        host,
        body_limit: config.body_limit_bytes,
    });

    let bind_address = config.bind_address();
    info!("Server running at http://{bind_address}");

    let mut server = HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(handlers::cors())
            .app_data(state.clone())
            .configure(handlers::configure)
    });
    if let Some(workers) = config.workers {
        server = server.workers(workers);
    }

    server.bind(&bind_address)?.run().await
}
