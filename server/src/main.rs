use gateway_server::prelude::*;
use gateway_server::{bootstrap, config::Config, routes};

#[tokio::main]
async fn main() -> ClResult<()> {
	tracing_subscriber::fmt()
		.with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
		.with_target(false)
		.init();

	let config = match Config::load() {
		Ok(config) => config,
		Err(e) => {
			error!("FATAL: configuration error: {e}");
			return Err(e);
		}
	};

	let listen_addr = config.listen_addr.clone();
	let app = bootstrap::bootstrap(config).await?;
	let router = routes::build(app);

	let listener = tokio::net::TcpListener::bind(&listen_addr).await.map_err(|e| {
		error!("FATAL: cannot bind {listen_addr}: {e}");
		Error::Io(e)
	})?;
	info!("listening on {listen_addr}");

	axum::serve(listener, router).await.map_err(|e| {
		error!("server error: {e}");
		Error::Io(e)
	})?;

	Ok(())
}

// vim: ts=4
