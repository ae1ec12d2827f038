use attendance_server::api;
use attendance_server::config::{Config, LogFormat};
use attendance_server::store::MemoryStore;
use attendance_server::AppState;
use tracing_subscriber::EnvFilter;

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("attendance_server=info,warp=info"));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
}

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    init_tracing(LogFormat::from_env());
    let config = Config::from_env();

    let store = MemoryStore::new();
    let state = AppState::new(config.auth.clone(), store);
    let routes = api::routes(state);

    let (ip, port) = config.bind_address();
    tracing::info!(host = %config.server.host, port, "Attendance server listening");

    warp::serve(routes).run((ip, port)).await;
}
