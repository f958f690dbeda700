use clap::Parser;
use csv_query_server::config::Args;
use csv_query_server::server::{self, AppState};
use csv_query_server::{help, Executor, ParameterProbe};
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    let config = Args::parse().validate()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .with_thread_names(true)
        .init();

    let executor = Executor::spawn(config.opener(), &config.query, config.connections)?;
    let params = executor.call(|query| query.probe_parameter_count())?;
    tracing::info!(
        db = %config.db.display(),
        port = config.port,
        path = %config.path,
        connections = executor.connections(),
        %params,
        "query prepared"
    );

    let help = help::render(&config.query, params, config.port, &config.path);
    println!("DB:\n\t{}\nPort:\n\t{}\n{help}", config.db.display(), config.port);

    let router = server::router(&config.path, AppState::new(executor, help));
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(server::serve(config.listen_addr(), router))
}
