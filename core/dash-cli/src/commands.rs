//! Subcommand implementations.

use chrono::{DateTime, Utc};
use dash_core::{
    analysis_run_duration, format_date, load_config, ClientBackend, Credential, DashConfig,
    DashError, DomainStore, FileStore, HttpApi, SessionMachine, SessionState, StorageConfig,
    UserClaims,
};
use serde::Serialize;
use tracing::{debug, warn};
use trailblazer_dash_protocol::Analysis;

use crate::{Cli, Commands};

type ClientSession = SessionMachine<ClientBackend<FileStore>>;

#[derive(Serialize)]
struct Identity<'a> {
    state: SessionState,
    name: Option<&'a str>,
    expires_at: Option<DateTime<Utc>>,
    claims: Option<&'a UserClaims>,
}

impl<'a> Identity<'a> {
    fn of(session: &'a ClientSession) -> Self {
        let user = session.user();
        Identity {
            state: session.state(),
            name: user.and_then(UserClaims::display_name),
            expires_at: user.and_then(UserClaims::expires_at),
            claims: user,
        }
    }
}

#[derive(Serialize)]
struct AnalysisRow<'a> {
    #[serde(flatten)]
    analysis: &'a Analysis,
    started: String,
    duration: Option<String>,
}

impl<'a> AnalysisRow<'a> {
    fn of(analysis: &'a Analysis) -> Self {
        AnalysisRow {
            analysis,
            started: analysis
                .started_at
                .as_deref()
                .map(format_date)
                .unwrap_or_default(),
            duration: analysis_run_duration(analysis),
        }
    }
}

#[derive(Serialize)]
struct Freshness {
    updated_at: Option<String>,
    age: Option<String>,
}

fn emit<T: Serialize>(value: &T) -> Result<(), DashError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn resolve_config(cli: &Cli, storage: &StorageConfig) -> Result<DashConfig, DashError> {
    let mut config = match load_config(cli.config.as_deref(), storage) {
        Ok(config) => config,
        Err(err) => {
            warn!(error = %err, "Ignoring unusable config file, using defaults");
            DashConfig::default()
        }
    };
    config.apply_env_overrides()?;
    if let Some(url) = &cli.api_url {
        config.api.base_url = url.clone();
    }
    Ok(config)
}

fn require_login(session: &ClientSession) -> Result<(), DashError> {
    if session.is_authenticated() {
        Ok(())
    } else {
        Err(DashError::NotAuthenticated)
    }
}

pub async fn run(cli: Cli) -> Result<(), DashError> {
    let storage = StorageConfig::default();
    let config = resolve_config(&cli, &storage)?;
    let base_url = config.api_base_url()?;
    debug!(base_url = %base_url, page_size = config.api.page_size, "Configuration resolved");

    let credential = Credential::new();
    let mut session = SessionMachine::for_client(
        FileStore::new(storage.client_storage_file()),
        credential.clone(),
    );
    session.bootstrap_from_client_storage();

    let api = HttpApi::with_timeout(base_url, credential, config.request_timeout())?;
    let store = DomainStore::with_page_size(api, config.api.page_size);

    match cli.command {
        Commands::Login { token } => {
            session.login(&token)?;
            emit(&Identity::of(&session))
        }
        Commands::Logout => {
            session.logout();
            emit(&Identity::of(&session))
        }
        Commands::Whoami => emit(&Identity::of(&session)),
        Commands::Analyses {
            query,
            status,
            hidden,
        } => {
            require_login(&session)?;
            store.fetch_analyses(query.as_deref(), Some(!hidden)).await?;
            let analyses = match status {
                Some(status) => store.analyses_with_status(status),
                None => store.analyses(),
            };
            let rows: Vec<AnalysisRow<'_>> = analyses.iter().map(AnalysisRow::of).collect();
            emit(&rows)
        }
        Commands::Show { id } => {
            require_login(&session)?;
            let analysis = store.fetch_analysis(id).await?;
            emit(&AnalysisRow::of(&analysis))
        }
        Commands::Comment { id, text } => {
            require_login(&session)?;
            emit(&store.update_comment(id, &text).await?)
        }
        Commands::Hide { id } => {
            require_login(&session)?;
            emit(&store.hide_analysis(id).await?)
        }
        Commands::Unhide { id } => {
            require_login(&session)?;
            emit(&store.unhide_analysis(id).await?)
        }
        Commands::Jobs => {
            require_login(&session)?;
            store.fetch_job_stats().await?;
            emit(&store.ranked_job_stats())
        }
        Commands::Info => {
            require_login(&session)?;
            let updated_at = store.fetch_last_update().await?;
            emit(&Freshness {
                updated_at,
                age: store.time_since_last_update(Utc::now()),
            })
        }
    }
}
