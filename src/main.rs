use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use solana_sdk::pubkey::Pubkey;
use tokio::sync::Notify;

use volumebot::{
    arguments::{get_arg_value, get_arg_values, has_arg, print_debug_info, print_help},
    config::{self, with_config},
    constants::{lamports_to_sol, SIGNATURE_FEE_LAMPORTS},
    database::Database,
    engine::{EngineSettings, VolumeEngine},
    gateway::JupiterGateway,
    logger::{self, LogTag},
    notifications::notifier_from_config,
    paths,
    relay::JitoRelay,
    rpc::SolanaRpc,
    scheduler::Scheduler,
    sessions::{commands, PoolKind, SqliteSessionStore},
    wallets::{encode_secret, WalletPool},
};

/// Main entry point for VolumeBot
///
/// With no command the scheduler runs until Ctrl-C. Operator commands
/// (`--create`, `--start`, `--sweep`, ...) run once and exit.
#[tokio::main]
async fn main() {
    // Logger needs the logs directory
    if let Err(e) = paths::ensure_all_directories() {
        eprintln!("Failed to create required directories: {}", e);
        std::process::exit(1);
    }

    logger::init();

    if has_arg("--help") || has_arg("-h") {
        print_help();
        return;
    }

    logger::info(LogTag::System, "VolumeBot starting up");
    print_debug_info();

    let code = match run().await {
        Ok(()) => 0,
        Err(e) => {
            logger::error(LogTag::System, &format!("{:#}", e));
            1
        }
    };

    logger::flush();
    std::process::exit(code);
}

async fn run() -> Result<()> {
    let first_run = !paths::get_config_path().exists();
    config::load_config().map_err(|e| anyhow!(e))?;
    if first_run {
        config::save_config(None).map_err(|e| anyhow!(e))?;
        logger::info(
            LogTag::Config,
            &format!(
                "Wrote default config to {}",
                paths::get_config_path().display()
            ),
        );
    }

    let db = Database::open(&paths::get_database_path()).map_err(|e| anyhow!(e))?;
    let store = SqliteSessionStore::new(db.clone());
    let pool = Arc::new(WalletPool::new(
        db,
        with_config(|cfg| cfg.engine.wallet_pool_size),
    ));

    if run_operator_command(&store, &pool).await? {
        return Ok(());
    }

    let engine = Arc::new(build_engine(store.clone(), pool)?);
    if run_fund_command(&engine).await? {
        return Ok(());
    }

    let interval = Duration::from_secs(with_config(|cfg| cfg.scheduler.interval_secs));
    let scheduler = Scheduler::new(engine, Arc::new(store.clone()), interval);

    if let Some(session_id) = get_arg_value("--run-once") {
        commands::start_session(&store, &session_id).await?;
        let handle = scheduler
            .run_once(&session_id)
            .ok_or_else(|| anyhow!("Session {} already has a running loop", session_id))?;
        let status = handle.await.context("Session loop panicked")?;
        logger::info(
            LogTag::System,
            &format!("Session {} finished: {}", session_id, status),
        );
        return Ok(());
    }

    let shutdown = Arc::new(Notify::new());
    let signal = shutdown.clone();
    ctrlc::set_handler(move || {
        signal.notify_one();
    })
    .context("Failed to install Ctrl-C handler")?;

    scheduler.run(shutdown).await;
    logger::info(LogTag::System, "VolumeBot stopped");
    Ok(())
}

fn build_engine(store: SqliteSessionStore, pool: Arc<WalletPool>) -> Result<VolumeEngine> {
    let gateway = JupiterGateway::from_config()?;
    let relay = JitoRelay::from_config()?;

    Ok(VolumeEngine::new(
        Arc::new(store),
        Arc::new(SolanaRpc::from_config()),
        Arc::new(gateway),
        Arc::new(relay),
        notifier_from_config(),
        pool,
        EngineSettings::current(),
    ))
}

/// Runs a one-shot operator command; false when none was given
async fn run_operator_command(store: &SqliteSessionStore, pool: &WalletPool) -> Result<bool> {
    if has_arg("--list") {
        list_sessions(store)?;
        return Ok(true);
    }

    if let Some(values) = get_arg_values("--create", 3) {
        let main = config::get_main_wallet_keypair().map_err(|e| anyhow!(e))?;
        let pool_kind = PoolKind::from_str(&values[2])
            .ok_or_else(|| anyhow!("Unknown pool kind '{}' (amm, cpmm, clmm)", values[2]))?;
        let session = commands::create_session(
            store,
            &values[0],
            &encode_secret(&main),
            &values[1],
            pool_kind,
        )?;
        println!("{}", session.session_id);
        return Ok(true);
    }

    if let Some(session_id) = get_arg_value("--start") {
        commands::start_session(store, &session_id).await?;
        return Ok(true);
    }

    if let Some(session_id) = get_arg_value("--stop") {
        commands::stop_session(store, &session_id).await?;
        return Ok(true);
    }

    if let Some(values) = get_arg_values("--set-target", 2) {
        let volume: f64 = values[1]
            .parse()
            .with_context(|| format!("Invalid volume '{}'", values[1]))?;
        commands::set_target_volume(store, &values[0], volume).await?;
        return Ok(true);
    }

    if let Some(values) = get_arg_values("--set-principal", 2) {
        let lamports: u64 = values[1]
            .parse()
            .with_context(|| format!("Invalid lamport amount '{}'", values[1]))?;
        commands::set_principal_amount(store, &values[0], lamports).await?;
        return Ok(true);
    }

    if let Some(values) = get_arg_values("--set-pool", 2) {
        let pool_kind = PoolKind::from_str(&values[1])
            .ok_or_else(|| anyhow!("Unknown pool kind '{}' (amm, cpmm, clmm)", values[1]))?;
        commands::set_pool_kind(store, &values[0], pool_kind).await?;
        return Ok(true);
    }

    if let Some(values) = get_arg_values("--assign-token", 2) {
        commands::assign_target_token(store, &values[0], &values[1]).await?;
        return Ok(true);
    }

    if let Some(count) = get_arg_value("--generate-wallets") {
        let count: u64 = count
            .parse()
            .with_context(|| format!("Invalid wallet count '{}'", count))?;
        let created = pool.ensure_generated(count).map_err(|e| anyhow!(e))?;
        println!(
            "{} wallets created, {} in pool",
            created,
            pool.persisted_count().map_err(|e| anyhow!(e))?
        );
        return Ok(true);
    }

    Ok(false)
}

/// Sweep and withdraw need the chain and the relay, so they run on the engine
async fn run_fund_command(engine: &VolumeEngine) -> Result<bool> {
    if let Some(values) = get_arg_values("--sweep", 3) {
        let start: u64 = values[1]
            .parse()
            .with_context(|| format!("Invalid start index '{}'", values[1]))?;
        let count: usize = values[2]
            .parse()
            .with_context(|| format!("Invalid wallet count '{}'", values[2]))?;
        let report = engine.sweep_session(&values[0], start, count).await?;
        println!(
            "{} of {} wallets swept, {:.6} SOL and {} tokens recovered, {} failed",
            report.swept,
            report.scanned,
            lamports_to_sol(report.lamports),
            report.tokens,
            report.failed
        );
        return Ok(true);
    }

    if let Some(values) = get_arg_values("--withdraw", 3) {
        let destination = Pubkey::from_str(&values[1])
            .with_context(|| format!("Invalid address '{}'", values[1]))?;
        let lamports = match values[2].as_str() {
            "all" => None,
            amount => Some(
                amount
                    .parse::<u64>()
                    .with_context(|| format!("Invalid lamport amount '{}'", amount))?,
            ),
        };
        // Tip plus the fees of the transfer and tip transactions
        let reserve = with_config(|cfg| cfg.relay.tip_lamports) + 2 * SIGNATURE_FEE_LAMPORTS;
        let sent = engine
            .withdraw(&values[0], &destination, lamports, reserve)
            .await?;
        println!("{:.6} SOL sent to {}", lamports_to_sol(sent), destination);
        return Ok(true);
    }

    Ok(false)
}

fn list_sessions(store: &SqliteSessionStore) -> Result<()> {
    let sessions = store.list_sessions().map_err(|e| anyhow!(e))?;
    if sessions.is_empty() {
        println!("No sessions");
        return Ok(());
    }

    for s in sessions {
        println!(
            "{}  user={}  token={}  status={}  run={}  volume={:.2}/{:.2} ({:.1}%)  principal={:.4} SOL  worked={}s",
            s.session_id,
            s.user_id,
            s.target_token,
            s.status,
            s.run_flag,
            s.volume_made,
            s.target_volume,
            s.progress_percent(),
            lamports_to_sol(s.principal_lamports),
            s.worked_seconds
        );
    }
    Ok(())
}
