use crate::ui;
use chrono::{
    DateTime,
    TimeDelta,
    Utc,
};
use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use next_rich::{
    deposit::{
        DepositError,
        DepositFailure,
        DepositReceipt,
        DepositRequest,
        DepositTarget,
        submit_deposit,
    },
    round_client::{
        RoundClient,
        RoundResult,
    },
    simulation::SimulatedRounds,
    wallets::{
        HttpWalletBridge,
        LocalWallet,
        Wallet,
        WalletAdapter,
    },
};
use preferences::VisitStore;
use std::{
    collections::VecDeque,
    path::PathBuf,
    sync::Arc,
    time::Duration,
};
use tokio::{
    sync::mpsc,
    time,
};
use tracing::{
    error,
    info,
    warn,
};
use wheel::{
    RandomSource,
    ResolveError,
    Round,
    RoundId,
    RngSource,
    SpinConfig,
    SpinError,
    SpinEvent,
    SpinMachine,
    SpinPhase,
    SpinRequest,
    SpinSnapshot,
    WinnerRecord,
    spin::DEPOSIT_CUTOFF_SECS,
};

pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;
pub const DEFAULT_ROUND_SECS: u64 = 120;
const FRAME_INTERVAL: Duration = Duration::from_millis(100);
const MAX_ERRORS: usize = 50;
const MAX_WINNERS: usize = 10;

#[derive(Clone, Debug)]
pub enum RoundSourceConfig {
    Server {
        api_url: String,
        poll_interval: Duration,
    },
    Simulated {
        round_duration: TimeDelta,
        bots: usize,
    },
}

#[derive(Clone, Debug)]
pub enum WalletConfig {
    Bridge { url: String, owner: String },
    Local { owner: String },
    Disconnected,
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub source: RoundSourceConfig,
    pub wallet: WalletConfig,
    pub deposit_target: DepositTarget,
    pub prefs_path: PathBuf,
}

#[derive(Clone, Debug)]
pub struct AppSnapshot {
    pub wheel: SpinSnapshot,
    pub winners: Vec<WinnerRecord>,
    pub status: String,
    pub errors: Vec<String>,
    pub wallet: Option<String>,
    pub simulated: bool,
    pub stale: bool,
    pub deposit_in_flight: bool,
}

enum RoundSource {
    Server,
    Simulated(SimulatedRounds),
}

pub struct AppController {
    machine: SpinMachine,
    source: RoundSource,
    random: Box<dyn RandomSource>,
    winners: Vec<WinnerRecord>,
    wallet_owner: Option<String>,
    pub status: String,
    errors: Vec<String>,
    stale: bool,
    deposit_in_flight: bool,
    diverged_round: Option<RoundId>,
}

/// Deposit cutoff of a simulated round, shortened for rounds too brief for
/// the full minute.
fn simulated_cutoff(round_duration: TimeDelta) -> TimeDelta {
    (round_duration / 4).min(TimeDelta::seconds(DEPOSIT_CUTOFF_SECS))
}

impl AppController {
    pub fn new(
        source: &RoundSourceConfig,
        wallet_owner: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self::with_random(source, wallet_owner, Box::new(RngSource::thread()), now)
    }

    fn with_random(
        source: &RoundSourceConfig,
        wallet_owner: Option<String>,
        random: Box<dyn RandomSource>,
        now: DateTime<Utc>,
    ) -> Self {
        let (machine, source) = match source {
            RoundSourceConfig::Server { .. } => {
                (SpinMachine::new(SpinConfig::server()), RoundSource::Server)
            }
            RoundSourceConfig::Simulated {
                round_duration,
                bots,
            } => {
                let cutoff = simulated_cutoff(*round_duration);
                let rounds = SimulatedRounds::new(*round_duration, cutoff, *bots, now);
                (
                    SpinMachine::new(SpinConfig::simulated(cutoff)),
                    RoundSource::Simulated(rounds),
                )
            }
        };
        let mut controller = Self {
            machine,
            source,
            random,
            winners: Vec::new(),
            wallet_owner,
            status: String::from("Ready"),
            errors: Vec::new(),
            stale: false,
            deposit_in_flight: false,
            diverged_round: None,
        };
        if let RoundSource::Simulated(rounds) = &controller.source {
            let round = rounds.current(now);
            // a fresh simulated round has no participants, nothing to resolve
            let _ = controller.machine.observe_round(Some(round), now);
        }
        controller
    }

    pub fn is_simulated(&self) -> bool {
        matches!(self.source, RoundSource::Simulated(_))
    }

    pub fn snapshot(&self, now: DateTime<Utc>) -> AppSnapshot {
        AppSnapshot {
            wheel: self.machine.snapshot(now),
            winners: self.winners.clone(),
            status: self.status.clone(),
            errors: self.errors.clone(),
            wallet: self.wallet_owner.clone(),
            simulated: self.is_simulated(),
            stale: self.stale,
            deposit_in_flight: self.deposit_in_flight,
        }
    }

    pub fn ingest_round(
        &mut self,
        round: Option<Round>,
        now: DateTime<Utc>,
    ) -> Vec<RoundWorkerCommand> {
        if self.stale {
            self.stale = false;
            self.set_status("Round data refreshed");
        }
        let events = self.machine.observe_round(round, now);
        self.apply_spin_events(events, now)
    }

    /// Keeps the last known round; the failure is reported once until the
    /// next successful poll.
    pub fn round_fetch_failed(&mut self, message: String) {
        warn!(%message, "round fetch failed, keeping previous round");
        if !self.stale {
            self.stale = true;
            self.push_errors(vec![format!("Round data may be stale: {message}")]);
        }
    }

    pub fn ingest_result(
        &mut self,
        round_id: RoundId,
        result: Option<RoundResult>,
        now: DateTime<Utc>,
    ) {
        let Some(result) = result else {
            self.machine.abort_spin(&round_id);
            self.set_status(format!(
                "Winner of round {round_id} not published yet, retrying"
            ));
            return;
        };
        let identity = self
            .machine
            .round()
            .and_then(|round| round.identity_for_wallet(&result.winner_wallet))
            .map(str::to_string)
            .unwrap_or_else(|| result.winner_wallet.clone());
        self.start_server_spin(
            &round_id,
            &identity,
            result.prize_amount,
            result.resolved_at,
            now,
        );
    }

    pub fn result_failed(&mut self, round_id: RoundId, message: String) {
        self.machine.abort_spin(&round_id);
        self.push_errors(vec![format!(
            "Fetching the result of round {round_id} failed: {message}"
        )]);
    }

    pub fn ingest_winners(&mut self, mut winners: Vec<WinnerRecord>) {
        winners.truncate(MAX_WINNERS);
        self.winners = winners;
    }

    pub fn tick(&mut self, now: DateTime<Utc>) -> Vec<RoundWorkerCommand> {
        let mut events = Vec::new();
        if let RoundSource::Simulated(rounds) = &mut self.source
            && !self.machine.is_spinning()
            && rounds.bot_tick(&mut rand::rng(), now)
        {
            events.extend(self.machine.observe_round(Some(rounds.current(now)), now));
        }
        if let RoundSource::Simulated(rounds) = &mut self.source
            && self.machine.phase() == SpinPhase::Idle
            && rounds.expired_without_deposits(now)
        {
            info!(round_id = %rounds.round_id(), "simulated round ended without deposits");
            let next = rounds.start_next_round(now);
            events.extend(self.machine.observe_round(Some(next), now));
            self.set_status("Nobody joined, a new round started");
        }
        events.extend(self.machine.tick(now));
        self.apply_spin_events(events, now)
    }

    /// Checks a deposit before anything is sent to the wallet.
    pub fn prepare_deposit(
        &self,
        name: &str,
        amount: &str,
        now: DateTime<Utc>,
    ) -> Result<DepositRequest, DepositError> {
        if self.wallet_owner.is_none() {
            return Err(DepositError::NoWallet);
        }
        let request = DepositRequest::parse(name, amount)?;
        if !self.machine.deposits_open(now) {
            return Err(DepositError::DepositsClosed);
        }
        Ok(request)
    }

    pub fn deposit_started(&mut self, request: &DepositRequest) {
        self.deposit_in_flight = true;
        self.set_status(format!(
            "Depositing {:.2} tokens as {}, confirm in your wallet...",
            request.amount, request.name
        ));
    }

    pub fn deposit_rejected(&mut self, err: DepositError) {
        self.set_status(format!("Deposit not sent: {err}"));
    }

    pub fn deposit_finished(
        &mut self,
        outcome: Result<DepositReceipt, DepositFailure>,
        now: DateTime<Utc>,
    ) -> Vec<RoundWorkerCommand> {
        self.deposit_in_flight = false;
        let receipt = match outcome {
            Ok(receipt) => receipt,
            Err(failure) if failure.is_rejection() => {
                info!("deposit cancelled in wallet");
                self.set_status("Deposit cancelled in wallet");
                return Vec::new();
            }
            Err(failure) => {
                self.push_errors(vec![format!("Deposit failed: {failure}")]);
                return Vec::new();
            }
        };
        self.set_status(format!(
            "Deposited {:.2} tokens as {} ({})",
            receipt.request.amount,
            receipt.request.name,
            short_key(&receipt.signature)
        ));
        let round = match &mut self.source {
            RoundSource::Simulated(rounds) => {
                rounds.deposit(
                    &receipt.request.name,
                    receipt.request.amount,
                    &receipt.wallet_address,
                );
                Some(rounds.current(now))
            }
            RoundSource::Server => None,
        };
        match round {
            Some(round) => {
                let events = self.machine.observe_round(Some(round), now);
                self.apply_spin_events(events, now)
            }
            None => vec![RoundWorkerCommand::FetchNow],
        }
    }

    pub fn finish_intro(&mut self, visits: &VisitStore, now: DateTime<Utc>) {
        if let Err(err) = visits.record_visit(now) {
            self.push_errors(vec![format!("Could not save preferences: {err:#}")]);
        }
    }

    pub fn set_status(&mut self, message: impl Into<String>) {
        self.status = message.into();
        info!(status = %self.status);
    }

    pub fn clear_errors(&mut self) {
        self.errors.clear();
    }

    fn push_errors(&mut self, mut items: Vec<String>) {
        if items.is_empty() {
            return;
        }
        for item in &items {
            error!("{}", item);
        }
        self.errors.append(&mut items);
        if self.errors.len() > MAX_ERRORS {
            let drain = self.errors.len() - MAX_ERRORS;
            self.errors.drain(0..drain);
        }
    }

    fn apply_spin_events(
        &mut self,
        events: Vec<SpinEvent>,
        now: DateTime<Utc>,
    ) -> Vec<RoundWorkerCommand> {
        let mut commands = Vec::new();
        let mut queue: VecDeque<SpinEvent> = events.into();
        while let Some(event) = queue.pop_front() {
            match event {
                SpinEvent::SpinRequested(request) => {
                    commands.extend(self.resolve_spin(request, now));
                }
                SpinEvent::Revealed(record) => {
                    self.set_status(format!(
                        "{} won {:.2} tokens!",
                        record.identity, record.prize_amount
                    ));
                    self.winners.insert(0, record);
                    self.winners.truncate(MAX_WINNERS);
                    if !self.is_simulated() {
                        commands.push(RoundWorkerCommand::FetchWinners);
                    }
                }
                SpinEvent::Settled { round_id, cleared } => {
                    info!(%round_id, cleared, "round settled");
                    let next = match &mut self.source {
                        RoundSource::Simulated(rounds) => Some(rounds.start_next_round(now)),
                        RoundSource::Server => None,
                    };
                    match next {
                        Some(round) => {
                            queue.extend(self.machine.observe_round(Some(round), now));
                            self.set_status("New round started, deposits are open");
                        }
                        None => commands.push(RoundWorkerCommand::FetchNow),
                    }
                }
            }
        }
        commands
    }

    fn resolve_spin(
        &mut self,
        request: SpinRequest,
        now: DateTime<Utc>,
    ) -> Option<RoundWorkerCommand> {
        if self.is_simulated() {
            let mut random = self.random.as_mut();
            match self
                .machine
                .begin_spin_with_draw(&request.round_id, &mut random, now)
            {
                Ok(outcome) => {
                    if let RoundSource::Simulated(rounds) = &mut self.source {
                        rounds.mark_resolved(&outcome.winner);
                    }
                    self.set_status("Spinning...");
                }
                Err(err) => self.spin_failed(&request.round_id, err),
            }
            return None;
        }

        // the active round may already name its winner
        let declared = self
            .machine
            .round()
            .and_then(|round| round.winner_identity.clone().map(|w| (w, round.prize_amount)));
        match declared {
            Some((identity, prize)) => {
                self.start_server_spin(&request.round_id, &identity, prize, now, now);
                None
            }
            None => {
                self.set_status("Round closed, waiting for the winner...");
                Some(RoundWorkerCommand::FetchResult(request.round_id))
            }
        }
    }

    fn start_server_spin(
        &mut self,
        round_id: &RoundId,
        identity: &str,
        prize_amount: f64,
        resolved_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) {
        match self.machine.begin_spin_for_winner(
            round_id,
            identity,
            prize_amount,
            resolved_at,
            now,
        ) {
            Ok(_) => self.set_status("Spinning..."),
            Err(err) => self.spin_failed(round_id, err),
        }
    }

    /// A diverged membership is reported once per round; later polls of the
    /// same round only log it.
    fn spin_failed(&mut self, round_id: &RoundId, err: SpinError) {
        let message = match &err {
            SpinError::Resolve(ResolveError::UnknownWinner { identity }) => {
                if self.diverged_round.as_ref() == Some(round_id) {
                    warn!(%round_id, %identity, "winner still missing from the wheel");
                    return;
                }
                self.diverged_round = Some(round_id.clone());
                format!(
                    "Round membership diverged: winner {identity} is not on the wheel of round {round_id}"
                )
            }
            other => format!("Spin for round {round_id} failed: {other}"),
        };
        self.push_errors(vec![message]);
    }
}

/// `ABCDE...VWXYZ` for long keys and signatures.
pub fn short_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 12 {
        return key.to_string();
    }
    let head: String = chars[..5].iter().collect();
    let tail: String = chars[chars.len() - 5..].iter().collect();
    format!("{head}...{tail}")
}

#[derive(Clone, Debug, PartialEq)]
pub enum RoundWorkerCommand {
    FetchNow,
    FetchResult(RoundId),
    FetchWinners,
    Shutdown,
}

enum RoundWorkerEvent {
    Round(Option<Round>),
    RoundFailed(String),
    Result {
        round_id: RoundId,
        result: Option<RoundResult>,
    },
    ResultFailed {
        round_id: RoundId,
        message: String,
    },
    Winners(Vec<WinnerRecord>),
    WinnersFailed(String),
}

async fn round_worker(
    poll_interval: Duration,
    client: RoundClient,
    mut cmd_rx: mpsc::UnboundedReceiver<RoundWorkerCommand>,
    event_tx: mpsc::UnboundedSender<RoundWorkerEvent>,
) -> Result<()> {
    fn send(
        event_tx: &mpsc::UnboundedSender<RoundWorkerEvent>,
        event: RoundWorkerEvent,
    ) -> Result<()> {
        event_tx
            .send(event)
            .map_err(|_| eyre!("round event receiver dropped"))
    }

    async fn fetch_round(
        client: &RoundClient,
        event_tx: &mpsc::UnboundedSender<RoundWorkerEvent>,
    ) -> Result<()> {
        let event = match client.active_round().await {
            Ok(round) => RoundWorkerEvent::Round(round),
            Err(err) => {
                warn!(?err, "active round fetch failed");
                RoundWorkerEvent::RoundFailed(format!("{err:#}"))
            }
        };
        send(event_tx, event)
    }

    async fn fetch_result(
        client: &RoundClient,
        round_id: RoundId,
        event_tx: &mpsc::UnboundedSender<RoundWorkerEvent>,
    ) -> Result<()> {
        let event = match client.round_result(&round_id).await {
            Ok(result) => RoundWorkerEvent::Result { round_id, result },
            Err(err) => {
                warn!(?err, %round_id, "round result fetch failed");
                RoundWorkerEvent::ResultFailed {
                    round_id,
                    message: format!("{err:#}"),
                }
            }
        };
        send(event_tx, event)
    }

    async fn fetch_winners(
        client: &RoundClient,
        event_tx: &mpsc::UnboundedSender<RoundWorkerEvent>,
    ) -> Result<()> {
        let event = match client.winners().await {
            Ok(winners) => RoundWorkerEvent::Winners(winners),
            Err(err) => {
                warn!(?err, "winners fetch failed");
                RoundWorkerEvent::WinnersFailed(format!("{err:#}"))
            }
        };
        send(event_tx, event)
    }

    let mut ticker = time::interval(poll_interval);
    fetch_winners(&client, &event_tx).await?;

    loop {
        tokio::select! {
            _ = ticker.tick() => fetch_round(&client, &event_tx).await?,
            cmd = cmd_rx.recv() => {
                let Some(cmd) = cmd else {
                    break;
                };
                match cmd {
                    RoundWorkerCommand::FetchNow => fetch_round(&client, &event_tx).await?,
                    RoundWorkerCommand::FetchResult(round_id) => {
                        fetch_result(&client, round_id, &event_tx).await?
                    }
                    RoundWorkerCommand::FetchWinners => fetch_winners(&client, &event_tx).await?,
                    RoundWorkerCommand::Shutdown => break,
                }
            }
        }
    }
    Ok(())
}

fn build_wallet(config: &WalletConfig) -> Result<Option<Arc<Wallet>>> {
    let wallet = match config {
        WalletConfig::Bridge { url, owner } => Wallet::Bridge(
            HttpWalletBridge::new(url.clone(), owner.clone())
                .wrap_err("wallet bridge setup failed")?,
        ),
        WalletConfig::Local { owner } => Wallet::Local(LocalWallet::new(owner.clone())),
        WalletConfig::Disconnected => return Ok(None),
    };
    Ok(Some(Arc::new(wallet)))
}

fn send_commands(
    cmd_tx: &mpsc::UnboundedSender<RoundWorkerCommand>,
    commands: Vec<RoundWorkerCommand>,
) {
    for cmd in commands {
        let _ = cmd_tx.send(cmd);
    }
}

pub async fn run_app(config: AppConfig) -> Result<()> {
    let now = Utc::now();
    let visits = VisitStore::new(config.prefs_path.clone());
    let show_intro = match visits.has_visited(now) {
        Ok(visited) => !visited,
        Err(err) => {
            warn!(?err, "unreadable preferences, showing the introduction");
            true
        }
    };
    let wallet = build_wallet(&config.wallet)?;
    let owner = wallet.as_ref().map(|w| w.owner().to_string());
    let controller = AppController::new(&config.source, owner, now);
    let mut ui_state = ui::UiState::new(show_intro);
    let mut input_events = ui::input_event_stream();

    info!("Starting UI");
    ui::terminal_enter(&mut ui_state)?;
    let res = run_loop(
        controller,
        &config,
        wallet,
        &visits,
        &mut ui_state,
        &mut input_events,
    )
    .await;
    ui::terminal_exit()?;
    res
}

async fn run_loop(
    mut controller: AppController,
    config: &AppConfig,
    wallet: Option<Arc<Wallet>>,
    visits: &VisitStore,
    ui_state: &mut ui::UiState,
    input_events: &mut ui::InputEventReceiver,
) -> Result<()> {
    info!(simulated = controller.is_simulated(), "Running app loop");
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    let worker_handle = match &config.source {
        RoundSourceConfig::Server {
            api_url,
            poll_interval,
        } => {
            let client = RoundClient::new(api_url.clone())?;
            info!(api = %client, "polling round API");
            Some(tokio::spawn(round_worker(
                *poll_interval,
                client,
                cmd_rx,
                event_tx,
            )))
        }
        RoundSourceConfig::Simulated { .. } => None,
    };
    let (deposit_tx, mut deposit_rx) = mpsc::unbounded_channel();
    let mut frames = time::interval(FRAME_INTERVAL);
    let worker_closed = worker_handle.is_none();
    let mut worker_failed = false;

    loop {
        tokio::select! {
            maybe_event = event_rx.recv(), if !worker_closed => {
                let now = Utc::now();
                let commands = match maybe_event {
                    Some(RoundWorkerEvent::Round(round)) => controller.ingest_round(round, now),
                    Some(RoundWorkerEvent::RoundFailed(message)) => {
                        controller.round_fetch_failed(message);
                        Vec::new()
                    }
                    Some(RoundWorkerEvent::Result { round_id, result }) => {
                        controller.ingest_result(round_id, result, now);
                        Vec::new()
                    }
                    Some(RoundWorkerEvent::ResultFailed { round_id, message }) => {
                        controller.result_failed(round_id, message);
                        Vec::new()
                    }
                    Some(RoundWorkerEvent::Winners(winners)) => {
                        controller.ingest_winners(winners);
                        Vec::new()
                    }
                    Some(RoundWorkerEvent::WinnersFailed(message)) => {
                        warn!(%message, "keeping previous winners");
                        Vec::new()
                    }
                    None => {
                        warn!("round worker channel closed");
                        worker_failed = true;
                        break;
                    }
                };
                send_commands(&cmd_tx, commands);
                ui::draw(ui_state, &controller.snapshot(now))
                    .wrap_err("draw after round update failed")?;
            }
            _ = frames.tick() => {
                let now = Utc::now();
                let commands = controller.tick(now);
                send_commands(&cmd_tx, commands);
                ui::draw(ui_state, &controller.snapshot(now))
                    .wrap_err("frame draw failed")?;
            }
            Some(outcome) = deposit_rx.recv() => {
                let now = Utc::now();
                let commands = controller.deposit_finished(outcome, now);
                send_commands(&cmd_tx, commands);
                ui::draw(ui_state, &controller.snapshot(now))
                    .wrap_err("draw after deposit failed")?;
            }
            _ = tokio::signal::ctrl_c() => {
                break;
            }
            raw_ev = ui::next_raw_event(input_events) => {
                let event = raw_ev?;
                let Some(ev) = ui::interpret_event(ui_state, event) else {
                    continue;
                };
                let now = Utc::now();
                match ev {
                    ui::UserEvent::Quit => break,
                    ui::UserEvent::Redraw => {}
                    ui::UserEvent::Refresh => {
                        if controller.is_simulated() {
                            controller.set_status("Simulated round, nothing to refresh");
                        } else {
                            controller.set_status("Refreshing round...");
                            let _ = cmd_tx.send(RoundWorkerCommand::FetchNow);
                            let _ = cmd_tx.send(RoundWorkerCommand::FetchWinners);
                        }
                    }
                    ui::UserEvent::DismissErrors => controller.clear_errors(),
                    ui::UserEvent::IntroFinished => controller.finish_intro(visits, now),
                    ui::UserEvent::ConfirmDeposit { name, amount } => {
                        match (controller.prepare_deposit(&name, &amount, now), wallet.clone()) {
                            (Ok(request), Some(wallet)) => {
                                controller.deposit_started(&request);
                                let deposit_tx = deposit_tx.clone();
                                let target = config.deposit_target.clone();
                                tokio::spawn(async move {
                                    let outcome =
                                        submit_deposit(wallet.as_ref(), &target, request).await;
                                    let _ = deposit_tx.send(outcome);
                                });
                            }
                            (Ok(_), None) => controller.deposit_rejected(DepositError::NoWallet),
                            (Err(err), _) => controller.deposit_rejected(err),
                        }
                    }
                }
                ui::draw(ui_state, &controller.snapshot(now))
                    .wrap_err("draw after input failed")?;
            }
        }
    }

    let _ = cmd_tx.send(RoundWorkerCommand::Shutdown);
    if let Some(handle) = worker_handle {
        match handle.await {
            Ok(Ok(())) => {
                if worker_failed {
                    return Err(eyre!(
                        "Round worker exited unexpectedly; check the round API connection"
                    ));
                }
            }
            Ok(Err(err)) => {
                return Err(err).wrap_err("round worker failed");
            }
            Err(err) => {
                return Err(eyre!(err)).wrap_err("round worker panicked");
            }
        }
    }
    Ok(())
}
