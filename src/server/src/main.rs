//! Host binary. Owns the WebSocket listener, the bounded envelope queue,
//! and the realtime `sim_run` cooperative loop. `granular_sim` itself
//! never touches a socket or a clock tick — this binary is the only
//! thing that does.

use std::env;
use std::net::SocketAddr;
use std::process::ExitCode;
use std::time::Duration;

use crossbeam_channel::{bounded, tick, Sender};
use futures::{SinkExt, StreamExt};
use granular_sim::commands::types::SimRunCommand;
use granular_sim::commands::CommandDispatcher;
use granular_sim::error::{ApiError, CommandError};
use granular_sim::protocol::wire::Reader;
use granular_sim::protocol::{Envelope, ErrorEnvelope, MAX_MESSAGE_BYTES};
use granular_sim::world::World;
use serde_json::Value;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio_tungstenite::accept_async_with_config;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::tungstenite::Message;

const DEFAULT_BIND: &str = "127.0.0.1:9876";
const DEFAULT_GRID_WIDTH: u32 = 64;
const DEFAULT_GRID_HEIGHT: u32 = 64;
const ENVELOPE_QUEUE_CAPACITY: usize = 256;
const PHYSICS_TICK: Duration = Duration::from_millis(16);
/// Cap on fixed-size catch-up steps run per wake, per spec.md §5's
/// "cap >= 4 steps per wake" guidance.
const CATCHUP_STEP_CAP: u32 = 8;

/// One decoded envelope in flight between an I/O task and the physics
/// task, carrying the reply sink for whichever connection produced it.
enum Inbound {
    Json(Value, oneshot::Sender<Value>),
    Binary(Vec<u8>, oneshot::Sender<Vec<u8>>),
}

fn main() -> ExitCode {
    env_logger::init();

    let bind_addr = env::var("GRANULAR_SIM_BIND").unwrap_or_else(|_| DEFAULT_BIND.to_string());

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(err) => {
            log::error!("failed to start tokio runtime: {err}");
            return ExitCode::FAILURE;
        }
    };

    runtime.block_on(run(bind_addr))
}

async fn run(bind_addr: String) -> ExitCode {
    let addr: SocketAddr = match bind_addr.parse() {
        Ok(addr) => addr,
        Err(err) => {
            log::error!("invalid bind address {bind_addr}: {err}");
            return ExitCode::FAILURE;
        }
    };

    let listener = match TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(err) => {
            log::error!("failed to bind {addr}: {err}");
            return ExitCode::FAILURE;
        }
    };
    log::info!("listening on {addr}");

    let (cmd_tx, cmd_rx) = bounded::<Inbound>(ENVELOPE_QUEUE_CAPACITY);
    let physics = tokio::task::spawn_blocking(move || physics_loop(cmd_rx));

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, peer)) => {
                        let tx = cmd_tx.clone();
                        tokio::spawn(async move {
                            if let Err(err) = handle_connection(stream, tx).await {
                                log::warn!("connection {peer} ended: {err}");
                            }
                        });
                    }
                    Err(err) => log::warn!("accept failed: {err}"),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                log::info!("ctrl-c received, shutting down");
                break;
            }
        }
    }

    drop(cmd_tx);
    match physics.await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("physics task panicked: {err}");
            ExitCode::FAILURE
        }
    }
}

async fn handle_connection(
    stream: TcpStream,
    cmd_tx: Sender<Inbound>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let peer = stream.peer_addr()?;
    let config = WebSocketConfig {
        max_message_size: Some(MAX_MESSAGE_BYTES),
        max_frame_size: Some(MAX_MESSAGE_BYTES),
        ..Default::default()
    };
    let ws_stream = accept_async_with_config(stream, Some(config)).await?;
    log::debug!("client {peer} connected");
    let (mut ws_tx, mut ws_rx) = ws_stream.split();

    // One request in flight at a time per connection keeps responses in
    // request order (spec.md §5's per-client FIFO guarantee) without
    // needing a second task just to serialize replies.
    while let Some(message) = ws_rx.next().await {
        let message = message?;
        match message {
            Message::Text(text) => {
                let response = match serde_json::from_str::<Value>(&text) {
                    Ok(value) => {
                        let (reply_tx, reply_rx) = oneshot::channel();
                        if cmd_tx.send(Inbound::Json(value, reply_tx)).is_err() {
                            break;
                        }
                        reply_rx.await.unwrap_or_else(|_| {
                            ErrorEnvelope { id: 0, message: "physics task is gone".into() }.to_json()
                        })
                    }
                    Err(err) => {
                        let api_err: ApiError = CommandError::JsonParse(err.to_string()).into();
                        ErrorEnvelope { id: 0, message: api_err.message }.to_json()
                    }
                };
                ws_tx.send(Message::Text(response.to_string())).await?;
            }
            Message::Binary(bytes) => {
                let (reply_tx, reply_rx) = oneshot::channel();
                if cmd_tx.send(Inbound::Binary(bytes, reply_tx)).is_err() {
                    break;
                }
                let response = reply_rx.await.unwrap_or_default();
                ws_tx.send(Message::Binary(response)).await?;
            }
            Message::Close(_) => break,
            _ => {}
        }
    }

    log::debug!("client {peer} disconnected");
    Ok(())
}

/// Tracks the host-driven side of `sim_run`/`sim_pause`: the dispatcher
/// handlers only acknowledge those commands (see `commands::dispatcher`),
/// the actual realtime catch-up stepping happens here.
struct RunState {
    active: bool,
    use_realtime: bool,
    timestep: f64,
    max_steps: i64,
    steps_run: u32,
    accumulated: Duration,
}

impl RunState {
    fn idle() -> Self {
        RunState { active: false, use_realtime: true, timestep: 0.016, max_steps: -1, steps_run: 0, accumulated: Duration::ZERO }
    }

    fn start(&mut self, cmd: &SimRunCommand) {
        self.active = true;
        self.use_realtime = cmd.use_realtime;
        self.timestep = cmd.timestep;
        self.max_steps = cmd.max_steps;
        self.steps_run = 0;
        self.accumulated = Duration::ZERO;
    }

    fn steps_remaining(&self) -> bool {
        self.max_steps < 0 || (self.steps_run as i64) < self.max_steps
    }
}

/// The single serial physics task: owns the one `World`/`CommandDispatcher`
/// and the `sim_run` clock. Runs on a blocking-pool thread rather than the
/// async reactor since its inner loop is a synchronous `crossbeam_channel`
/// select, matching the "no suspension points inside a step, cooperative
/// yield only between steps" model of spec.md §5.
fn physics_loop(cmd_rx: crossbeam_channel::Receiver<Inbound>) {
    let world = World::new(DEFAULT_GRID_WIDTH, DEFAULT_GRID_HEIGHT);
    let mut dispatcher = CommandDispatcher::new(world);
    let mut run_state = RunState::idle();
    let ticks = tick(PHYSICS_TICK);
    let mut last_tick = None;

    loop {
        crossbeam_channel::select! {
            recv(cmd_rx) -> msg => {
                match msg {
                    Ok(Inbound::Json(value, reply)) => {
                        note_sim_run_json(&value, &mut run_state);
                        let response = dispatcher.dispatch_json(&value);
                        let _ = reply.send(response);
                    }
                    Ok(Inbound::Binary(bytes, reply)) => {
                        note_sim_run_binary(&bytes, &mut run_state);
                        let response = dispatcher.dispatch_binary(&bytes);
                        let _ = reply.send(response);
                    }
                    Err(_) => {
                        log::info!("physics task shutting down: queue closed");
                        return;
                    }
                }
            }
            recv(ticks) -> tick_at => {
                let Ok(now) = tick_at else { continue };
                let Some(previous) = last_tick.replace(now) else { continue };
                if run_state.active && run_state.use_realtime {
                    run_catch_up(&mut dispatcher, &mut run_state, now.duration_since(previous));
                }
            }
        }
    }
}

fn run_catch_up(dispatcher: &mut CommandDispatcher, run_state: &mut RunState, elapsed: Duration) {
    run_state.accumulated += elapsed;
    let mut steps_this_wake = 0;
    while steps_this_wake < CATCHUP_STEP_CAP
        && run_state.accumulated.as_secs_f64() >= run_state.timestep
        && run_state.steps_remaining()
    {
        if let Err(err) = dispatcher.world_mut().advance_time(run_state.timestep) {
            log::warn!("sim_run step failed, pausing: {err}");
            run_state.active = false;
            break;
        }
        run_state.accumulated -= Duration::from_secs_f64(run_state.timestep);
        run_state.steps_run += 1;
        steps_this_wake += 1;
        if !run_state.steps_remaining() {
            run_state.active = false;
        }
    }
}

fn note_sim_run_json(value: &Value, run_state: &mut RunState) {
    match value.get("command").and_then(Value::as_str) {
        Some("sim_run") => run_state.start(&SimRunCommand::from_json(value).unwrap_or_default()),
        Some("sim_pause") => run_state.active = false,
        _ => {}
    }
}

fn note_sim_run_binary(bytes: &[u8], run_state: &mut RunState) {
    let Ok(envelope) = Envelope::decode_binary(bytes) else { return };
    match envelope.message_type.as_str() {
        "sim_run" => {
            let mut reader = Reader::new(&envelope.payload);
            if let Ok(cmd) = SimRunCommand::decode(&mut reader) {
                run_state.start(&cmd);
            }
        }
        "sim_pause" => run_state.active = false,
        _ => {}
    }
}
