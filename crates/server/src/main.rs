mod config;
mod events;
mod pilot;
mod tui;

use std::io;
use std::net::IpAddr;
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Result;
use clap::Parser;
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::terminal::{self, EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::{cursor, execute};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;

use config::ServerConfig;
use dogfight::{HostSession, PacketLossSimulation, local_ip};
use events::{Severity, describe, log_event};
use pilot::ScriptedPilot;
use tui::{Dashboard, TuiState};

const FRAME: Duration = Duration::from_millis(1);

#[derive(Parser)]
#[command(name = "dogfight-server")]
#[command(about = "Hosts a dogfight session with a scripted host pilot")]
struct Args {
    #[arg(short, long, help = "TOML file with [session] and [pilot] tables")]
    config: Option<PathBuf>,

    #[arg(short, long)]
    bind: Option<IpAddr>,

    #[arg(short, long)]
    port: Option<u16>,

    #[arg(short, long)]
    tick_rate: Option<u32>,

    #[arg(short, long, help = "Peers allowed, host included")]
    max_peers: Option<usize>,

    #[arg(long, help = "Milliseconds of silence before a peer is dropped")]
    peer_timeout_ms: Option<u64>,

    #[arg(long)]
    headless: bool,

    #[arg(long, help = "Stop hosting after this many seconds")]
    duration: Option<u64>,

    #[arg(long, help = "Enable outbound packet loss simulation")]
    simulate_packet_loss: bool,

    #[arg(long, default_value_t = 0.0, help = "Packet loss percentage (0-100)")]
    loss_percent: f32,
}

impl Args {
    fn into_config(self) -> Result<ServerConfig> {
        let mut config = match &self.config {
            Some(path) => ServerConfig::load(path)?,
            None => ServerConfig::default(),
        };

        let session = &mut config.session;
        if let Some(bind) = self.bind {
            session.bind_address = bind;
        }
        if let Some(port) = self.port {
            session.port = port;
        }
        if let Some(tick_rate) = self.tick_rate {
            session.tick_rate = tick_rate;
        }
        if let Some(max_peers) = self.max_peers {
            session.max_peers = max_peers;
        }
        if let Some(timeout) = self.peer_timeout_ms {
            session.peer_timeout_ms = timeout;
        }
        if self.simulate_packet_loss {
            session.packet_loss = Some(PacketLossSimulation::new(self.loss_percent / 100.0));
        }

        Ok(config)
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    let headless = args.headless;
    let deadline = args.duration.map(|secs| Instant::now() + Duration::from_secs(secs));
    let config = args.into_config()?;

    if headless {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    }

    let mut host = HostSession::start(config.session.clone())?;
    let mut pilot = ScriptedPilot::new(config.pilot.clone());

    if headless {
        if let Some(addr) = host.local_addr() {
            log::info!("Players can join at {}:{}", local_ip(), addr.port());
        }
        run_headless(&mut host, &mut pilot, deadline);
    } else {
        run_with_tui(&mut host, &mut pilot, deadline)?;
    }

    host.stop();
    log::info!("Server shutting down");
    Ok(())
}

fn step(host: &mut HostSession, pilot: &mut ScriptedPilot, last: &mut Instant) {
    let now = Instant::now();
    host.update(now - *last, pilot);
    *last = now;

    if let Some((origin, direction)) = pilot.take_shot(now) {
        host.fire_shot(origin, direction);
    }
}

fn expired(deadline: Option<Instant>) -> bool {
    deadline.is_some_and(|deadline| Instant::now() >= deadline)
}

fn run_headless(host: &mut HostSession, pilot: &mut ScriptedPilot, deadline: Option<Instant>) {
    let events = host.events();
    let mut last = Instant::now();

    while !expired(deadline) {
        step(host, pilot, &mut last);
        for event in events.drain() {
            log_event(&event);
        }
        thread::sleep(FRAME);
    }
}

fn run_with_tui(
    host: &mut HostSession,
    pilot: &mut ScriptedPilot,
    deadline: Option<Instant>,
) -> io::Result<()> {
    terminal::enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, cursor::Hide)?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let events = host.events();
    let lan_ip = local_ip();
    let started = Instant::now();
    let mut tui_state = TuiState::new();
    let mut last = Instant::now();

    if let Some(addr) = host.local_addr() {
        tui_state.log(Severity::Info, format!("Hosting on {}", addr));
    }

    while !expired(deadline) {
        step(host, pilot, &mut last);

        for event in events.drain() {
            if let Some((severity, line)) = describe(&event) {
                tui_state.log(severity, line);
            }
        }

        if event::poll(FRAME)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press
                    && matches!(key.code, KeyCode::Char('q') | KeyCode::Esc)
                {
                    break;
                }
            }
        }

        let dashboard = Dashboard {
            local_addr: host.local_addr(),
            lan_ip,
            uptime_secs: started.elapsed().as_secs(),
            tick: host.current_tick(),
            peer_count: host.peer_count(),
            max_peers: host.config().max_peers,
            roster: host.roster().read().values(),
            connected_secs: host
                .connections()
                .iter()
                .map(|conn| (conn.player_id, conn.joined_at.elapsed().as_secs()))
                .collect(),
            network: host.stats().cloned().unwrap_or_default(),
        };
        terminal.draw(|frame| {
            tui::render(frame, &tui_state, &dashboard);
        })?;
    }

    terminal::disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, cursor::Show)?;

    Ok(())
}
