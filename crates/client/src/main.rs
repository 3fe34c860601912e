mod bot;
mod config;

use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Result, bail};
use clap::Parser;

use bot::{BotWorld, Flight};
use config::BotConfig;
use dogfight::{ClientSession, DEFAULT_PORT, GameplayEvent, NetworkThread, PacketLossSimulation};

#[derive(Parser)]
#[command(name = "dogfight-client")]
#[command(about = "Headless bot that joins a dogfight session")]
struct Args {
    #[arg(short, long, default_value = "127.0.0.1", help = "Host address")]
    server: String,

    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    #[arg(long, default_value_t = 0.0, help = "Altitude offset so bots fly apart")]
    offset: f32,

    #[arg(long, help = "Leave after this many seconds")]
    duration: Option<u64>,

    #[arg(long, help = "Enable outbound packet loss simulation")]
    simulate_packet_loss: bool,

    #[arg(long, default_value_t = 0.0, help = "Packet loss percentage (0-100)")]
    loss_percent: f32,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let mut config = BotConfig::default();
    if args.simulate_packet_loss {
        config.session.packet_loss = Some(PacketLossSimulation::new(args.loss_percent / 100.0));
    }

    let mut session = ClientSession::new(config.session.clone());
    session.connect((args.server.as_str(), args.port))?;
    let mut network = NetworkThread::spawn(session, config.network_poll_interval)?;

    let mut world = BotWorld::new(config.interpolation.clone());
    let flight = Flight::new(args.offset);
    let deadline = args.duration.map(|secs| Instant::now() + Duration::from_secs(secs));
    let mut last_report = Instant::now();
    let mut last_respawn = Instant::now();

    loop {
        let now = Instant::now();
        if deadline.is_some_and(|deadline| now >= deadline) {
            log::info!("Time is up, leaving");
            break;
        }

        network.events().drain_into(&mut world);
        if let Some(failure) = world.failure() {
            network.stop();
            bail!("{}", failure.as_str());
        }

        if world.identity().is_some() {
            network.publish_local_state(flight.state_at(now, world.health()));

            if world.health() <= 0 || now.duration_since(last_respawn) >= config.respawn_interval {
                world.revive();
                last_respawn = now;
                let position = flight.state_at(now, world.health()).position;
                network.send_gameplay(GameplayEvent::Respawn { position });
            }
        }

        if now.duration_since(last_report) >= config.report_interval {
            last_report = now;
            report(&world, now);
        }

        thread::sleep(config.frame_duration());
    }

    network.stop();
    Ok(())
}

fn report(world: &BotWorld, now: Instant) {
    let stats = world.interpolator().debug_stats(now);
    log::info!(
        "Tracking {} remote players ({} extrapolating)",
        stats.tracked,
        stats.extrapolating
    );

    for state in world.interpolator().sample_all(now) {
        log::debug!(
            "  #{} at ({:.1}, {:.1}, {:.1}) hp {}",
            state.id,
            state.position[0],
            state.position[1],
            state.position[2],
            state.health
        );
    }
}
