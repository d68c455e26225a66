use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use clap::Parser;
use tokio::select;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{info, warn, Level};
use trajectory_transfer::messaging::link_addr::LinkAddr;
use trajectory_transfer::messaging::messaging::Messaging;
use trajectory_transfer::trajectory::trajectory_config::TrajectoryConfig;
use trajectory_transfer::trajectory::trajectory_file::load_trajectory_file;
use trajectory_transfer::trajectory::transfer_events::TransferEvent;
use trajectory_transfer::trajectory::TrajectoryLink;

#[derive(Parser)]
struct Args {
    bind_address: String,
    peer_address: String,

    #[clap(long, default_value_t = 255)]
    system_id: u8,
    #[clap(long, default_value_t = 190)]
    component_id: u8,
    #[clap(long, default_value_t = 1)]
    peer_system_id: u8,
    #[clap(long, default_value_t = 1)]
    peer_component_id: u8,

    /// CSV file with a header line, then `command,frame,param1,param2,param3,x,y,z` per item
    #[clap(long)]
    upload: Option<PathBuf>,
    #[clap(long, default_value_t = false)]
    list: bool,
    #[clap(long, default_value_t = false)]
    clear: bool,
    /// keep running and answer the peer's requests
    #[clap(long, default_value_t = false)]
    serve: bool,

    #[clap(short, long, default_value_t = false)]
    verbose: bool,

    #[clap(long, default_value_t = false)]
    very_verbose: bool,
}

#[tokio::main]
pub async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let level = match (args.verbose, args.very_verbose) {
        (_, true) => Level::TRACE,
        (true, _) => Level::DEBUG,
        (false, false) => Level::INFO,
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .try_init()
        .ok();

    let num_actions = [args.upload.is_some(), args.list, args.clear, args.serve].iter()
        .filter(|&&a| a)
        .count();
    if num_actions != 1 {
        return Err(anyhow!("exactly one of --upload, --list, --clear or --serve is required"));
    }

    let bind_addr: SocketAddr = args.bind_address.parse()?;
    let peer_addr: SocketAddr = args.peer_address.parse()?;
    let peer = LinkAddr::new(args.peer_system_id, args.peer_component_id, peer_addr);

    let mut config = TrajectoryConfig::new(bind_addr, peer);
    config.system_id = args.system_id;
    config.component_id = args.component_id;
    let config = Arc::new(config);

    let messaging = Arc::new(config.bind_messaging().await?);
    let (link, driver) = TrajectoryLink::new(config.clone(), messaging.clone());
    let mut events = link.subscribe();

    let recv_messaging = messaging.clone();
    let receiver = tokio::spawn(async move { recv_messaging.recv().await });
    let driver = tokio::spawn(driver);

    let result = run_action(&args, &link, driver, &mut events).await;

    messaging.cancel_recv();
    receiver.await??;
    result
}

async fn run_action(args: &Args, link: &TrajectoryLink, driver: JoinHandle<anyhow::Result<()>>, events: &mut broadcast::Receiver<TransferEvent>) -> anyhow::Result<()> {
    if let Some(path) = &args.upload {
        link.upload(load_trajectory_file(path)?).await?;
    }
    else if args.list {
        link.list().await?;
    }
    else if args.clear {
        link.clear().await?;
        // the peer does not acknowledge, so there is nothing to wait for beyond sending
        sleep(Duration::from_millis(100)).await;
        return Ok(());
    }

    select! {
        result = driver => { result? }
        result = report_events(events, args.serve) => { result }
    }
}

async fn report_events(events: &mut broadcast::Receiver<TransferEvent>, serve: bool) -> anyhow::Result<()> {
    loop {
        match events.recv().await {
            Ok(TransferEvent::Finished(report)) => {
                info!(role = ?report.role, count = report.count, "transfer {}", report.outcome);
                if let Some(items) = &report.items {
                    for item in items.items() {
                        info!("{:?}", item);
                    }
                }
                if !serve {
                    return Ok(());
                }
            }
            Ok(evt) => info!("{:?}", evt),
            Err(RecvError::Lagged(n)) => warn!("missed {} transfer events", n),
            Err(RecvError::Closed) => return Ok(()),
        }
    }
}
