use std::future::Future;
use std::sync::Arc;

use anyhow::anyhow;
use tokio::select;
use tokio::sync::{broadcast, mpsc};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, error, info, warn};

use crate::messaging::link_addr::LinkAddr;
use crate::messaging::messaging::{MessageSender, Messaging};
use crate::trajectory::dispatch::{dispatch, execute, TrajectoryCommand};
use crate::trajectory::trajectory_config::TrajectoryConfig;
use crate::trajectory::trajectory_item::TrajectorySet;
use crate::trajectory::trajectory_messages::{TrajectoryMessage, TrajectoryMessageModule, TRAJECTORY_MESSAGE_MODULE_ID};
use crate::trajectory::transfer_events::{TransferEvent, TransferEventNotifier};
use crate::trajectory::transfer_session::TransferSession;

pub mod dispatch;
pub mod initiator_role;
pub mod source_role;
pub mod trajectory_config;
pub mod trajectory_file;
pub mod trajectory_item;
pub mod trajectory_messages;
pub mod transfer_error;
pub mod transfer_events;
pub mod transfer_session;


/// Handle for controlling a trajectory link to a single peer. The link itself is driven by the
///  future returned from [TrajectoryLink::new], which terminates once all handles are dropped.
#[derive(Clone)]
pub struct TrajectoryLink {
    commands: mpsc::Sender<TrajectoryCommand>,
    events: Arc<TransferEventNotifier>,
}
impl TrajectoryLink {
    pub fn new<M: Messaging>(config: Arc<TrajectoryConfig>, messaging: Arc<M>) -> (TrajectoryLink, impl Future<Output = anyhow::Result<()>>) {
        let (commands_send, commands_recv) = mpsc::channel(config.command_queue_capacity);
        let events = Arc::new(TransferEventNotifier::new(config.event_queue_capacity));

        let link = TrajectoryLink {
            commands: commands_send,
            events: events.clone(),
        };
        (link, run_trajectory_link(config, messaging, commands_recv, events))
    }

    /// Sends `set` to the peer, replacing whatever this side held before.
    pub async fn upload(&self, set: TrajectorySet) -> anyhow::Result<()> {
        self.send_command(TrajectoryCommand::Upload(set)).await
    }

    /// Downloads the peer's trajectory. The result arrives as a [TransferEvent::Finished].
    pub async fn list(&self) -> anyhow::Result<()> {
        self.send_command(TrajectoryCommand::List).await
    }

    /// Tells the peer to discard its trajectory.
    pub async fn clear(&self) -> anyhow::Result<()> {
        self.send_command(TrajectoryCommand::Clear).await
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TransferEvent> {
        self.events.subscribe()
    }

    async fn send_command(&self, command: TrajectoryCommand) -> anyhow::Result<()> {
        self.commands.send(command).await
            .map_err(|_| anyhow!("trajectory link is shut down"))
    }
}


pub async fn run_trajectory_link<M: Messaging>(config: Arc<TrajectoryConfig>, messaging: Arc<M>, commands: mpsc::Receiver<TrajectoryCommand>, events: Arc<TransferEventNotifier>) -> anyhow::Result<()> {
    let (send, recv) = mpsc::channel(config.inbound_queue_capacity);
    messaging.register_module(TrajectoryMessageModule::new(send)).await?;

    info!(myself = ?messaging.get_self_addr(), peer = ?config.peer, "starting trajectory link");
    trajectory_loop(config, messaging.clone(), recv, commands, events).await;

    messaging.deregister_module(TRAJECTORY_MESSAGE_MODULE_ID).await
}

async fn trajectory_loop<S: MessageSender>(
    config: Arc<TrajectoryConfig>,
    sender: Arc<S>,
    mut inbound: mpsc::Receiver<(LinkAddr, TrajectoryMessage)>,
    mut commands: mpsc::Receiver<TrajectoryCommand>,
    events: Arc<TransferEventNotifier>,
) {
    let mut session = TransferSession::new(config.max_retries);
    let mut retry_deadline: Option<Instant> = None;

    loop {
        let reply = select! {
            msg = inbound.recv() => {
                let Some((from, msg)) = msg else {
                    error!("inbound channel closed unexpectedly - shutting down trajectory link");
                    break;
                };
                if from.is_same_endpoint(&config.peer) {
                    dispatch(&mut session, msg)
                }
                else {
                    warn!(?from, "discarding {} message from unexpected sender", msg.kind());
                    None
                }
            }
            cmd = commands.recv() => {
                match cmd {
                    Some(cmd) => {
                        debug!(?cmd, "executing command");
                        execute(&mut session, cmd)
                    }
                    None => {
                        info!("all handles dropped - shutting down trajectory link");
                        break;
                    }
                }
            }
            _ = sleep_until(retry_deadline.unwrap_or_else(Instant::now)), if retry_deadline.is_some() => {
                session.on_timeout()
            }
        };

        let sent_message = reply.is_some();
        if let Some(reply) = reply {
            sender.send(config.peer, &reply).await;
        }

        for evt in session.take_events() {
            events.send_event(evt);
        }

        retry_deadline = if !session.is_in_progress() {
            None
        }
        else if sent_message {
            Some(Instant::now() + config.retry_timeout)
        }
        else {
            retry_deadline
        };
    }
}
