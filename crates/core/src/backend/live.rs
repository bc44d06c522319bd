// crates/core/src/backend/live.rs
//! Live chat-server backend.
//!
//! One logical connection: connect, resolve the numeric room id, send the
//! auth frame, heartbeat on an interval, decode inbound frames, and emit
//! chat events with resolved avatars. A closed socket schedules a reconnect
//! after a fixed delay, with no retry bound; only disposal stops the loop.

use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, watch};
use tokio::time::{sleep, Duration, Instant};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{trace, warn};

use crate::avatar::AvatarCache;
use crate::codec::{self, FrameBody};
use crate::config::LiveConfig;
use crate::error::LookupError;
use crate::event::{BackendEvent, ChatEvent};
use crate::time::SystemClock;

/// Why one connection attempt ended.
enum StreamEnd {
    /// Disposed: emit nothing further, stop the task.
    Disposed,
    /// The socket closed or failed: reconnect after the delay.
    Closed,
}

pub(crate) async fn run(
    config: LiveConfig,
    events: mpsc::Sender<BackendEvent>,
    mut shutdown: watch::Receiver<bool>,
) {
    let client = reqwest::Client::new();
    let mut avatars = AvatarCache::new(config.avatar_api.clone(), Arc::new(SystemClock));
    // Resolved through the room api once and kept for the backend's lifetime.
    let mut room_id: Option<u64> = None;

    loop {
        if *shutdown.borrow() {
            return;
        }

        match connect_and_stream(
            &config,
            &client,
            &mut avatars,
            &mut room_id,
            &events,
            &mut shutdown,
        )
        .await
        {
            StreamEnd::Disposed => return,
            StreamEnd::Closed => {}
        }

        if send(&events, &shutdown, BackendEvent::Log("Disconnected".to_string()))
            .await
            .is_err()
        {
            return;
        }

        tokio::select! {
            _ = async { let _ = shutdown.wait_for(|stop| *stop).await; } => return,
            _ = sleep(config.reconnect_delay()) => {}
        }
    }
}

async fn connect_and_stream(
    config: &LiveConfig,
    client: &reqwest::Client,
    avatars: &mut AvatarCache,
    room_id: &mut Option<u64>,
    events: &mpsc::Sender<BackendEvent>,
    shutdown: &mut watch::Receiver<bool>,
) -> StreamEnd {
    let flag = shutdown.clone();

    let (socket, _) = match connect_async(&config.ws_url).await {
        Ok(connected) => connected,
        Err(error) => {
            warn!(url = %config.ws_url, %error, "connect failed");
            return StreamEnd::Closed;
        }
    };
    let (mut sink, mut stream) = socket.split();

    if send(events, &flag, BackendEvent::Log("Connected".to_string()))
        .await
        .is_err()
    {
        return StreamEnd::Disposed;
    }

    // Room-id resolution failure skips auth for this session but is not
    // fatal: the heartbeat still runs and the server may close us later.
    if room_id.is_none() {
        match resolve_room_id(client, &config.room_api, config.live_id).await {
            Ok(resolved) => *room_id = Some(resolved),
            Err(error) => {
                warn!(%error, live_id = config.live_id, "room id resolution failed");
                if send(
                    events,
                    &flag,
                    BackendEvent::Log(format!("Cannot resolve room id: {error}")),
                )
                .await
                .is_err()
                {
                    return StreamEnd::Disposed;
                }
            }
        }
    }
    if let Some(room) = *room_id {
        if let Err(error) = sink.send(Message::Binary(codec::encode_auth(room).into())).await {
            warn!(%error, "auth send failed");
            return StreamEnd::Closed;
        }
    }

    // The first heartbeat goes out immediately; each one after is armed only
    // once the previous send succeeded. A failed send leaves the timer
    // disarmed and the close transition takes over.
    let mut heartbeat = Box::pin(sleep(Duration::ZERO));
    let mut heartbeat_armed = true;

    loop {
        tokio::select! {
            _ = async { let _ = shutdown.wait_for(|stop| *stop).await; } => return StreamEnd::Disposed,
            _ = heartbeat.as_mut(), if heartbeat_armed => {
                match sink.send(Message::Binary(codec::encode_heartbeat().into())).await {
                    Ok(()) => heartbeat
                        .as_mut()
                        .reset(Instant::now() + config.heartbeat_interval()),
                    Err(error) => {
                        warn!(%error, "heartbeat send failed");
                        heartbeat_armed = false;
                    }
                }
            }
            message = stream.next() => match message {
                Some(Ok(Message::Binary(bytes))) => {
                    if handle_frame(&bytes, avatars, events, &flag).await.is_err() {
                        return StreamEnd::Disposed;
                    }
                }
                Some(Ok(Message::Close(_))) | None => return StreamEnd::Closed,
                Some(Ok(_)) => {}
                Some(Err(error)) => {
                    warn!(%error, "socket error");
                    return StreamEnd::Closed;
                }
            }
        }
    }
}

/// Decode one inbound frame and emit its chat message, if any. Malformed
/// frames are dropped with a warning; only disposal is an error here.
async fn handle_frame(
    bytes: &[u8],
    avatars: &mut AvatarCache,
    events: &mpsc::Sender<BackendEvent>,
    shutdown: &watch::Receiver<bool>,
) -> Result<(), ()> {
    let frame = match codec::decode(bytes) {
        Ok(frame) => frame,
        Err(error) => {
            warn!(%error, "dropping malformed frame");
            return send(events, shutdown, BackendEvent::Log(format!("Error: {error}"))).await;
        }
    };

    match frame.body {
        FrameBody::Action(action) => {
            let Some(message) = codec::danmu_message(&action) else {
                trace!(cmd = ?action.get("cmd").and_then(|c| c.as_str()), "ignoring action");
                return Ok(());
            };
            let face = match avatars.get(message.uid).await {
                Ok(url) => Some(url),
                Err(error) => {
                    warn!(uid = message.uid, %error, "avatar lookup failed");
                    None
                }
            };
            send(
                events,
                shutdown,
                BackendEvent::Chat(ChatEvent {
                    author: message.author,
                    face,
                    content: message.content,
                }),
            )
            .await
        }
        FrameBody::Activity(online) => {
            trace!(online, "activity");
            Ok(())
        }
        FrameBody::HeartbeatAck => {
            trace!("heartbeat ack");
            Ok(())
        }
        FrameBody::Unknown => {
            trace!(operation = frame.header.operation, "unknown operation");
            Ok(())
        }
    }
}

async fn resolve_room_id(
    client: &reqwest::Client,
    room_api: &str,
    live_id: u64,
) -> Result<u64, LookupError> {
    let body: serde_json::Value = client
        .get(format!("{room_api}?id={live_id}"))
        .send()
        .await?
        .json()
        .await?;
    body.pointer("/data/room_id")
        .and_then(|id| id.as_u64())
        .ok_or(LookupError::MissingField("data.room_id"))
}

/// Emit one event unless the backend has been disposed. `Err` means stop:
/// either disposal or a dropped receiver.
async fn send(
    events: &mpsc::Sender<BackendEvent>,
    shutdown: &watch::Receiver<bool>,
    event: BackendEvent,
) -> Result<(), ()> {
    if *shutdown.borrow() {
        return Err(());
    }
    events.send(event).await.map_err(|_| ())
}
