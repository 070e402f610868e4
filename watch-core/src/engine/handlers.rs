//! Inbound envelope handlers

use tracing::{debug, info};

use super::{Engine, Resync, TimerKind};
use crate::drift::{Beacon, Correction};
use crate::sync::{
    ChatLine, CommandAction, Envelope, LocalFileMeta, ReadinessTransition, RoomStatePayload,
    VideoMode,
};

impl Engine {
    /// Route one decoded envelope
    pub(super) fn dispatch(&mut self, envelope: Envelope) {
        debug!("Inbound {}", envelope.kind());

        match envelope {
            Envelope::Connected { client_id } => {
                info!("Relay assigned id {}", client_id);
                self.state.set_self_id(client_id);
            }

            Envelope::RoomCreated { room } => {
                info!("Room created: {}", room.as_deref().unwrap_or("?"));
            }

            Envelope::RoomState { state } => self.handle_room_state(state),

            Envelope::Participants { list } => {
                let change = self.state.sync_roster(&list);
                if change.is_empty() {
                    return;
                }
                debug!(
                    "Roster: +{:?} -{:?} ({} present)",
                    change.added,
                    change.removed,
                    self.state.participants().len()
                );
                // newcomers start with everyone unready
                if !change.added.is_empty() {
                    self.reannounce_ready();
                }
            }

            Envelope::Ready { from, ready } => {
                let Some(from) = from else {
                    debug!("Ignoring ready without sender");
                    return;
                };
                let before = self.state.all_ready();
                self.state.set_ready(&from, ready);
                if self.state.self_id() == Some(from.as_str()) {
                    self.state.set_self_ready(ready);
                }
                let after = self.state.all_ready();

                if ReadinessTransition::between(before, after) == ReadinessTransition::BecameUnready {
                    self.consensus_lost();
                }
            }

            Envelope::LocalMeta {
                from,
                duration,
                size,
            } => {
                let Some(from) = from else {
                    debug!("Ignoring localMeta without sender");
                    return;
                };
                let previous = self.state.mode();
                let meta = LocalFileMeta {
                    duration_secs: duration,
                    size_bytes: size,
                };
                if !self.state.record_local_meta(&from, meta) {
                    debug!("Ignoring localMeta from {} while streaming", from);
                    return;
                }
                if previous == VideoMode::None {
                    self.ports.observer.on_mode_changed(VideoMode::Local);
                }
            }

            Envelope::Video { mode, video_id } => match (mode, video_id) {
                (VideoMode::Streamed, Some(video_id)) => {
                    if self.is_current_stream(&video_id) {
                        debug!("Video {} already loaded", video_id);
                        return;
                    }
                    self.load_streamed(video_id, None);
                }
                (VideoMode::Streamed, None) => debug!("Ignoring streamed video without id"),
                (VideoMode::Local, _) => self.enter_local(),
                (VideoMode::None, _) => self.apply_clear(),
            },

            Envelope::Command { action } => {
                // the host already applied its own command
                if self.state.is_host() {
                    return;
                }
                match action {
                    CommandAction::Play => {
                        self.with_player("play", |p| p.play());
                        self.state.set_playing(true);
                        self.amend_resync(None, Some(true));
                    }
                    CommandAction::Pause => {
                        self.with_player("pause", |p| p.pause());
                        self.state.set_playing(false);
                        self.amend_resync(None, Some(false));
                    }
                }
            }

            Envelope::ClearVideo => self.apply_clear(),

            Envelope::Heartbeat { position, wall_ts } => {
                self.handle_beacon(Beacon {
                    position,
                    sent_at_ms: wall_ts,
                });
            }

            Envelope::Seek { position } => {
                // the host owns the timeline
                if self.state.is_host() {
                    return;
                }
                self.amend_resync(Some(position), None);
                if self.state.mode() == VideoMode::None {
                    return;
                }
                self.with_player("seek", |p| p.seek_to(position));
                self.state.set_position(position);
            }

            Envelope::Chat {
                from_name, text, ..
            } => {
                let line = ChatLine { from_name, text };
                self.state.push_chat(line.clone());
                self.ports.observer.on_chat(&line);
            }

            Envelope::CreateRoom { .. } | Envelope::Join { .. } => {
                debug!("Ignoring outbound-only envelope from relay");
            }

            Envelope::Unknown => debug!("Ignoring unknown envelope"),
        }
    }

    /// Late-join resync
    fn handle_room_state(&mut self, payload: RoomStatePayload) {
        let Some(video) = payload.video else {
            return;
        };
        match (video.mode, video.video_id) {
            (VideoMode::Streamed, Some(video_id)) => {
                info!(
                    "Joining mid-session: {} at {:.2}s ({})",
                    video_id,
                    payload.position,
                    if payload.playing { "playing" } else { "paused" }
                );
                self.load_streamed(
                    video_id,
                    Some(Resync {
                        position: payload.position,
                        playing: payload.playing,
                    }),
                );
            }
            (VideoMode::Local, _) => self.enter_local(),
            _ => {}
        }
    }

    /// Non-host drift correction against one host beacon
    fn handle_beacon(&mut self, beacon: Beacon) {
        if self.state.is_host() {
            return;
        }
        self.amend_resync(Some(beacon.position), None);
        if self.state.mode() != VideoMode::Streamed {
            return;
        }
        let Some(local) = self.player_time() else {
            return;
        };

        let now = self.ports.clock.now_ms();
        let reading = self.drift.observe(&beacon, now, local);
        self.state.set_position(reading.expected);

        match reading.correction {
            Correction::Hard { target } => {
                info!("Drift {:+.2}s, seeking to {:.2}s", reading.diff, target);
                self.with_player("seek", |p| p.seek_to(target));
            }
            Correction::Soft { rate } => {
                self.with_player("rate", |p| p.set_playback_rate(rate));
                self.rate_nudged = true;
                self.ports
                    .scheduler
                    .schedule_once(TimerKind::RateRevert, self.config.soft_revert_after);
            }
            Correction::None => {}
        }

        if let Some(status) = self.drift.status() {
            self.ports.observer.on_sync_status(&status);
        }
    }
}
