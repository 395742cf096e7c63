//! Loop marker validation and global loop expansion
//!
//! Loops are marked with EMIDI controllers. Track loops (116/117) are
//! converted per track; global loops (118/119) on the root track are copied
//! into every track as track loops before conversion.

use super::track::{TrackMap, TrackRole};
use crate::error::{Error, Result};
use crate::midi::controller::{GLOBAL_LOOP_BEGIN, GLOBAL_LOOP_END, LOOP_BEGIN, LOOP_END};
use crate::midi::{ChannelMessage, Event, EventKind, Sequence};

/// An open loop while a track is being converted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopFrame {
    /// Closed by a plain loop-end instruction
    Counted,
    /// Closed by an exclusive seek back to this offset
    Infinite(u32),
}

/// Check that loop begin and end markers pair up across the whole file
pub fn validate(sequence: &Sequence) -> Result<()> {
    let mut scope = 0i32;
    for track in &sequence.tracks {
        for (_, controller, _) in track.controllers() {
            match controller {
                LOOP_BEGIN | GLOBAL_LOOP_BEGIN => scope += 1,
                LOOP_END | GLOBAL_LOOP_END => scope -= 1,
                _ => {}
            }
            if scope < 0 {
                return Err(Error::LoopMissingStart);
            }
        }
    }
    if scope > 0 {
        return Err(Error::LoopMissingEnd);
    }
    Ok(())
}

fn is_global_loop(controller: u8) -> bool {
    matches!(controller, GLOBAL_LOOP_BEGIN | GLOBAL_LOOP_END)
}

/// Replace global loop markers in every track with track loop markers
/// copied from the root track. Returns false if the root has none.
pub fn expand_global_loops(sequence: &mut Sequence, tracks: &TrackMap) -> bool {
    let markers: Vec<(u64, u8, u8, u8)> = sequence.tracks[tracks.root.index]
        .controllers()
        .filter(|(_, controller, _)| is_global_loop(*controller))
        .filter_map(|(event, controller, value)| {
            event
                .channel()
                .map(|channel| (event.time, channel, controller, value))
        })
        .collect();

    if markers.is_empty() {
        return false;
    }

    for (index, track) in sequence.tracks.iter_mut().enumerate() {
        track
            .events
            .retain(|e| !track_controller(e).is_some_and(is_global_loop));

        let channel = match tracks.role_of(index) {
            Some(TrackRole::Child(id)) => Some(id),
            Some(TrackRole::Root) => tracks.root.channel,
            None => None,
        };

        // Markers sharing a tick are inserted as one run in root order, so an
        // end followed by a begin at the same tick stays sequential. A run
        // opening with a begin goes before the tick's other events.
        for run in markers.chunk_by(|a, b| a.0 == b.0) {
            let (time, _, first_controller, _) = run[0];
            let events = run.iter().map(|&(time, marker_channel, controller, value)| {
                Event::controller(
                    time,
                    channel.unwrap_or(marker_channel),
                    controller - 2,
                    value,
                )
            });
            track.insert_at(time, events, first_controller == GLOBAL_LOOP_BEGIN);
        }
    }

    true
}

fn track_controller(event: &Event) -> Option<u8> {
    match event.kind {
        EventKind::Channel {
            message: ChannelMessage::Controller { controller, .. },
            ..
        } => Some(controller),
        _ => None,
    }
}
