//! MIDI to BMS converter
//!
//! The root track is written first, preceded by one add-child instruction per
//! detected channel. Each child track is then appended in channel order and
//! its start offset is patched into the matching add-child instruction.

pub mod controller;
pub mod loops;
pub mod options;
pub mod track;
pub mod voice;

pub use options::{Options, TrackDetection};
pub use track::{TrackInfo, TrackMap, TrackRole, TrackTags};

use crate::bms::commands::MAX_CHILDREN;
use crate::bms::{BmsWriter, PerfType, PerfValue, Point, SeekMode};
use crate::error::{Error, Result};
use crate::midi::controller as cc;
use crate::midi::{
    ChannelMessage, EventKind, MetaMessage, Sequence, Track, PLACEHOLDER_MANUFACTURER_ID,
};
use controller::ControllerPair;
use loops::LoopFrame;
use std::fs::File;
use std::io::{BufWriter, Seek, Write};
use std::path::Path;
use tracing::{debug, info, trace};
use voice::VoicePool;

/// MIDI to BMS converter
#[derive(Debug, Clone, Default)]
pub struct Converter {
    pub options: Options,
}

impl Converter {
    pub fn new(options: Options) -> Self {
        Self { options }
    }

    /// Convert a MIDI file to a BMS file
    ///
    /// A failed conversion may leave a partial output file behind; it is not
    /// valid BMS and should be discarded.
    pub fn convert_file(&self, input: &Path, output: &Path) -> Result<()> {
        info!("Loading MIDI from {}", input.display());
        let sequence = Sequence::from_file(input)?;

        let file = File::create(output)?;
        self.convert(sequence, BufWriter::new(file))?;
        info!("Wrote {}", output.display());
        Ok(())
    }

    /// Convert a parsed sequence, writing BMS data to `sink`
    pub fn convert<W: Write + Seek>(&self, mut sequence: Sequence, sink: W) -> Result<W> {
        info!("Detecting tracks");
        let tracks = TrackMap::classify(&sequence, self.options.track_detection)?;
        debug!(
            "Root track is {}, children on channels {:?}",
            tracks.root.index,
            tracks
                .children()
                .map(|c| c.channel.unwrap_or_default())
                .collect::<Vec<_>>()
        );

        info!("Checking loop points");
        loops::validate(&sequence)?;
        if loops::expand_global_loops(&mut sequence, &tracks) {
            info!("Converted global loop points");
        }

        info!("Writing BMS");
        let mut run = Conversion::new(&self.options, BmsWriter::new(sink));

        let mut child_points: [Option<Point>; MAX_CHILDREN] = Default::default();
        for child in tracks.children() {
            if let TrackRole::Child(id) = child.role {
                child_points[id as usize] = Some(run.writer.write_add_child(id)?);
            }
        }
        run.writer.write_ppqn(sequence.ticks_per_beat)?;

        info!("Writing root track");
        run.convert_track(&sequence.tracks[tracks.root.index], &tracks.root)?;

        for (point, child) in child_points.into_iter().zip(&tracks.children) {
            let (Some(point), Some(child)) = (point, child) else {
                continue;
            };
            info!("Writing child track {}", child.channel.unwrap_or_default());
            run.writer.close_point(point)?;
            if self.options.add_track_init {
                run.writer.write_track_init(child.arg.unwrap_or(0))?;
            }
            run.convert_track(&sequence.tracks[child.index], child)?;
        }

        info!("Finished writing BMS ({} bytes)", run.writer.position());
        run.writer.finish()
    }
}

/// Mutable state of a single conversion run
struct Conversion<'a, W: Write + Seek> {
    options: &'a Options,
    writer: BmsWriter<W>,
    voices: VoicePool,
    loops: Vec<LoopFrame>,
    bank: ControllerPair,
    volume: ControllerPair,
    pan: ControllerPair,
}

impl<'a, W: Write + Seek> Conversion<'a, W> {
    fn new(options: &'a Options, writer: BmsWriter<W>) -> Self {
        Self {
            options,
            writer,
            voices: VoicePool::new(),
            loops: Vec::new(),
            bank: ControllerPair::new(),
            volume: ControllerPair::new(),
            pan: ControllerPair::new(),
        }
    }

    fn convert_track(&mut self, track: &Track, info: &TrackInfo) -> Result<()> {
        let mut time = 0u64;
        let mut ended = false;

        for event in &track.events {
            self.writer.write_delay(event.time.saturating_sub(time))?;
            time = event.time;

            match &event.kind {
                EventKind::Channel { channel, message } => {
                    if info.channel == Some(*channel) {
                        self.convert_channel_message(message)?;
                    }
                }
                EventKind::Meta(meta) => {
                    self.convert_meta(meta)?;
                    ended = matches!(meta, MetaMessage::EndOfTrack);
                }
                EventKind::SysEx(_) => {}
            }
        }

        if !ended {
            self.writer.write_track_end()?;
        }

        if !self.loops.is_empty() {
            return Err(Error::UnclosedLoop {
                track: match info.role {
                    TrackRole::Root => "root".to_string(),
                    TrackRole::Child(id) => format!("child {}", id),
                },
            });
        }

        Ok(())
    }

    fn convert_channel_message(&mut self, message: &ChannelMessage) -> Result<()> {
        let options = self.options;
        match *message {
            ChannelMessage::NoteOn { key, vel } if vel > 0 => {
                let voice = self.voices.allocate(key)? as u8 + 1;
                trace!("Note {} on voice {}", key, voice);
                self.writer
                    .write_voice_on(key, voice, options.scale_velocity(vel))?;
            }
            ChannelMessage::NoteOn { key, .. } | ChannelMessage::NoteOff { key, .. } => {
                let voice = self.voices.release(key)? as u8 + 1;
                trace!("Note {} off voice {}", key, voice);
                self.writer.write_voice_off(voice)?;
            }
            ChannelMessage::PitchBend { bend } if !options.ignore_pitch_bends => {
                let value = ((bend as i32 - 8192) * 4) as i16;
                self.writer
                    .write_perf(PerfType::Pitch, PerfValue::S16(value), options.perf_duration)?;
            }
            ChannelMessage::ProgramChange { program } if !options.ignore_programs => {
                self.writer.write_program_select(program)?;
            }
            ChannelMessage::Controller { controller, value } => {
                self.convert_controller(controller, value)?;
            }
            ChannelMessage::PitchBend { .. }
            | ChannelMessage::ProgramChange { .. }
            | ChannelMessage::Aftertouch { .. }
            | ChannelMessage::ChannelAftertouch { .. } => {}
        }
        Ok(())
    }

    fn convert_controller(&mut self, controller: u8, value: u8) -> Result<()> {
        let options = self.options;
        let msb = cc::is_msb(controller);
        match controller {
            cc::BANK_SELECT_MSB | cc::BANK_SELECT_LSB if !options.ignore_banks => {
                self.bank.set(value, msb);
                self.writer.write_bank_select(self.bank.value()?)?;
            }
            cc::VOLUME_MSB | cc::VOLUME_LSB if !options.ignore_volumes => {
                self.volume.set(value, msb);
                let volume = self.volume.value()? as i16;
                self.writer
                    .write_perf(PerfType::Volume, PerfValue::S16(volume), options.perf_duration)?;
            }
            cc::PAN_MSB | cc::PAN_LSB if !options.ignore_pans => {
                self.pan.set(value, msb);
                let pan = self.pan.value()? as i16;
                self.writer
                    .write_perf(PerfType::Pan, PerfValue::S16(pan), options.perf_duration)?;
            }
            cc::LOOP_BEGIN => {
                if value > 0 {
                    self.writer.write_loop_begin(value as u16)?;
                    self.loops.push(LoopFrame::Counted);
                } else {
                    self.loops.push(LoopFrame::Infinite(self.writer.position()));
                }
            }
            cc::LOOP_END => match self.loops.pop().ok_or(Error::LoopMissingStart)? {
                LoopFrame::Counted => self.writer.write_loop_end()?,
                LoopFrame::Infinite(offset) => {
                    self.writer.write_seek_ex_at(SeekMode::Always, offset)?
                }
            },
            _ => {}
        }
        Ok(())
    }

    fn convert_meta(&mut self, meta: &MetaMessage) -> Result<()> {
        match meta {
            MetaMessage::EndOfTrack => self.writer.write_track_end(),
            MetaMessage::Tempo(_) => match meta.bpm() {
                Some(bpm) => self.writer.write_tempo(bpm),
                None => Ok(()),
            },
            MetaMessage::SequencerSpecific { id, data } if *id == PLACEHOLDER_MANUFACTURER_ID => {
                self.writer.write_raw(data)
            }
            MetaMessage::SequencerSpecific { .. }
            | MetaMessage::TrackName(_)
            | MetaMessage::Other => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::midi::Event;
    use std::io::Cursor;

    fn convert(options: Options, tracks: Vec<Track>) -> Result<Vec<u8>> {
        let sequence = Sequence {
            ticks_per_beat: 480,
            tracks,
        };
        Converter::new(options)
            .convert(sequence, Cursor::new(Vec::new()))
            .map(Cursor::into_inner)
    }

    fn root() -> Track {
        Track::new(
            None,
            vec![
                Event::meta(0, MetaMessage::Tempo(500_000)),
                Event::meta(0, MetaMessage::EndOfTrack),
            ],
        )
    }

    fn child(channel: u8, events: Vec<(u64, ChannelMessage)>) -> Track {
        let end = events.last().map(|(t, _)| *t).unwrap_or(0);
        let mut events: Vec<Event> = events
            .into_iter()
            .map(|(t, m)| Event::channel_message(t, channel, m))
            .collect();
        events.push(Event::meta(end, MetaMessage::EndOfTrack));
        Track::new(None, events)
    }

    fn on(key: u8) -> ChannelMessage {
        ChannelMessage::NoteOn { key, vel: 100 }
    }

    fn off(key: u8) -> ChannelMessage {
        ChannelMessage::NoteOff { key, vel: 0 }
    }

    fn control(controller: u8, value: u8) -> ChannelMessage {
        ChannelMessage::Controller { controller, value }
    }

    #[test]
    fn test_single_note() {
        let out = convert(
            Options::default(),
            vec![root(), child(0, vec![(0, on(60)), (480, off(60))])],
        )
        .unwrap();
        assert_eq!(
            out,
            vec![
                0xC1, 0x00, 0x00, 0x00, 0x0C, // add child 0
                0xFE, 0x01, 0xE0, // ppqn 480
                0xFD, 0x00, 0x78, // tempo 120
                0xFF, // root end
                60, 0x01, 100, // note on, voice 1
                0x88, 0x01, 0xE0, // delay 480
                0x81, // voice 1 off
                0xFF,
            ]
        );
    }

    #[test]
    fn test_velocity_scale_not_applied() {
        let tracks = || vec![root(), child(0, vec![(0, on(60)), (480, off(60))])];
        let scaled = convert(
            Options {
                velocity_scale: 0.5,
                ..Options::default()
            },
            tracks(),
        )
        .unwrap();
        assert_eq!(scaled, convert(Options::default(), tracks()).unwrap());
        assert_eq!(&scaled[12..15], &[60, 0x01, 100]);
    }

    #[test]
    fn test_controller_state_spans_tracks() {
        let out = convert(
            Options::default(),
            vec![
                root(),
                child(
                    0,
                    vec![(0, control(cc::VOLUME_MSB, 100)), (0, on(60)), (1, off(60))],
                ),
                // only the low half is sent here; the high half carries over
                child(
                    1,
                    vec![(0, control(cc::VOLUME_LSB, 5)), (0, on(62)), (1, off(62))],
                ),
            ],
        )
        .unwrap();
        assert_eq!(&out[5..10], &[0xC1, 0x01, 0x00, 0x00, 0x1C]);
        assert_eq!(
            &out[0x1C..],
            &[
                0x9C, 0x00, 0x32, 0x05, // (100 << 7) | 5
                62, 0x01, 100, //
                0x80, 0x01, //
                0x81, //
                0xFF,
            ]
        );
    }

    #[test]
    fn test_velocity_zero_releases() {
        let out = convert(
            Options::default(),
            vec![
                root(),
                child(
                    2,
                    vec![(0, on(60)), (10, ChannelMessage::NoteOn { key: 60, vel: 0 })],
                ),
            ],
        )
        .unwrap();
        assert_eq!(&out[12..], &[60, 1, 100, 0x80, 10, 0x81, 0xFF]);
    }

    #[test]
    fn test_other_channels_skipped() {
        let mut track = child(1, vec![(0, on(60)), (10, off(60))]);
        track
            .events
            .insert(1, Event::channel_message(5, 9, on(40)));
        let out = convert(Options::default(), vec![root(), track]).unwrap();
        assert_eq!(&out[12..], &[60, 1, 100, 0x80, 5, 0x80, 5, 0x81, 0xFF]);
    }

    #[test]
    fn test_controllers() {
        let out = convert(
            Options {
                perf_duration: 4,
                ..Options::default()
            },
            vec![
                root(),
                child(
                    0,
                    vec![
                        (0, control(cc::VOLUME_MSB, 100)),
                        (0, control(cc::PAN_MSB, 64)),
                        (0, control(cc::PAN_LSB, 1)),
                        (0, control(cc::BANK_SELECT_MSB, 1)),
                        (0, ChannelMessage::ProgramChange { program: 5 }),
                        (0, ChannelMessage::PitchBend { bend: 8192 + 100 }),
                    ],
                ),
            ],
        )
        .unwrap();
        assert_eq!(
            &out[12..],
            &[
                0x9E, 0x00, 0x32, 0x00, 0x04, // volume 100 << 7
                0x9E, 0x03, 0x20, 0x00, 0x04, // pan 64 << 7
                0x9E, 0x03, 0x20, 0x01, 0x04, // pan | 1
                0xAC, 0x20, 0x00, 0x80, // bank 1 << 7
                0xA4, 0x21, 0x05, // program 5
                0x9E, 0x01, 0x01, 0x90, 0x04, // pitch 400
                0xFF,
            ]
        );
    }

    #[test]
    fn test_ignore_flags() {
        let out = convert(
            Options {
                ignore_volumes: true,
                ignore_pans: true,
                ignore_banks: true,
                ignore_programs: true,
                ignore_pitch_bends: true,
                ..Options::default()
            },
            vec![
                root(),
                child(
                    0,
                    vec![
                        (0, control(cc::VOLUME_MSB, 100)),
                        (0, control(cc::PAN_LSB, 1)),
                        (0, control(cc::BANK_SELECT_LSB, 1)),
                        (0, ChannelMessage::ProgramChange { program: 5 }),
                        (0, ChannelMessage::PitchBend { bend: 0 }),
                    ],
                ),
            ],
        )
        .unwrap();
        assert_eq!(&out[12..], &[0xFF]);
    }

    #[test]
    fn test_incomplete_controller() {
        let result = convert(
            Options::default(),
            vec![root(), child(0, vec![(0, control(cc::VOLUME_LSB, 3))])],
        );
        assert!(matches!(result, Err(Error::IncompleteController)));
    }

    #[test]
    fn test_loops() {
        let out = convert(
            Options::default(),
            vec![
                root(),
                child(
                    0,
                    vec![
                        (0, control(cc::LOOP_BEGIN, 0)),
                        (0, control(cc::LOOP_BEGIN, 3)),
                        (0, on(60)),
                        (10, off(60)),
                        (10, control(cc::LOOP_END, 0)),
                        (10, control(cc::LOOP_END, 0)),
                    ],
                ),
            ],
        )
        .unwrap();
        assert_eq!(
            &out[12..],
            &[
                0xC9, 0x00, 0x03, // counted loop
                60, 0x01, 100, //
                0x80, 10, //
                0x81, //
                0xCA, // counted loop end
                0xC8, 0x00, 0x00, 0x00, 0x0C, // seek back to child start
                0xFF,
            ]
        );
    }

    #[test]
    fn test_consecutive_global_loops() {
        let root = Track::new(
            None,
            vec![
                Event::controller(0, 0, cc::GLOBAL_LOOP_BEGIN, 2),
                Event::controller(96, 0, cc::GLOBAL_LOOP_END, 0),
                Event::controller(96, 0, cc::GLOBAL_LOOP_BEGIN, 0),
                Event::controller(192, 0, cc::GLOBAL_LOOP_END, 0),
                Event::meta(192, MetaMessage::EndOfTrack),
            ],
        );
        let out = convert(
            Options::default(),
            vec![
                root,
                child(0, vec![(0, on(60)), (96, off(60)), (96, on(62)), (192, off(62))]),
            ],
        )
        .unwrap();
        assert_eq!(
            out,
            vec![
                0xC1, 0x00, 0x00, 0x00, 0x0D, //
                0xFE, 0x01, 0xE0, //
                0x80, 0x60, 0x80, 0x60, 0xFF, // root keeps only the timing
                0xC9, 0x00, 0x02, // counted loop
                60, 0x01, 100, //
                0x80, 0x60, //
                0x81, //
                62, 0x01, 100, //
                0xCA, // counted loop closes before the next one opens
                0x80, 0x60, //
                0x81, //
                0xC8, 0x00, 0x00, 0x00, 0x1A, // seek back past the loop end
                0xFF,
            ]
        );
    }

    #[test]
    fn test_unclosed_loop() {
        // the closing marker sits on another channel and is never converted
        let mut looped = child(
            1,
            vec![(0, control(cc::LOOP_BEGIN, 0)), (1, on(61)), (2, off(61))],
        );
        looped.events.push(Event::controller(3, 0, cc::LOOP_END, 0));

        let result = convert(
            Options::default(),
            vec![root(), child(0, vec![(0, on(60)), (5, off(60))]), looped],
        );
        assert!(matches!(result, Err(Error::UnclosedLoop { .. })));
    }

    #[test]
    fn test_voice_exhaustion() {
        let notes = (60..68).map(|k| (0, on(k))).collect();
        let result = convert(Options::default(), vec![root(), child(0, notes)]);
        assert!(matches!(
            result,
            Err(Error::VoicePoolExhausted { note: 67 })
        ));
    }

    #[test]
    fn test_track_init_and_order() {
        let mut tagged = child(5, vec![(0, on(62)), (1, off(62))]);
        tagged.name = Some("track-arg: 10h".to_string());
        let out = convert(
            Options {
                add_track_init: true,
                ..Options::default()
            },
            vec![root(), tagged, child(2, vec![(0, on(60)), (1, off(60))])],
        )
        .unwrap();

        // children are linked and written in channel order regardless of track order
        assert_eq!(&out[0..5], &[0xC1, 0x02, 0x00, 0x00, 0x11]);
        assert_eq!(&out[5..10], &[0xC1, 0x05, 0x00, 0x00, 0x1B]);
        assert_eq!(&out[0x11..0x14], &[0xE7, 0x00, 0x00]);
        assert_eq!(&out[0x1B..0x1E], &[0xE7, 0x00, 0x10]);
    }

    #[test]
    fn test_raw_passthrough() {
        let root = Track::new(
            None,
            vec![
                Event::meta(
                    0,
                    MetaMessage::SequencerSpecific {
                        id: PLACEHOLDER_MANUFACTURER_ID,
                        data: vec![0xE5, 0xE6],
                    },
                ),
                Event::meta(
                    0,
                    MetaMessage::SequencerSpecific {
                        id: 0x41,
                        data: vec![0x01],
                    },
                ),
                Event::meta(0, MetaMessage::EndOfTrack),
            ],
        );
        let out = convert(Options::default(), vec![root]).unwrap();
        assert_eq!(out, vec![0xFE, 0x01, 0xE0, 0xE5, 0xE6, 0xFF]);
    }

    #[test]
    fn test_missing_end_of_track() {
        let out = convert(
            Options::default(),
            vec![Track::new(None, vec![Event::meta(0, MetaMessage::Tempo(500_000))])],
        )
        .unwrap();
        assert_eq!(out, vec![0xFE, 0x01, 0xE0, 0xFD, 0x00, 0x78, 0xFF]);
    }
}
