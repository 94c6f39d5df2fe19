#![allow(dead_code)]

use paulascan::chip::{
    CHANNELS, ChannelSnapshot, ChipEmulator, CiaState, MemoryReader, SnapshotAccessor, SongInfo,
    SparseMemory,
};

pub const SAMPLE_RATE: u32 = 44_100;
/// CIA timer reload for 125 BPM.
pub const CIA_125_BPM: u32 = 14_186;
/// CIA timer reload for 150 BPM.
pub const CIA_150_BPM: u32 = 11_822;
/// Player tick at 125 BPM (or a 50 Hz vertical blank) and 44.1 kHz.
pub const TICK_FRAMES_125: u64 = 882;
/// Player tick at 150 BPM and 44.1 kHz.
pub const TICK_FRAMES_150: u64 = 735;

pub const MELODY_SAMPLE: u32 = 0x1_0000;
pub const PAD_SAMPLE: u32 = 0x2_0000;
/// Where the pad's DMA pointer moves once the attack part has played.
pub const PAD_LOOP_START: u32 = 1_200;
pub const LATE_SAMPLE: u32 = 0x3_0000;

/// ProTracker periods, C-1 to B-3.
pub const PT_PERIODS: [u32; 36] = [
    856, 808, 762, 720, 678, 640, 604, 570, 538, 508, 480, 453, //
    428, 404, 381, 360, 339, 320, 302, 285, 269, 254, 240, 226, //
    214, 202, 190, 180, 170, 160, 151, 143, 135, 127, 120, 113,
];

/// Rows in one pass of the melody.
pub const MELODY_ROWS: usize = 32;

/// Song position of the last rendered frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub row: usize,
    /// Player tick within the row
    pub tick: u32,
}

#[derive(Debug, Clone, Copy)]
struct RowTiming {
    start: u64,
    tick_frames: u64,
    ticks: u32,
    cia: u32,
}

type Voices = Box<dyn Fn(Position) -> [ChannelSnapshot; CHANNELS]>;

/// A replayer double whose registers follow a scripted row timeline.
///
/// Registers reflect the song position of the last rendered frame, so a
/// row that starts at frame `s` becomes visible once more than `s` frames
/// were rendered. The song ends after the last scripted row.
pub struct ScriptedEmulator {
    sample_rate: u32,
    vblank_hz: u32,
    rows: Vec<RowTiming>,
    end: u64,
    voices: Voices,
    rendered: u64,
    memory: SparseMemory,
    hidden: Vec<(u32, u32, u64)>,
    info: SongInfo,
    looping: Option<bool>,
}

impl ScriptedEmulator {
    pub fn new<F>(voices: F) -> Self
    where
        F: Fn(Position) -> [ChannelSnapshot; CHANNELS] + 'static,
    {
        Self {
            sample_rate: SAMPLE_RATE,
            vblank_hz: 50,
            rows: Vec::new(),
            end: 0,
            voices: Box::new(voices),
            rendered: 0,
            memory: SparseMemory::default(),
            hidden: Vec::new(),
            info: SongInfo::default(),
            looping: None,
        }
    }

    /// Append `count` rows of `speed` player ticks each.
    pub fn add_rows(&mut self, count: usize, cia: u32, tick_frames: u64, speed: u32) -> &mut Self {
        for _ in 0..count {
            self.rows.push(RowTiming {
                start: self.end,
                tick_frames,
                ticks: speed,
                cia,
            });
            self.end += tick_frames * speed as u64;
        }
        self
    }

    pub fn write_memory(&mut self, addr: u32, data: &[u8]) -> &mut Self {
        self.memory.write(addr, data);
        self
    }

    /// Make `len` bytes at `addr` read as zero until more than `frame`
    /// frames were rendered.
    pub fn hide_until(&mut self, addr: u32, len: u32, frame: u64) -> &mut Self {
        self.hidden.push((addr, len, frame));
        self
    }

    pub fn set_sample_rate(&mut self, sample_rate: u32) -> &mut Self {
        self.sample_rate = sample_rate;
        self
    }

    pub fn set_vblank_hz(&mut self, vblank_hz: u32) -> &mut Self {
        self.vblank_hz = vblank_hz;
        self
    }

    pub fn set_song_info(&mut self, info: SongInfo) -> &mut Self {
        self.info = info;
        self
    }

    /// First frame of `row`.
    pub fn row_start(&self, row: usize) -> u64 {
        self.rows.get(row).map(|r| r.start).unwrap_or(self.end)
    }

    pub fn frames_rendered(&self) -> u64 {
        self.rendered
    }

    /// Last value passed to `set_looping`.
    pub fn looping_requested(&self) -> Option<bool> {
        self.looping
    }

    fn timing(&self) -> Option<(Position, &RowTiming)> {
        if self.rendered == 0 {
            return None;
        }
        let frame = self.rendered - 1;
        let index = self.rows.partition_point(|r| r.start <= frame).checked_sub(1)?;
        let timing = &self.rows[index];
        let tick = ((frame - timing.start) / timing.tick_frames) as u32;
        Some((
            Position {
                row: index,
                tick: tick.min(timing.ticks - 1),
            },
            timing,
        ))
    }
}

impl SnapshotAccessor for ScriptedEmulator {
    fn channel_snapshot(&self) -> [ChannelSnapshot; CHANNELS] {
        match self.timing() {
            Some((position, _)) => (self.voices)(position),
            None => [ChannelSnapshot::default(); CHANNELS],
        }
    }

    fn cia_state(&self) -> CiaState {
        CiaState {
            timer_a_value: self.timing().map(|(_, t)| t.cia).unwrap_or(0),
            vblank_hz: self.vblank_hz,
        }
    }
}

impl MemoryReader for ScriptedEmulator {
    fn read_memory(&mut self, addr: u32, len: usize) -> Vec<u8> {
        let mut data = self.memory.read_memory(addr, len);
        for &(start, size, frame) in &self.hidden {
            if self.rendered > frame {
                continue;
            }
            for (i, byte) in data.iter_mut().enumerate() {
                let a = addr as u64 + i as u64;
                if a >= start as u64 && a < start as u64 + size as u64 {
                    *byte = 0;
                }
            }
        }
        data
    }
}

impl ChipEmulator for ScriptedEmulator {
    fn render_silent(&mut self, max_frames: usize) -> i32 {
        let remaining = self.end - self.rendered;
        let frames = remaining.min(max_frames as u64);
        self.rendered += frames;
        frames as i32
    }

    fn set_looping(&mut self, enabled: bool) {
        self.looping = Some(enabled);
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn song_info(&self) -> SongInfo {
        self.info.clone()
    }
}

/// Nonzero waveform bytes.
pub fn waveform(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 64) as u8 + 1).collect()
}

/// Melody period of `row`; neighbouring rows always differ.
pub fn melody_period(row: usize) -> u32 {
    PT_PERIODS[row % MELODY_ROWS]
}

/// Channel 0: a new note every row, with a volume fade on every fourth row.
pub fn melody_voice(position: Position) -> ChannelSnapshot {
    let volume = if position.row % 4 == 3 {
        64 - 4 * position.tick
    } else {
        64
    };
    ChannelSnapshot {
        period: melody_period(position.row),
        volume,
        dma_active: true,
        sample_pointer: MELODY_SAMPLE,
        playback_pointer: MELODY_SAMPLE + position.tick * 100,
        sample_length_words: 512,
        pending_period: melody_period(position.row),
        pending_length_words: 1,
    }
}

/// Channel 1: one sustained note whose sample moves to its loop after
/// three ticks.
pub fn pad_voice(position: Position) -> ChannelSnapshot {
    let attack = position.row == 0 && position.tick < 3;
    ChannelSnapshot {
        period: 428,
        volume: 40,
        dma_active: true,
        sample_pointer: if attack {
            PAD_SAMPLE
        } else {
            PAD_SAMPLE + PAD_LOOP_START
        },
        playback_pointer: PAD_SAMPLE,
        sample_length_words: if attack { 1_000 } else { 200 },
        pending_period: 428,
        pending_length_words: 200,
    }
}

/// Channel 2: a note from row 2 on, playing `LATE_SAMPLE`.
pub fn late_voice(position: Position) -> ChannelSnapshot {
    if position.row < 2 {
        return ChannelSnapshot::default();
    }
    ChannelSnapshot {
        period: 320,
        volume: 50,
        dma_active: true,
        sample_pointer: LATE_SAMPLE,
        playback_pointer: LATE_SAMPLE,
        sample_length_words: 64,
        pending_period: 320,
        pending_length_words: 1,
    }
}

pub fn song_voices(position: Position) -> [ChannelSnapshot; CHANNELS] {
    [
        melody_voice(position),
        pad_voice(position),
        late_voice(position),
        ChannelSnapshot::default(),
    ]
}

/// Emulator with the song's samples in memory; rows still have to be added.
pub fn song_emulator() -> ScriptedEmulator {
    let mut emu = ScriptedEmulator::new(song_voices);
    emu.write_memory(MELODY_SAMPLE, &waveform(1_024))
        .write_memory(PAD_SAMPLE, &waveform(2_000))
        .write_memory(LATE_SAMPLE, &waveform(128));
    emu
}

/// The melody repeated at 125 BPM, speed 6, for `rows` rows.
///
/// `LATE_SAMPLE` reads as zero until row 6 starts.
pub fn looping_song(rows: usize) -> ScriptedEmulator {
    let mut emu = song_emulator();
    emu.add_rows(rows, CIA_125_BPM, TICK_FRAMES_125, 6);
    let visible = emu.row_start(6);
    emu.hide_until(LATE_SAMPLE, 128, visible);
    emu
}
