//! Block decoder for fADC250 readout words
//!
//! Walks one dumped block of 32-bit words and renders every recognized
//! structure as a [`DecodedLine`].
//!
//! # Data Format
//!
//! Every word carries its type in the high-order bits. A word is classified
//! by testing `(word & mask) == value` against [`TAG_RULES`] in order; the
//! first match wins. Some tags own a trailing run of dependent words:
//! - trigger time: exactly one more word (top byte zero)
//! - window raw data: `winwidth` sample words, two 13-bit samples per word
//! - pulse raw data: sample words while the next word passes `0xC000C000 == 0`
//! - pulse parameters: integral/time sub-record pairs while the next word's
//!   top two bits are `01`
//!
//! The decoder never fails: malformed words become inline error lines and the
//! walk resumes with the next word.

use serde::Deserialize;
use tracing::{debug, trace};

use super::common::{DecodedLine, Depth, Tag, Word};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

mod constants {
    // Fields shared by several word types
    pub const SLOT_SHIFT: u32 = 22;
    pub const SLOT_MASK: u32 = 0x1F;
    pub const CHANNEL_SHIFT: u32 = 23;
    pub const CHANNEL_MASK: u32 = 0xF;
    pub const PULSE_SHIFT: u32 = 21;
    pub const PULSE_MASK: u32 = 0x3;
    pub const QF_SHIFT: u32 = 19;
    pub const QF_MASK: u32 = 0x3;

    /// Mask selecting the 5-bit type field
    pub const TYPE_MASK: u32 = 0xF800_0000;

    pub mod block_header {
        pub const VALUE: u32 = 0x8000_0000;
        pub const MODULE_ID_SHIFT: u32 = 18;
        pub const MODULE_ID_MASK: u32 = 0x7;
        pub const BLOCK_NO_SHIFT: u32 = 8;
        pub const BLOCK_NO_MASK: u32 = 0x3FF;
        pub const EVENT_COUNT_MASK: u32 = 0xFF;
    }

    pub mod block_trailer {
        pub const VALUE: u32 = 0x8800_0000;
        pub const WORD_COUNT_MASK: u32 = 0x3F_FFFF;
    }

    pub mod event_header {
        pub const VALUE: u32 = 0x9000_0000;
        pub const TRIGGER_TIME_SHIFT: u32 = 12;
        pub const TRIGGER_TIME_MASK: u32 = 0x3FF;
        pub const EVENT_NO_MASK: u32 = 0xFFF;
    }

    pub mod event_trailer {
        pub const MASK: u32 = 0xFFFF_FFFF;
        pub const VALUE: u32 = 0x8000_0000;
    }

    pub mod trigger_time {
        pub const VALUE: u32 = 0x9800_0000;
        /// Second word must have a zero top byte
        pub const SECOND_WORD_CHECK_MASK: u32 = 0xFF00_0000;
        pub const BYTE_MASK: u32 = 0xFF;
    }

    pub mod window_raw_data {
        pub const MASK: u32 = 0xF807_FF00;
        pub const VALUE: u32 = 0xA000_0000;
        pub const WIDTH_MASK: u32 = 0xFFF;
    }

    pub mod samples {
        /// Both 16-bit halves must have their top two bits clear
        pub const CHECK_MASK: u32 = 0xC000_C000;
        pub const HALF_SHIFT: u32 = 16;
        pub const HALF_MASK: u32 = 0xFFFF;
        pub const INVALID_BIT: u32 = 0x1000;
        pub const VALUE_MASK: u32 = 0x1FFF;
    }

    pub mod pulse_raw_data {
        pub const MASK: u32 = 0xF81F_FC00;
        pub const VALUE: u32 = 0xB000_0000;
        pub const TCROSS_MASK: u32 = 0x1FF;
    }

    pub mod pulse_integral {
        pub const VALUE: u32 = 0xB800_0000;
        pub const INTEGRAL_MASK: u32 = 0x7_FFFF;
    }

    pub mod pulse_time {
        pub const MASK: u32 = 0xF807_8000;
        pub const VALUE: u32 = 0xC000_0000;
        pub const TIME_MASK: u32 = 0x7FFF;
    }

    pub mod pulse_peak {
        pub const VALUE: u32 = 0xD000_0000;
        pub const PEDESTAL_SHIFT: u32 = 12;
        pub const PEDESTAL_MASK: u32 = 0x1FF;
        pub const PEAK_MASK: u32 = 0xFFF;
    }

    pub mod pulse_parameters {
        pub const VALUE: u32 = 0xC800_0000;
        pub const EVENT_SHIFT: u32 = 19;
        pub const EVENT_MASK: u32 = 0xFF;
        pub const CHANNEL_SHIFT: u32 = 15;
        pub const CHANNEL_MASK: u32 = 0xF;
        pub const PEDESTAL_RAW_MASK: u32 = 0x7FFF;
        pub const PEDESTAL_MASK: u32 = 0x3FFF;
        pub const PEDESTAL_QF_SHIFT: u32 = 14;

        // Sub-record words
        pub const SUB_CHECK_MASK: u32 = 0xC000_0000;
        pub const INTEGRAL_WORD_VALUE: u32 = 0x4000_0000;
        pub const TIME_WORD_VALUE: u32 = 0x0000_0000;

        // Integral sub-word
        pub const INTEGRAL_SHIFT: u32 = 12;
        pub const INTEGRAL_MASK: u32 = 0x3_FFFF;
        pub const INTEGRAL_QF_SHIFT: u32 = 9;
        pub const INTEGRAL_QF_MASK: u32 = 0x7;
        pub const SAMPLES_MASK: u32 = 0x1FF;

        // Time sub-word
        pub const TIME_SHIFT: u32 = 15;
        pub const TIME_MASK: u32 = 0x7FFF;
        pub const PEAK_SHIFT: u32 = 3;
        pub const PEAK_MASK: u32 = 0x3FFF;
        pub const TIME_QF_MASK: u32 = 0x7;
    }

    pub mod filler {
        pub const VALUE: u32 = 0xF800_0000;
    }
}

use constants::*;

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// One classification rule: a word has `tag` when `(word & mask) == value`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagRule {
    pub tag: Tag,
    pub mask: u32,
    pub value: u32,
}

impl TagRule {
    const fn new(tag: Tag, mask: u32, value: u32) -> Self {
        Self { tag, mask, value }
    }

    #[inline]
    pub fn matches(&self, word: Word) -> bool {
        (word & self.mask) == self.value
    }
}

/// Classification rules in priority order.
///
/// Block header is tested before the event-trailer literal, so the single
/// word `0x80000000` is reported as a block header.
pub const TAG_RULES: [TagRule; 12] = [
    TagRule::new(Tag::BlockHeader, TYPE_MASK, block_header::VALUE),
    TagRule::new(Tag::BlockTrailer, TYPE_MASK, block_trailer::VALUE),
    TagRule::new(Tag::EventHeader, TYPE_MASK, event_header::VALUE),
    TagRule::new(Tag::EventTrailer, event_trailer::MASK, event_trailer::VALUE),
    TagRule::new(Tag::TriggerTime, TYPE_MASK, trigger_time::VALUE),
    TagRule::new(Tag::WindowRawData, window_raw_data::MASK, window_raw_data::VALUE),
    TagRule::new(Tag::PulseRawData, pulse_raw_data::MASK, pulse_raw_data::VALUE),
    TagRule::new(Tag::PulseIntegral, TYPE_MASK, pulse_integral::VALUE),
    TagRule::new(Tag::PulseTime, pulse_time::MASK, pulse_time::VALUE),
    TagRule::new(Tag::PulsePeak, TYPE_MASK, pulse_peak::VALUE),
    TagRule::new(Tag::PulseParameters, TYPE_MASK, pulse_parameters::VALUE),
    TagRule::new(Tag::Filler, TYPE_MASK, filler::VALUE),
];

/// Classify a single word
pub fn classify(word: Word) -> Tag {
    TAG_RULES
        .iter()
        .find(|rule| rule.matches(word))
        .map_or(Tag::Unrecognized, |rule| rule.tag)
}

// ---------------------------------------------------------------------------
// Configuration & state
// ---------------------------------------------------------------------------

/// Decoder configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DecoderConfig {
    /// Render samples flagged invalid (bit 0x1000) instead of suppressing them
    pub show_invalid_samples: bool,
}

/// Values carried from one word to later words of the same block
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecoderState {
    /// Slot from the most recent block header/trailer, event header or filler
    pub last_slot: Option<u32>,
    /// Event number from the most recent event header
    pub last_event_no: Option<u32>,
    /// Index of the most recent sample in a raw-data run
    pub last_sample_index: Option<usize>,
}

/// fADC250 block decoder
#[derive(Debug, Clone, Default)]
pub struct F250Decoder {
    config: DecoderConfig,
}

impl F250Decoder {
    /// Create a new decoder with given configuration
    pub fn new(config: DecoderConfig) -> Self {
        Self { config }
    }

    /// Create a decoder with default configuration
    pub fn with_defaults() -> Self {
        Self::new(DecoderConfig::default())
    }

    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    pub fn set_show_invalid_samples(&mut self, enabled: bool) {
        self.config.show_invalid_samples = enabled;
    }

    /// Decode one block into listing lines
    pub fn decode(&self, block: &[Word]) -> Vec<DecodedLine> {
        self.decode_with_state(block).0
    }

    /// Decode one block, also returning the carried state at the end of it
    pub fn decode_with_state(&self, block: &[Word]) -> (Vec<DecodedLine>, DecoderState) {
        let (lines, state) = BlockWalk::new(&self.config, block).run();

        debug!(
            words = block.len(),
            lines = lines.len(),
            errors = lines.iter().filter(|l| l.is_error()).count(),
            "Decoded block"
        );

        (lines, state)
    }
}

/// Decode one block with the default configuration
pub fn decode(block: &[Word]) -> Vec<DecodedLine> {
    F250Decoder::with_defaults().decode(block)
}

// ---------------------------------------------------------------------------
// Block walk
// ---------------------------------------------------------------------------

/// Cursor over one block. `pos` never exceeds `block.len()`.
struct BlockWalk<'a> {
    config: &'a DecoderConfig,
    block: &'a [Word],
    pos: usize,
    state: DecoderState,
    lines: Vec<DecodedLine>,
}

impl<'a> BlockWalk<'a> {
    fn new(config: &'a DecoderConfig, block: &'a [Word]) -> Self {
        Self {
            config,
            block,
            pos: 0,
            state: DecoderState::default(),
            lines: Vec::with_capacity(block.len()),
        }
    }

    fn run(mut self) -> (Vec<DecodedLine>, DecoderState) {
        while self.pos < self.block.len() {
            let word = self.block[self.pos];
            let tag = classify(word);
            trace!(pos = self.pos, word, %tag, "Classified word");

            match tag {
                Tag::BlockHeader => self.block_header(word),
                Tag::BlockTrailer => self.block_trailer(word),
                Tag::EventHeader => self.event_header(word),
                Tag::EventTrailer => self.event_trailer(),
                Tag::TriggerTime => self.trigger_time(word),
                Tag::WindowRawData => self.window_raw_data(word),
                Tag::PulseRawData => self.pulse_raw_data(word),
                Tag::PulseIntegral => self.pulse_integral(word),
                Tag::PulseTime => self.pulse_time(word),
                Tag::PulsePeak => self.pulse_peak(word),
                Tag::PulseParameters => self.pulse_parameters(word),
                Tag::Filler => self.filler(word),
                Tag::Unrecognized => {
                    self.error(Tag::Unrecognized, format!("unexpected word {word:08x}"))
                }
            }

            self.pos += 1;
        }

        (self.lines, self.state)
    }

    // -----------------------------------------------------------------------
    // Cursor helpers
    // -----------------------------------------------------------------------

    /// Word after the cursor, if the block has one
    #[inline]
    fn peek_next(&self) -> Option<Word> {
        self.block.get(self.pos + 1).copied()
    }

    /// Advance onto the next word and return it
    fn take_next(&mut self) -> Option<Word> {
        let word = self.peek_next()?;
        self.pos += 1;
        Some(word)
    }

    /// Advance onto the next word only if it satisfies `accept`
    fn take_next_if(&mut self, accept: impl Fn(Word) -> bool) -> Option<Word> {
        match self.peek_next() {
            Some(word) if accept(word) => {
                self.pos += 1;
                Some(word)
            }
            _ => None,
        }
    }

    fn record(&mut self, tag: Tag, depth: Depth, text: String) {
        self.lines.push(DecodedLine::record(tag, depth, text));
    }

    fn error(&mut self, tag: Tag, text: String) {
        self.lines.push(DecodedLine::error(tag, text));
    }

    // -----------------------------------------------------------------------
    // Block level
    // -----------------------------------------------------------------------

    fn block_header(&mut self, word: Word) {
        let slot = field(word, SLOT_SHIFT, SLOT_MASK);
        let module_id = field(word, block_header::MODULE_ID_SHIFT, block_header::MODULE_ID_MASK);
        let block_no = field(word, block_header::BLOCK_NO_SHIFT, block_header::BLOCK_NO_MASK);
        let event_count = word & block_header::EVENT_COUNT_MASK;
        self.state.last_slot = Some(slot);

        self.record(
            Tag::BlockHeader,
            Depth::Block,
            format!(
                "block header: module {module_id} in slot {slot}, block {block_no} with {event_count} events"
            ),
        );
    }

    fn block_trailer(&mut self, word: Word) {
        let slot = field(word, SLOT_SHIFT, SLOT_MASK);
        let word_count = word & block_trailer::WORD_COUNT_MASK;
        self.state.last_slot = Some(slot);

        self.record(
            Tag::BlockTrailer,
            Depth::Block,
            format!("block trailer: slot {slot} with {word_count} words"),
        );
    }

    fn filler(&mut self, word: Word) {
        let slot = field(word, SLOT_SHIFT, SLOT_MASK);
        self.state.last_slot = Some(slot);

        self.record(
            Tag::Filler,
            Depth::Pulse,
            format!("filler word for slot {slot}"),
        );
    }

    // -----------------------------------------------------------------------
    // Event level
    // -----------------------------------------------------------------------

    fn event_header(&mut self, word: Word) {
        let slot = field(word, SLOT_SHIFT, SLOT_MASK);
        let trigger_time = field(
            word,
            event_header::TRIGGER_TIME_SHIFT,
            event_header::TRIGGER_TIME_MASK,
        );
        let event_no = word & event_header::EVENT_NO_MASK;
        self.state.last_slot = Some(slot);
        self.state.last_event_no = Some(event_no);

        self.record(
            Tag::EventHeader,
            Depth::Event,
            format!("event header: slot {slot}, event {event_no}, trigger time {trigger_time}"),
        );
    }

    /// The trailer word has no payload; report the last known slot and event
    fn event_trailer(&mut self) {
        let slot = or_unknown(self.state.last_slot);
        let event_no = or_unknown(self.state.last_event_no);

        self.record(
            Tag::EventTrailer,
            Depth::Event,
            format!("event trailer: slot {slot}, event {event_no}"),
        );
    }

    fn trigger_time(&mut self, word: Word) {
        let Some(second) = self.take_next() else {
            self.error(
                Tag::TriggerTime,
                "expected trigger time (2), found end of block".to_string(),
            );
            return;
        };

        if second & trigger_time::SECOND_WORD_CHECK_MASK != 0 {
            self.error(
                Tag::TriggerTime,
                format!("expected trigger time (2), found {second:08x}"),
            );
            return;
        }

        let time = trigger_time_48(word, second);
        self.record(
            Tag::TriggerTime,
            Depth::Event,
            format!("event trigger time: {time}"),
        );
    }

    // -----------------------------------------------------------------------
    // Raw data
    // -----------------------------------------------------------------------

    fn window_raw_data(&mut self, word: Word) {
        let channel = field(word, CHANNEL_SHIFT, CHANNEL_MASK);
        let width = word & window_raw_data::WIDTH_MASK;

        self.record(
            Tag::WindowRawData,
            Depth::Pulse,
            format!("window raw data: channel {channel} with {width} words"),
        );

        for i in 0..width as usize {
            let Some(sample_word) = self.take_next() else {
                self.error(
                    Tag::WindowRawData,
                    format!("window raw data truncated after {i} of {width} words"),
                );
                break;
            };

            if sample_word & samples::CHECK_MASK != 0 {
                self.error(
                    Tag::WindowRawData,
                    format!("expected window raw data, found {sample_word:08x}"),
                );
                continue;
            }

            self.sample_pair(Tag::WindowRawData, sample_word, 2 * i);
        }
    }

    fn pulse_raw_data(&mut self, word: Word) {
        let channel = field(word, CHANNEL_SHIFT, CHANNEL_MASK);
        let pulse = field(word, PULSE_SHIFT, PULSE_MASK);
        let tcross = word & pulse_raw_data::TCROSS_MASK;

        self.record(
            Tag::PulseRawData,
            Depth::Pulse,
            format!("pulse raw data for channel {channel}: pulse {pulse}, tcross {tcross:03x}"),
        );

        // Sample indices restart at 0 for every pulse
        let mut i = 0;
        while let Some(sample_word) = self.take_next_if(|w| w & samples::CHECK_MASK == 0) {
            self.sample_pair(Tag::PulseRawData, sample_word, 2 * i);
            i += 1;
        }
    }

    /// Emit the two samples packed in one word, high half first
    fn sample_pair(&mut self, tag: Tag, word: Word, first_index: usize) {
        let halves = [
            (word >> samples::HALF_SHIFT) & samples::HALF_MASK,
            word & samples::HALF_MASK,
        ];

        for (offset, half) in halves.into_iter().enumerate() {
            let index = first_index + offset;
            self.state.last_sample_index = Some(index);

            if half & samples::INVALID_BIT == 0 {
                self.record(
                    tag,
                    Depth::Sample,
                    format!("{index}: {:04x}", half & samples::VALUE_MASK),
                );
            } else if self.config.show_invalid_samples {
                self.record(tag, Depth::Sample, format!("{index}: invalid ({half:04x})"));
            }
        }
    }

    // -----------------------------------------------------------------------
    // Pulse summaries
    // -----------------------------------------------------------------------

    fn pulse_integral(&mut self, word: Word) {
        let channel = field(word, CHANNEL_SHIFT, CHANNEL_MASK);
        let pulse = field(word, PULSE_SHIFT, PULSE_MASK);
        let qf = field(word, QF_SHIFT, QF_MASK);
        let integral = word & pulse_integral::INTEGRAL_MASK;

        self.record(
            Tag::PulseIntegral,
            Depth::Pulse,
            format!("pulse integral for channel {channel} pulse {pulse}: {integral} with qf {qf:02x}"),
        );
    }

    fn pulse_time(&mut self, word: Word) {
        let channel = field(word, CHANNEL_SHIFT, CHANNEL_MASK);
        let pulse = field(word, PULSE_SHIFT, PULSE_MASK);
        let qf = field(word, QF_SHIFT, QF_MASK);
        let time = word & pulse_time::TIME_MASK;

        self.record(
            Tag::PulseTime,
            Depth::Pulse,
            format!("pulse time for channel {channel} pulse {pulse}: {time} with qf {qf:02x}"),
        );
    }

    fn pulse_peak(&mut self, word: Word) {
        let channel = field(word, CHANNEL_SHIFT, CHANNEL_MASK);
        let pulse = field(word, PULSE_SHIFT, PULSE_MASK);
        let pedestal = field(word, pulse_peak::PEDESTAL_SHIFT, pulse_peak::PEDESTAL_MASK);
        let peak = word & pulse_peak::PEAK_MASK;

        self.record(
            Tag::PulsePeak,
            Depth::Pulse,
            format!("pulse peak for channel {channel} pulse {pulse}: {peak} with pedestal {pedestal}"),
        );
    }

    fn pulse_parameters(&mut self, word: Word) {
        use constants::pulse_parameters as pp;

        let event = field(word, pp::EVENT_SHIFT, pp::EVENT_MASK);
        let channel = field(word, pp::CHANNEL_SHIFT, pp::CHANNEL_MASK);
        let raw_pedestal = word & pp::PEDESTAL_RAW_MASK;
        let pedestal = raw_pedestal & pp::PEDESTAL_MASK;
        let pedestal_qf = raw_pedestal >> pp::PEDESTAL_QF_SHIFT;

        self.record(
            Tag::PulseParameters,
            Depth::Pulse,
            format!(
                "pulse parameters for channel {channel} event {event}: pedestal {pedestal} with qf {pedestal_qf:01x}"
            ),
        );

        while let Some(integral_word) =
            self.take_next_if(|w| w & pp::SUB_CHECK_MASK == pp::INTEGRAL_WORD_VALUE)
        {
            let integral = field(integral_word, pp::INTEGRAL_SHIFT, pp::INTEGRAL_MASK);
            let qf = field(integral_word, pp::INTEGRAL_QF_SHIFT, pp::INTEGRAL_QF_MASK);
            let samples_above = integral_word & pp::SAMPLES_MASK;

            self.record(
                Tag::PulseParameters,
                Depth::Sample,
                format!(
                    "pulse integral {integral}, {samples_above} samples above threshold, qf {qf:01x}"
                ),
            );

            match self.take_next() {
                Some(time_word) if time_word & pp::SUB_CHECK_MASK == pp::TIME_WORD_VALUE => {
                    let time = field(time_word, pp::TIME_SHIFT, pp::TIME_MASK);
                    let peak = field(time_word, pp::PEAK_SHIFT, pp::PEAK_MASK);
                    let qf = time_word & pp::TIME_QF_MASK;

                    self.record(
                        Tag::PulseParameters,
                        Depth::Sample,
                        format!("pulse time {time}, peak {peak}, qf {qf:01x} ({time_word:08x})"),
                    );
                }
                Some(other) => self.error(
                    Tag::PulseParameters,
                    format!("unexpected word {other:08x} in place of pulse time word"),
                ),
                None => {
                    self.error(
                        Tag::PulseParameters,
                        "missing pulse time word at end of block".to_string(),
                    );
                    break;
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Free functions (pure, easy to test)
// ---------------------------------------------------------------------------

/// Extract `(word >> shift) & mask`
#[inline]
fn field(word: Word, shift: u32, mask: u32) -> u32 {
    (word >> shift) & mask
}

fn or_unknown(value: Option<u32>) -> String {
    value.map_or_else(|| "unknown".to_string(), |v| v.to_string())
}

/// Assemble the 48-bit trigger time from its two words.
///
/// The first word holds bytes TD, TE, TF and the second TA, TB, TC, giving
/// `TA TB TC TD TE TF` from most to least significant.
pub fn trigger_time_48(first: Word, second: Word) -> u64 {
    let byte = |word: Word, shift: u32| u64::from(field(word, shift, trigger_time::BYTE_MASK));

    (byte(second, 16) << 40)
        | (byte(second, 8) << 32)
        | (byte(second, 0) << 24)
        | (byte(first, 16) << 16)
        | (byte(first, 8) << 8)
        | byte(first, 0)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
