//! Chord descriptors used to expand single keys into chord notes.

use core::fmt;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::utils;

/// MIDI note emitted for `notes[0]` of a descriptor.
pub const CHORD_NOTE_OFFSET: u8 = 36;

/// Pitch classes, `C = 0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum MusicalNote {
    #[default]
    C = 0,
    CSharp,
    D,
    DSharp,
    E,
    F,
    FSharp,
    G,
    GSharp,
    A,
    ASharp,
    B,
}

impl MusicalNote {
    pub const ALL: [MusicalNote; 12] = [
        MusicalNote::C,
        MusicalNote::CSharp,
        MusicalNote::D,
        MusicalNote::DSharp,
        MusicalNote::E,
        MusicalNote::F,
        MusicalNote::FSharp,
        MusicalNote::G,
        MusicalNote::GSharp,
        MusicalNote::A,
        MusicalNote::ASharp,
        MusicalNote::B,
    ];

    /// Pitch class of a MIDI note number.
    #[inline]
    pub fn from_midi_note(note: u8) -> Self {
        Self::ALL[(note % 12) as usize]
    }

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ChordType {
    #[default]
    None,
    Major,
    Minor,
    Diminished,
    SuspendedFourth,
    SuspendedSecond,
    Augmented,
    /// Notes are set by hand and never recomputed.
    Custom,
}

impl ChordType {
    fn label(self) -> &'static str {
        match self {
            ChordType::None => "Invalid",
            ChordType::Major => "Maj",
            ChordType::Minor => "min",
            ChordType::Diminished => "dim",
            ChordType::SuspendedFourth => "sus4",
            ChordType::SuspendedSecond => "sus2",
            ChordType::Augmented => "aug",
            ChordType::Custom => "custom",
        }
    }

    /// Semitone offsets of the third and fifth from the root.
    fn triad(self) -> Option<(usize, usize)> {
        match self {
            ChordType::Major => Some((4, 7)),
            ChordType::Minor => Some((3, 7)),
            ChordType::Diminished => Some((3, 6)),
            ChordType::Augmented => Some((4, 8)),
            ChordType::SuspendedSecond => Some((2, 7)),
            ChordType::SuspendedFourth => Some((5, 7)),
            ChordType::None | ChordType::Custom => None,
        }
    }
}

/// Extension added on top of the triad.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum ChordAccent {
    #[default]
    None,
    Seventh,
    MajorSeventh,
    FlatNinth,
    Ninth,
    SharpNinth,
    Eleventh,
    FlatFifthSharpEleventh,
    SharpFifthFlatThirteenth,
    SixthThirteenth,
}

impl ChordAccent {
    fn label(self) -> &'static str {
        match self {
            ChordAccent::None => "None",
            ChordAccent::Seventh => "7",
            ChordAccent::MajorSeventh => "j7",
            ChordAccent::FlatNinth => "\u{266D}9",
            ChordAccent::Ninth => "9",
            ChordAccent::SharpNinth => "\u{266F}9",
            ChordAccent::Eleventh => "11",
            ChordAccent::FlatFifthSharpEleventh => "\u{266D}5/\u{266F}11",
            ChordAccent::SharpFifthFlatThirteenth => "\u{266F}5/\u{266D}13",
            ChordAccent::SixthThirteenth => "6/13",
        }
    }

    fn intervals(self) -> &'static [usize] {
        match self {
            ChordAccent::None | ChordAccent::Seventh => &[],
            ChordAccent::MajorSeventh => &[11],
            ChordAccent::FlatNinth => &[13],
            ChordAccent::Ninth => &[14],
            ChordAccent::SharpNinth => &[15],
            ChordAccent::Eleventh => &[17],
            ChordAccent::FlatFifthSharpEleventh => &[6, 18],
            ChordAccent::SharpFifthFlatThirteenth => &[8, 16],
            ChordAccent::SixthThirteenth => &[9, 21],
        }
    }
}

/// A chord spread over four octaves starting at [`CHORD_NOTE_OFFSET`].
///
/// The first octave holds the optional bass note, the root sits in the second.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChordDescriptor {
    pub has_bass: bool,
    pub root_note: MusicalNote,
    pub bass_note: MusicalNote,
    pub chord_type: ChordType,
    pub accent: ChordAccent,
    /// Positive values move the lowest chord tones up an octave, negative the highest down.
    pub inversion: i32,
    notes: [bool; ChordDescriptor::MAX_NOTES],
}

impl ChordDescriptor {
    pub const MAX_NOTES: usize = 48;

    pub fn new(
        root_note: MusicalNote,
        has_bass: bool,
        bass_note: MusicalNote,
        chord_type: ChordType,
        accent: ChordAccent,
        inversion: i32,
    ) -> Self {
        let mut descr = Self {
            has_bass,
            root_note,
            bass_note,
            chord_type,
            accent,
            inversion,
            notes: [false; Self::MAX_NOTES],
        };
        descr.update_notes();
        descr
    }

    /// Plain triad without bass, accent or inversion.
    pub fn triad(root_note: MusicalNote, chord_type: ChordType) -> Self {
        Self::new(root_note, false, root_note, chord_type, ChordAccent::None, 0)
    }

    /// Chord with a hand-picked note set.
    pub fn custom(root_note: MusicalNote, notes: [bool; Self::MAX_NOTES]) -> Self {
        Self {
            has_bass: false,
            root_note,
            bass_note: root_note,
            chord_type: ChordType::Custom,
            accent: ChordAccent::None,
            inversion: 0,
            notes,
        }
    }

    #[inline]
    pub fn notes(&self) -> &[bool; Self::MAX_NOTES] {
        &self.notes
    }

    /// Iterates the MIDI note numbers of the chord, lowest first.
    pub fn iter_midi_notes(&self) -> impl Iterator<Item = u8> + '_ {
        self.notes
            .iter()
            .enumerate()
            .filter(|(_, on)| **on)
            .map(|(i, _)| i as u8 + CHORD_NOTE_OFFSET)
    }

    /// MIDI note numbers of the chord, lowest first.
    pub fn midi_notes(&self) -> SmallVec<[u8; 8]> {
        self.iter_midi_notes().collect()
    }

    /// Recomputes the note set from the chord fields. Custom chords are kept as is.
    pub fn update_notes(&mut self) {
        if self.chord_type == ChordType::Custom {
            return;
        }

        self.notes = [false; Self::MAX_NOTES];
        let Some((third, fifth)) = self.chord_type.triad() else {
            return;
        };

        let root = 12 + self.root_note.index();
        if self.has_bass {
            self.notes[self.bass_note.index()] = true;
        }
        self.notes[root] = true;
        self.notes[root + third] = true;
        self.notes[root + fifth] = true;

        let minor_seventh = if self.chord_type == ChordType::Diminished {
            9
        } else {
            10
        };
        if self.accent == ChordAccent::Seventh
            || (self.accent >= ChordAccent::FlatNinth
                && self.accent <= ChordAccent::SixthThirteenth)
        {
            self.notes[root + minor_seventh] = true;
        }
        for interval in self.accent.intervals() {
            self.notes[root + interval] = true;
        }

        self.invert();
    }

    fn invert(&mut self) {
        for _ in 0..self.inversion.max(0) {
            if let Some(j) = (12..Self::MAX_NOTES - 12).find(|&j| self.notes[j]) {
                self.notes[j] = false;
                self.notes[j + 12] = true;
            }
        }
        for _ in 0..(-self.inversion).max(0) {
            if let Some(j) = (12..Self::MAX_NOTES).rev().find(|&j| self.notes[j]) {
                self.notes[j] = false;
                self.notes[j - 12] = true;
            }
        }
    }

    /// The bass note if one is set, otherwise the root.
    pub fn is_key_bass(&self, key: MusicalNote) -> bool {
        if self.has_bass {
            self.bass_note == key
        } else {
            self.root_note == key
        }
    }

    /// Whether the pitch class sounds anywhere in the chord.
    pub fn is_key_in_chord(&self, key: MusicalNote) -> bool {
        self.is_key_bass(key)
            || self
                .notes
                .iter()
                .enumerate()
                .any(|(i, on)| *on && i % 12 == key.index())
    }
}

impl fmt::Display for ChordDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}",
            utils::note_name(self.root_note as u8),
            self.chord_type.label()
        )?;
        if self.accent > ChordAccent::None {
            write!(f, " {}", self.accent.label())?;
        }
        if self.has_bass && self.bass_note != self.root_note {
            write!(f, "/{}", utils::note_name(self.bass_note as u8))?;
        }
        if self.inversion != 0 {
            write!(f, " i{}", self.inversion)?;
        }
        Ok(())
    }
}
