//! The 128-byte ID3v1 / ID3v1.1 block found at the end of MP3 files.
//!
//! Layout: `TAG`, title (30), artist (30), album (30), year (4),
//! comment (28 + zero byte + track, or 30 without a track), genre (1).
//! Text is Latin-1, padded with zero bytes.

use tracing::debug;

use crate::mapping::LegacyField;

pub const LEGACY_TAG_SIZE: usize = 128;
const MARKER: &[u8; 3] = b"TAG";
const NO_GENRE: u8 = 255;

/// Winamp genre list. The byte in the block indexes into it.
pub const GENRES: &[&str] = &[
    "Blues", "Classic Rock", "Country", "Dance", "Disco", "Funk", "Grunge", "Hip-Hop", "Jazz",
    "Metal", "New Age", "Oldies", "Other", "Pop", "R&B", "Rap", "Reggae", "Rock", "Techno",
    "Industrial", "Alternative", "Ska", "Death Metal", "Pranks", "Soundtrack", "Euro-Techno",
    "Ambient", "Trip-Hop", "Vocal", "Jazz+Funk", "Fusion", "Trance", "Classical", "Instrumental",
    "Acid", "House", "Game", "Sound Clip", "Gospel", "Noise", "AlternRock", "Bass", "Soul",
    "Punk", "Space", "Meditative", "Instrumental Pop", "Instrumental Rock", "Ethnic", "Gothic",
    "Darkwave", "Techno-Industrial", "Electronic", "Pop-Folk", "Eurodance", "Dream",
    "Southern Rock", "Comedy", "Cult", "Gangsta", "Top 40", "Christian Rap", "Pop/Funk",
    "Jungle", "Native American", "Cabaret", "New Wave", "Psychadelic", "Rave", "Showtunes",
    "Trailer", "Lo-Fi", "Tribal", "Acid Punk", "Acid Jazz", "Polka", "Retro", "Musical",
    "Rock & Roll", "Hard Rock", "Folk", "Folk-Rock", "National Folk", "Swing", "Fast Fusion",
    "Bebob", "Latin", "Revival", "Celtic", "Bluegrass", "Avantgarde", "Gothic Rock",
    "Progressive Rock", "Psychedelic Rock", "Symphonic Rock", "Slow Rock", "Big Band", "Chorus",
    "Easy Listening", "Acoustic", "Humour", "Speech", "Chanson", "Opera", "Chamber Music",
    "Sonata", "Symphony", "Booty Bass", "Primus", "Porn Groove", "Satire", "Slow Jam", "Club",
    "Tango", "Samba", "Folklore", "Ballad", "Power Ballad", "Rhythmic Soul", "Freestyle", "Duet",
    "Punk Rock", "Drum Solo", "A capella", "Euro-House", "Dance Hall", "Goa", "Drum & Bass",
    "Club-House", "Hardcore", "Terror", "Indie", "BritPop",
];

/// Reasons a value does not fit the fixed layout.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LegacyEncodeError {
    #[error("{len} bytes do not fit in {max}")]
    TooLong { len: usize, max: usize },

    #[error("character {0:?} is not Latin-1")]
    NotLatin1(char),

    #[error("{0:?} is not a number in 0-{1}")]
    OutOfRange(String, u32),

    #[error("{0:?} is not in the ID3v1 genre list")]
    UnknownGenre(String),
}

/// Decoded ID3v1 block. Empty fields are `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LegacyTag {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    /// Kept as text; malformed years are a per-field problem for the reader.
    pub year: Option<String>,
    pub comment: Option<String>,
    pub track: Option<u8>,
    pub genre: Option<u8>,
}

impl LegacyTag {
    /// Looks for a block at the end of `bytes`.
    pub fn find(bytes: &[u8]) -> Option<&[u8]> {
        let start = bytes.len().checked_sub(LEGACY_TAG_SIZE)?;
        let block = &bytes[start..];
        block.starts_with(MARKER).then_some(block)
    }

    pub fn parse(block: &[u8]) -> Option<Self> {
        if block.len() != LEGACY_TAG_SIZE || !block.starts_with(MARKER) {
            return None;
        }
        let data = &block[3..];

        // ID3v1.1 marks a track number with a zero byte before a non-zero one.
        let (comment_range, track) = if data[122] == 0 && data[123] != 0 {
            (94..122, Some(data[123]))
        } else {
            (94..124, None)
        };

        Some(Self {
            title: decode_text(&data[..30]),
            artist: decode_text(&data[30..60]),
            album: decode_text(&data[60..90]),
            year: decode_text(&data[90..94]),
            comment: decode_text(&data[comment_range]),
            track,
            genre: (usize::from(data[124]) < GENRES.len()).then_some(data[124]),
        })
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Text view of a field, as the container exposes it.
    pub fn field(&self, field: LegacyField) -> Option<String> {
        match field {
            LegacyField::Title => self.title.clone(),
            LegacyField::Artist => self.artist.clone(),
            LegacyField::Album => self.album.clone(),
            LegacyField::Year => self.year.clone(),
            LegacyField::Comment => self.comment.clone(),
            LegacyField::Track => self.track.map(|t| t.to_string()),
            LegacyField::Genre => self.genre.map(|g| GENRES[usize::from(g)].to_string()),
        }
    }

    /// Sets a field from its text form, checking it fits the block.
    pub fn set_field(&mut self, field: LegacyField, value: &str) -> Result<(), LegacyEncodeError> {
        let value = if value.is_empty() { None } else { Some(value) };

        match field {
            LegacyField::Title => self.title = check_text(value, 30)?,
            LegacyField::Artist => self.artist = check_text(value, 30)?,
            LegacyField::Album => self.album = check_text(value, 30)?,
            LegacyField::Comment => self.comment = check_text(value, 28)?,
            LegacyField::Year => {
                self.year = match value {
                    Some(y) if y.len() <= 4 && y.bytes().all(|b| b.is_ascii_digit()) => {
                        Some(format!("{:0>4}", y))
                    }
                    Some(y) => return Err(LegacyEncodeError::OutOfRange(y.to_string(), 9999)),
                    None => None,
                }
            }
            LegacyField::Track => {
                self.track = match value {
                    Some(t) => match t.trim().parse::<u8>() {
                        Ok(n) if n > 0 => Some(n),
                        _ => return Err(LegacyEncodeError::OutOfRange(t.to_string(), 255)),
                    },
                    None => None,
                }
            }
            LegacyField::Genre => {
                self.genre = match value {
                    Some(name) => {
                        let index = GENRES
                            .iter()
                            .position(|g| g.eq_ignore_ascii_case(name.trim()))
                            .ok_or_else(|| LegacyEncodeError::UnknownGenre(name.to_string()))?;
                        Some(index as u8)
                    }
                    None => None,
                }
            }
        }

        Ok(())
    }

    pub fn clear_field(&mut self, field: LegacyField) {
        match field {
            LegacyField::Title => self.title = None,
            LegacyField::Artist => self.artist = None,
            LegacyField::Album => self.album = None,
            LegacyField::Year => self.year = None,
            LegacyField::Comment => self.comment = None,
            LegacyField::Track => self.track = None,
            LegacyField::Genre => self.genre = None,
        }
    }

    /// Encodes as ID3v1.1. Values were checked on the way in.
    pub fn encode(&self) -> [u8; LEGACY_TAG_SIZE] {
        let mut block = [0u8; LEGACY_TAG_SIZE];
        block[..3].copy_from_slice(MARKER);

        put_text(&mut block[3..33], self.title.as_deref());
        put_text(&mut block[33..63], self.artist.as_deref());
        put_text(&mut block[63..93], self.album.as_deref());
        put_text(&mut block[93..97], self.year.as_deref());
        put_text(&mut block[97..125], self.comment.as_deref());

        block[125] = 0;
        block[126] = self.track.unwrap_or(0);
        block[127] = self.genre.unwrap_or(NO_GENRE);
        block
    }
}

fn decode_text(data: &[u8]) -> Option<String> {
    let end = data.iter().position(|&b| b == 0).unwrap_or(data.len());
    if end < data.len() && data[end..].iter().any(|&b| b != 0) {
        debug!("ID3v1 text field contains trailing junk, ignoring it");
    }

    // Latin-1 maps one to one onto the first 256 code points.
    let text: String = data[..end].iter().map(|&b| char::from(b)).collect();
    let text = text.trim_end_matches(' ');
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

fn check_text(value: Option<&str>, max: usize) -> Result<Option<String>, LegacyEncodeError> {
    let Some(value) = value else {
        return Ok(None);
    };

    if let Some(c) = value.chars().find(|c| u32::from(*c) > 0xFF) {
        return Err(LegacyEncodeError::NotLatin1(c));
    }

    let len = value.chars().count();
    if len > max {
        return Err(LegacyEncodeError::TooLong { len, max });
    }

    Ok(Some(value.to_string()))
}

fn put_text(dst: &mut [u8], value: Option<&str>) {
    if let Some(value) = value {
        for (slot, c) in dst.iter_mut().zip(value.chars()) {
            *slot = u32::from(c) as u8;
        }
    }
}
