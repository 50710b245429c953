use std::fs;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

use id3::frame::{Comment, ExtendedText, Lyrics, Picture, PictureType};
use id3::{Content, Tag, TagLike, Version};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use super::legacy::{LegacyTag, LEGACY_TAG_SIZE};
use super::{CommitStatus, RawValue, TagContainer};
use crate::config::TaggerConfig;
use crate::errors::{FieldDecodeError, FrameWriteError, TagError};
use crate::mapping::{Dialect, FrameId};

const HEADER_SIZE: usize = 10;
/// Largest size an ID3v2.4 frame can declare (28-bit synchsafe), less room for the frame header.
const MAX_FRAME_DATA: usize = 0x0FFF_FFFF - HEADER_SIZE;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct ContainerParseError(pub String);

#[derive(Debug, Clone)]
struct DamagedFrame {
    id: String,
    raw: Vec<u8>,
}

/// Parsed tag regions of one MP3 file.
///
/// The audio bytes between the ID3v2 header and the ID3v1 trailer are kept
/// verbatim, as is any tag region the mapping did not change.
#[derive(Debug)]
pub struct Mp3Container {
    path: Option<PathBuf>,
    source: Vec<u8>,
    /// Length of the ID3v2 region at the start of `source` (0 if none).
    v2_len: usize,
    /// Offset of the ID3v1 block, `source.len()` if there is none.
    legacy_start: usize,
    tag: Tag,
    /// Frames `id3` could not decode, written back byte for byte.
    damaged: Vec<DamagedFrame>,
    /// Set when damage kept the frame layout from being walked. The ID3v2
    /// region is then read-only.
    v2_locked: bool,
    legacy: Option<LegacyTag>,
    create_legacy: bool,
    new_version: Version,
    v2_dirty: bool,
    legacy_dirty: bool,
}

impl Mp3Container {
    /// Reads and parses the file at `path`; commits go back to the same path.
    pub fn open(path: &Path, config: &TaggerConfig) -> Result<Self, TagError> {
        let bytes = fs::read(path).map_err(|e| TagError::from_io(path, e))?;
        let mut container = Self::parse(bytes, config).map_err(|e| TagError::ContainerParse {
            path: path.to_path_buf(),
            reason: e.0,
        })?;
        container.path = Some(path.to_path_buf());
        Ok(container)
    }

    /// Parses in-memory file contents. Commits only update [`Mp3Container::bytes`].
    pub fn parse(bytes: Vec<u8>, config: &TaggerConfig) -> Result<Self, ContainerParseError> {
        let new_version = config.new_tag_version.id3_version();
        let v2_len = id3v2_region_len(&bytes)?;

        let (tag, damaged, v2_locked) = if v2_len == 0 {
            (Tag::with_version(new_version), Vec::new(), false)
        } else {
            read_v2_region(&bytes[..v2_len], new_version)?
        };

        let (legacy, legacy_start) = match LegacyTag::find(&bytes[v2_len..]) {
            Some(block) => (LegacyTag::parse(block), bytes.len() - LEGACY_TAG_SIZE),
            None => (None, bytes.len()),
        };

        debug!(
            "Parsed container: {} ID3v2 frames ({} damaged), ID3v1 block {}",
            tag.frames().count(),
            damaged.len(),
            if legacy.is_some() { "present" } else { "absent" }
        );

        Ok(Self {
            path: None,
            source: bytes,
            v2_len,
            legacy_start,
            tag,
            damaged,
            v2_locked,
            legacy,
            create_legacy: config.create_legacy_tag,
            new_version,
            v2_dirty: false,
            legacy_dirty: false,
        })
    }

    /// File contents as of the last parse or commit.
    pub fn bytes(&self) -> &[u8] {
        &self.source
    }

    pub fn tag(&self) -> &Tag {
        &self.tag
    }

    pub fn legacy_tag(&self) -> Option<&LegacyTag> {
        self.legacy.as_ref()
    }

    pub fn is_dirty(&self) -> bool {
        self.v2_dirty || self.legacy_dirty
    }

    fn is_damaged(&self, id: &str) -> bool {
        self.damaged.iter().any(|d| d.id == id)
    }

    /// ID3v2.2/2.3 join multiple values with '/'. `id3` splits a few
    /// single-valued frames (TPE1, TCOM, ...) on it and leaves TCON alone,
    /// so undo the first and do the second.
    fn normalize_text(&self, id: &str, text: &str) -> String {
        match self.tag.version() {
            Version::Id3v24 => text.to_string(),
            _ if id == "TCON" => text.replace('/', "\0"),
            _ => text.replace('\0', "/"),
        }
    }

    fn v2_frame_value(&self, id: &'static str) -> Option<Result<RawValue, FieldDecodeError>> {
        match id {
            "COMM" => {
                let comments: Vec<&Comment> = self.tag.comments().collect();
                comments
                    .iter()
                    .find(|c| c.description.is_empty())
                    .or_else(|| comments.iter().find(|c| !c.description.starts_with("iTun")))
                    .map(|c| Ok(RawValue::Text(c.text.clone())))
            }
            "USLT" => {
                let lyrics: Vec<&Lyrics> = self.tag.lyrics().collect();
                lyrics
                    .iter()
                    .find(|l| l.description.is_empty())
                    .or_else(|| lyrics.first())
                    .map(|l| Ok(RawValue::Text(l.text.clone())))
            }
            "APIC" => {
                let pictures: Vec<&Picture> = self.tag.pictures().collect();
                pictures
                    .iter()
                    .find(|p| p.picture_type == PictureType::CoverFront)
                    .or_else(|| pictures.first())
                    .map(|p| {
                        Ok(RawValue::Binary {
                            mime_type: p.mime_type.clone(),
                            description: p.description.clone(),
                            data: p.data.clone(),
                        })
                    })
            }
            _ => {
                let frame = self.tag.get(id)?;
                Some(match frame.content() {
                    Content::Text(s) => Ok(RawValue::Text(self.normalize_text(id, s))),
                    Content::Link(s) => Ok(RawValue::Text(s.clone())),
                    _ => Err(FieldDecodeError::new(FrameId::V2(id), "frame content is not text")),
                })
            }
        }
    }

    fn set_v2_frame(&mut self, frame: &FrameId, id: &str, value: RawValue) -> Result<(), FrameWriteError> {
        match (id, value) {
            ("APIC", RawValue::Binary { mime_type, description, data }) => {
                if data.len() > MAX_FRAME_DATA {
                    return Err(FrameWriteError::new(*frame, format!("{} bytes exceed the frame size limit", data.len())));
                }
                self.tag.remove_picture_by_type(PictureType::CoverFront);
                self.tag.add_frame(Picture {
                    mime_type,
                    picture_type: PictureType::CoverFront,
                    description,
                    data,
                });
            }
            (_, RawValue::Binary { .. }) => {
                return Err(FrameWriteError::new(*frame, "frame cannot hold binary data"));
            }
            (_, RawValue::Text(text)) if text.len() > MAX_FRAME_DATA => {
                return Err(FrameWriteError::new(*frame, format!("{} bytes exceed the frame size limit", text.len())));
            }
            ("APIC", RawValue::Text(_)) => {
                return Err(FrameWriteError::new(*frame, "picture frame needs binary data"));
            }
            ("COMM", RawValue::Text(text)) => {
                self.remove_undescribed_comments();
                self.tag.add_frame(Comment {
                    lang: "eng".to_string(),
                    description: String::new(),
                    text,
                });
            }
            ("USLT", RawValue::Text(text)) => {
                self.remove_undescribed_lyrics();
                self.tag.add_frame(Lyrics {
                    lang: "eng".to_string(),
                    description: String::new(),
                    text,
                });
            }
            (_, RawValue::Text(text)) => {
                self.tag.set_text(id, text);
                self.damaged.retain(|d| d.id != id);
            }
        }
        Ok(())
    }

    fn remove_undescribed_comments(&mut self) {
        let kept: Vec<Comment> = self.tag.comments().filter(|c| !c.description.is_empty()).cloned().collect();
        self.tag.remove("COMM");
        for comment in kept {
            self.tag.add_frame(comment);
        }
    }

    fn remove_undescribed_lyrics(&mut self) {
        let kept: Vec<Lyrics> = self.tag.lyrics().filter(|l| !l.description.is_empty()).cloned().collect();
        self.tag.remove("USLT");
        for lyrics in kept {
            self.tag.add_frame(lyrics);
        }
    }

    fn extended_text(&self, description: &str) -> Option<&ExtendedText> {
        self.tag
            .extended_texts()
            .find(|t| t.description.eq_ignore_ascii_case(description))
    }

    /// Replaces (or with `value == None` drops) the TXXX frame with `description`.
    fn set_extended_text(&mut self, description: &str, value: Option<String>) {
        let kept: Vec<ExtendedText> = self
            .tag
            .extended_texts()
            .filter(|t| !t.description.eq_ignore_ascii_case(description))
            .cloned()
            .collect();
        self.tag.remove("TXXX");
        for text in kept {
            self.tag.add_frame(text);
        }
        if let Some(value) = value {
            self.tag.add_frame(ExtendedText {
                description: description.to_string(),
                value,
            });
        }
    }

    /// New file contents plus the offsets of its regions.
    fn assemble(&self) -> Result<(Vec<u8>, usize, usize), String> {
        let head = if !self.v2_dirty {
            self.source[..self.v2_len].to_vec()
        } else if self.v2_locked {
            return Err("ID3v2 tag is damaged, refusing to rewrite it".to_string());
        } else if self.tag.frames().next().is_none() && self.damaged.is_empty() {
            Vec::new()
        } else {
            let version = match self.tag.version() {
                _ if self.v2_len == 0 => self.new_version,
                Version::Id3v22 => Version::Id3v23,
                v => v,
            };
            let mut buf = Vec::new();
            self.tag
                .write_to(&mut buf, version)
                .map_err(|e| format!("failed to encode ID3v2 tag: {}", e))?;
            if !self.damaged.is_empty() {
                // `write_to` adds no padding, so the frames go at the end
                for frame in &self.damaged {
                    buf.extend_from_slice(&frame.raw);
                }
                let size = synchsafe(buf.len() - HEADER_SIZE);
                buf[6..10].copy_from_slice(&size);
            }
            buf
        };

        let audio = &self.source[self.v2_len..self.legacy_start];

        let tail = if !self.legacy_dirty {
            self.source[self.legacy_start..].to_vec()
        } else {
            match &self.legacy {
                Some(legacy) if !legacy.is_empty() => legacy.encode().to_vec(),
                _ => Vec::new(),
            }
        };

        let v2_len = head.len();
        let legacy_start = v2_len + audio.len();
        let mut bytes = head;
        bytes.extend_from_slice(audio);
        bytes.extend_from_slice(&tail);
        Ok((bytes, v2_len, legacy_start))
    }
}

impl TagContainer for Mp3Container {
    fn accepts(&self, dialect: Dialect) -> bool {
        match dialect {
            Dialect::Id3v2 => true,
            Dialect::Id3v1 => self.legacy.is_some() || self.create_legacy,
        }
    }

    fn frame_value(&self, frame: &FrameId) -> Option<Result<RawValue, FieldDecodeError>> {
        match frame {
            FrameId::V2(id) => match self.v2_frame_value(*id) {
                None if self.is_damaged(id) => Some(Err(FieldDecodeError::new(*frame, "frame could not be decoded"))),
                value => value,
            },
            FrameId::V2Described("TXXX", description) => self
                .extended_text(description)
                .map(|t| Ok(RawValue::Text(t.value.clone()))),
            FrameId::V2Described(id, description) => self
                .tag
                .comments()
                .find(|c| *id == "COMM" && c.description == *description)
                .map(|c| Ok(RawValue::Text(c.text.clone()))),
            FrameId::V1(field) => self
                .legacy
                .as_ref()?
                .field(*field)
                .map(|text| Ok(RawValue::Text(text))),
        }
    }

    fn set_frame_value(&mut self, frame: &FrameId, value: RawValue) -> Result<(), FrameWriteError> {
        if self.frame_value(frame) == Some(Ok(value.clone())) {
            return Ok(());
        }
        if self.v2_locked && !matches!(frame, FrameId::V1(_)) {
            return Err(FrameWriteError::new(*frame, "ID3v2 tag is damaged, refusing to rewrite it"));
        }

        match frame {
            FrameId::V2(id) => {
                self.set_v2_frame(frame, id, value)?;
                self.v2_dirty = true;
            }
            FrameId::V2Described(id, description) => {
                let RawValue::Text(text) = value else {
                    return Err(FrameWriteError::new(*frame, "frame cannot hold binary data"));
                };
                match *id {
                    "TXXX" => self.set_extended_text(description, Some(text)),
                    "COMM" => {
                        self.tag.add_frame(Comment {
                            lang: "eng".to_string(),
                            description: description.to_string(),
                            text,
                        });
                    }
                    other => {
                        return Err(FrameWriteError::new(*frame, format!("{} frames cannot carry a description", other)));
                    }
                }
                self.v2_dirty = true;
            }
            FrameId::V1(field) => {
                if !self.accepts(Dialect::Id3v1) {
                    return Err(FrameWriteError::new(*frame, "file has no ID3v1 block"));
                }
                let RawValue::Text(text) = value else {
                    return Err(FrameWriteError::new(*frame, "ID3v1 fields hold text only"));
                };
                let legacy = self.legacy.get_or_insert_with(LegacyTag::default);
                legacy
                    .set_field(*field, &text)
                    .map_err(|e| FrameWriteError::new(*frame, e.to_string()))?;
                self.legacy_dirty = true;
            }
        }
        Ok(())
    }

    fn remove_frame(&mut self, frame: &FrameId) {
        if self.frame_value(frame).is_none() {
            return;
        }

        match frame {
            FrameId::V2("COMM") => self.remove_undescribed_comments(),
            FrameId::V2("USLT") => self.remove_undescribed_lyrics(),
            FrameId::V2("APIC") => {
                self.tag.remove_picture_by_type(PictureType::CoverFront);
            }
            FrameId::V2(id) => {
                self.tag.remove(id);
                self.damaged.retain(|d| d.id != *id);
            }
            FrameId::V2Described("TXXX", description) => self.set_extended_text(description, None),
            FrameId::V2Described(_, description) => {
                let kept: Vec<Comment> = self
                    .tag
                    .comments()
                    .filter(|c| c.description != *description)
                    .cloned()
                    .collect();
                self.tag.remove("COMM");
                for comment in kept {
                    self.tag.add_frame(comment);
                }
            }
            FrameId::V1(field) => {
                if let Some(legacy) = self.legacy.as_mut() {
                    legacy.clear_field(*field);
                    self.legacy_dirty = true;
                }
                return;
            }
        }
        self.v2_dirty = true;
    }

    fn commit(&mut self) -> Result<CommitStatus, TagError> {
        if !self.is_dirty() {
            debug!("No tag changes, leaving storage untouched");
            return Ok(CommitStatus::Unchanged);
        }

        let target = self.path.clone().unwrap_or_default();
        let (bytes, v2_len, legacy_start) = self
            .assemble()
            .map_err(|reason| TagError::Commit { path: target.clone(), reason })?;

        if let Some(path) = &self.path {
            persist(path, &bytes)?;
            debug!("Committed {} bytes to {}", bytes.len(), path.display());
        }

        self.source = bytes;
        self.v2_len = v2_len;
        self.legacy_start = legacy_start;
        self.v2_dirty = false;
        self.legacy_dirty = false;
        Ok(CommitStatus::Written)
    }
}

/// Size of the ID3v2 region at the start of `bytes`, 0 when there is none.
fn id3v2_region_len(bytes: &[u8]) -> Result<usize, ContainerParseError> {
    if !bytes.starts_with(b"ID3") {
        return Ok(0);
    }
    if bytes.len() < HEADER_SIZE {
        return Err(ContainerParseError("truncated ID3v2 header".to_string()));
    }

    let major = bytes[3];
    if !(2..=4).contains(&major) || bytes[4] == 0xFF {
        return Err(ContainerParseError(format!("unsupported ID3v2 version 2.{}.{}", major, bytes[4])));
    }

    let size_bytes = &bytes[6..10];
    if size_bytes.iter().any(|b| b & 0x80 != 0) {
        return Err(ContainerParseError("ID3v2 tag size is not synchsafe".to_string()));
    }
    let size = synchsafe_value(size_bytes);
    let footer = if major == 4 && bytes[5] & 0x10 != 0 { HEADER_SIZE } else { 0 };

    let len = HEADER_SIZE + size + footer;
    if len > bytes.len() {
        return Err(ContainerParseError(format!(
            "ID3v2 tag claims {} bytes but the file has {}",
            len,
            bytes.len()
        )));
    }
    Ok(len)
}

/// Parses an ID3v2 region frame by frame, so one bad frame costs only
/// itself. Layouts that cannot be walked go through `id3` whole.
fn read_v2_region(region: &[u8], new_version: Version) -> Result<(Tag, Vec<DamagedFrame>, bool), ContainerParseError> {
    let major = region[3];
    let frames = match split_frames(region) {
        Ok(Some(frames)) => frames,
        Ok(None) => return read_whole_region(region, new_version),
        Err(reason) => {
            warn!("Cannot walk ID3v2 frames ({}), reading the tag as a whole", reason);
            return read_whole_region(region, new_version);
        }
    };

    let version = if major == 3 { Version::Id3v23 } else { Version::Id3v24 };
    let mut tag = Tag::with_version(version);
    let mut damaged = Vec::new();
    for raw in frames {
        match decode_frame(major, raw) {
            Ok(decoded) => {
                for frame in decoded.frames() {
                    tag.add_frame(frame.clone());
                }
            }
            Err(e) => {
                let id = String::from_utf8_lossy(&raw[..4]).into_owned();
                warn!("Frame {} cannot be decoded, keeping its bytes: {}", id, e);
                damaged.push(DamagedFrame { id, raw: raw.to_vec() });
            }
        }
    }
    Ok((tag, damaged, false))
}

fn read_whole_region(region: &[u8], new_version: Version) -> Result<(Tag, Vec<DamagedFrame>, bool), ContainerParseError> {
    match Tag::read_from2(Cursor::new(region)) {
        Ok(tag) => Ok((tag, Vec::new(), false)),
        Err(id3::Error { kind: id3::ErrorKind::NoTag, .. }) => Ok((Tag::with_version(new_version), Vec::new(), false)),
        Err(id3::Error { partial_tag: Some(tag), description, .. }) => {
            warn!("ID3v2 tag is damaged, reading the frames before the damage only: {}", description);
            Ok((tag, Vec::new(), true))
        }
        Err(e) => Err(ContainerParseError(format!("corrupt ID3v2 tag: {}", e))),
    }
}

/// Raw frames (header included) of an ID3v2.3/2.4 region. `None` for
/// ID3v2.2 and for ID3v2.3 tags unsynchronised as a whole.
fn split_frames(region: &[u8]) -> Result<Option<Vec<&[u8]>>, String> {
    let (major, flags) = (region[3], region[5]);
    if major == 2 || (major == 3 && flags & 0x80 != 0) {
        return Ok(None);
    }

    let size = synchsafe_value(&region[6..10]);
    let mut body = &region[HEADER_SIZE..HEADER_SIZE + size];

    if flags & 0x40 != 0 {
        if body.len() < 4 {
            return Err("truncated extended header".to_string());
        }
        // The ID3v2.4 size counts itself, the ID3v2.3 one does not
        let skip = if major == 4 {
            synchsafe_value(&body[..4])
        } else {
            4 + u32::from_be_bytes([body[0], body[1], body[2], body[3]]) as usize
        };
        body = body.get(skip..).ok_or("extended header overruns the tag")?;
    }

    let mut frames = Vec::new();
    while body.len() >= HEADER_SIZE && body[0] != 0 {
        let id = &body[..4];
        if !id.iter().all(|b| b.is_ascii_uppercase() || b.is_ascii_digit()) {
            return Err(format!("invalid frame id {:?}", String::from_utf8_lossy(id)));
        }
        let size = if major == 4 {
            synchsafe_value(&body[4..8])
        } else {
            u32::from_be_bytes([body[4], body[5], body[6], body[7]]) as usize
        };
        let end = HEADER_SIZE + size;
        if end > body.len() {
            return Err(format!("frame {} overruns the tag", String::from_utf8_lossy(id)));
        }
        frames.push(&body[..end]);
        body = &body[end..];
    }
    Ok(Some(frames))
}

/// Decodes one raw frame by wrapping it in a tag of its own.
fn decode_frame(major: u8, raw: &[u8]) -> id3::Result<Tag> {
    let mut bytes = Vec::with_capacity(HEADER_SIZE + raw.len());
    bytes.extend_from_slice(b"ID3");
    bytes.extend_from_slice(&[major, 0, 0]);
    bytes.extend_from_slice(&synchsafe(raw.len()));
    bytes.extend_from_slice(raw);
    Tag::read_from2(Cursor::new(bytes))
}

fn synchsafe_value(bytes: &[u8]) -> usize {
    bytes.iter().fold(0usize, |acc, b| (acc << 7) | usize::from(b & 0x7F))
}

fn synchsafe(n: usize) -> [u8; 4] {
    [(n >> 21) as u8 & 0x7F, (n >> 14) as u8 & 0x7F, (n >> 7) as u8 & 0x7F, n as u8 & 0x7F]
}

/// Writes `bytes` next to `path` and renames over it, so readers see either
/// the old file or the new one.
fn persist(path: &Path, bytes: &[u8]) -> Result<(), TagError> {
    let metadata = fs::metadata(path).map_err(|e| TagError::from_io(path, e))?;
    if metadata.permissions().readonly() {
        return Err(TagError::Permission { path: path.to_path_buf() });
    }

    let commit_error = |e: std::io::Error| match e.kind() {
        std::io::ErrorKind::PermissionDenied => TagError::Permission { path: path.to_path_buf() },
        _ => TagError::Commit { path: path.to_path_buf(), reason: e.to_string() },
    };

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut temp = NamedTempFile::new_in(dir).map_err(commit_error)?;
    temp.write_all(bytes).map_err(commit_error)?;
    temp.as_file().sync_all().map_err(commit_error)?;
    fs::set_permissions(temp.path(), metadata.permissions()).map_err(commit_error)?;
    temp.persist(path).map_err(|e| commit_error(e.error))?;
    Ok(())
}
