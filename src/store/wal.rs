use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use bincode::config::standard;
use bincode::serde::{decode_from_slice, encode_to_vec};

use crate::entity::Entity;
use crate::errors::DbError;

const FRAME_HEADER: usize = 8;
/// Largest payload a frame may carry. A length field above this is corruption,
/// never a torn write.
pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// Append-only entity log.
///
/// Frame layout: `[len u32 LE][crc32 u32 LE][bincode(Entity)]`.
pub struct EntityLog {
    file: File,
    path: PathBuf,
    sync: bool,
}

impl EntityLog {
    /// Open (or create) the log and replay every complete frame.
    ///
    /// A torn final frame is dropped and the file truncated to the last good
    /// frame. At most one frame's worth of bytes is ever cut. A checksum
    /// mismatch before the tail, or an implausible frame length, is reported
    /// as corruption and the file is left untouched.
    ///
    /// # Errors
    /// Returns `Io` when the file cannot be opened and `Wal` on corruption.
    pub fn open(path: &Path, sync: bool) -> Result<(Self, Vec<Entity>), DbError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let mut file =
            OpenOptions::new().read(true).append(true).create(true).open(path)?;
        file.seek(SeekFrom::Start(0))?;
        let mut buf = Vec::new();
        file.read_to_end(&mut buf)?;

        let (entities, good) = replay(&buf)?;
        if good < buf.len() {
            log::warn!(
                "entity log {}: dropping {} trailing bytes of a torn frame",
                path.display(),
                buf.len() - good
            );
            file.set_len(good as u64)?;
        }
        log::info!("entity log {}: replayed {} entities", path.display(), entities.len());
        Ok((Self { file, path: path.to_path_buf(), sync }, entities))
    }

    /// Append one entity frame.
    ///
    /// On a failed write or sync the file is cut back to its previous length,
    /// so a partial frame never sits in front of later ones.
    ///
    /// # Errors
    /// Returns an error if the entity cannot be encoded or written.
    pub fn append(&mut self, entity: &Entity) -> Result<(), DbError> {
        let frame = encode_frame(entity)?;
        self.append_with(&frame, |file, bytes| file.write_all(bytes))
    }

    fn append_with(
        &mut self,
        frame: &[u8],
        write: impl FnOnce(&mut File, &[u8]) -> std::io::Result<()>,
    ) -> Result<(), DbError> {
        let before = self.file.metadata()?.len();
        let written = write(&mut self.file, frame).and_then(|()| {
            if self.sync { self.file.sync_data() } else { self.file.flush() }
        });
        if let Err(e) = written {
            if let Err(undo) = self.file.set_len(before) {
                log::error!(
                    "entity log {}: could not drop partial frame at {before}: {undo}",
                    self.path.display()
                );
            }
            return Err(e.into());
        }
        Ok(())
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn encode_frame(entity: &Entity) -> Result<Vec<u8>, DbError> {
    let data = encode_to_vec(entity, standard())?;
    if data.len() > MAX_FRAME_LEN {
        return Err(DbError::Wal(format!("entity {} too large to log", entity.id)));
    }
    let len = u32::try_from(data.len())
        .map_err(|_| DbError::Wal(format!("entity {} too large to log", entity.id)))?;
    let crc = crc32fast::hash(&data);
    let mut frame = Vec::with_capacity(FRAME_HEADER + data.len());
    frame.extend_from_slice(&len.to_le_bytes());
    frame.extend_from_slice(&crc.to_le_bytes());
    frame.extend_from_slice(&data);
    Ok(frame)
}

/// Decode frames; returns the entities and the byte length of the valid prefix.
fn replay(buf: &[u8]) -> Result<(Vec<Entity>, usize), DbError> {
    let mut out = Vec::new();
    let mut offset = 0usize;
    while offset + FRAME_HEADER <= buf.len() {
        let len = read_u32(&buf[offset..offset + 4]) as usize;
        let crc = read_u32(&buf[offset + 4..offset + 8]);
        if len > MAX_FRAME_LEN {
            return Err(DbError::Wal(format!(
                "frame at offset {offset} claims {len} bytes, above the {MAX_FRAME_LEN} limit"
            )));
        }
        let start = offset + FRAME_HEADER;
        let end = start + len;
        if end > buf.len() {
            return Ok((out, offset));
        }
        let data = &buf[start..end];
        if crc32fast::hash(data) != crc {
            if end == buf.len() {
                return Ok((out, offset));
            }
            return Err(DbError::Wal(format!("checksum mismatch in frame at offset {offset}")));
        }
        let (entity, _) = decode_from_slice::<Entity, _>(data, standard())?;
        out.push(entity);
        offset = end;
    }
    Ok((out, offset))
}

fn read_u32(b: &[u8]) -> u32 {
    let mut arr = [0u8; 4];
    arr.copy_from_slice(b);
    u32::from_le_bytes(arr)
}
