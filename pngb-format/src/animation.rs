//! Optional timeline table: named scenes over millisecond intervals with an
//! end behavior (§3, §4.F).
//!
//! At most one [`AnimationTable`] exists per module. A host that drives the
//! VM with a time value uses [`AnimationTable::find_scene_at_time`] to
//! decide which `define_frame` body the dispatcher should run (§4.N item 7).

use crate::ids::StringId;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AnimationTableError {
    #[error("scene start_ms {start} is not less than end_ms {end}")]
    NonMonotonicScene { start: u32, end: u32 },
    #[error("animation table is truncated or malformed: {0}")]
    Malformed(&'static str),
}

/// Action taken when a query time is past the animation's last scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndBehavior {
    /// Keep returning the last scene forever.
    Hold,
    /// Stop: queries past the end return no scene.
    Stop,
    /// Restart: not resolved here — a host wanting wraparound re-queries
    /// `t mod duration_ms` itself; this table's job is §4.F's literal
    /// `findSceneAtTime` contract, which only special-cases `hold`.
    Restart,
}

impl EndBehavior {
    fn tag(self) -> u8 {
        match self {
            EndBehavior::Hold => 0,
            EndBehavior::Stop => 1,
            EndBehavior::Restart => 2,
        }
    }

    fn from_tag(tag: u8) -> Result<Self, AnimationTableError> {
        Ok(match tag {
            0 => EndBehavior::Hold,
            1 => EndBehavior::Stop,
            2 => EndBehavior::Restart,
            _ => return Err(AnimationTableError::Malformed("unknown end_behavior tag")),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scene {
    pub id: StringId,
    pub frame: StringId,
    pub start_ms: u32,
    pub end_ms: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnimationTable {
    pub name: StringId,
    pub duration_ms: u32,
    pub looping: bool,
    pub end_behavior: EndBehavior,
    pub scenes: Vec<Scene>,
}

impl AnimationTable {
    /// Validates `start_ms < end_ms` for every scene (§3 invariant) and
    /// constructs the table. Scenes are kept in the order given; overlapping
    /// scenes are accepted, matching §3's "overlapping scenes are not
    /// rejected" note.
    pub fn new(
        name: StringId,
        duration_ms: u32,
        looping: bool,
        end_behavior: EndBehavior,
        scenes: Vec<Scene>,
    ) -> Result<Self, AnimationTableError> {
        for scene in &scenes {
            if scene.start_ms >= scene.end_ms {
                return Err(AnimationTableError::NonMonotonicScene {
                    start: scene.start_ms,
                    end: scene.end_ms,
                });
            }
        }
        Ok(Self {
            name,
            duration_ms,
            looping,
            end_behavior,
            scenes,
        })
    }

    /// First scene with `start <= t < end`; if `t` is past every scene and
    /// `end_behavior == Hold`, the last scene; otherwise `None` (§4.F).
    pub fn find_scene_at_time(&self, t_ms: u32) -> Option<usize> {
        if let Some(i) = self
            .scenes
            .iter()
            .position(|s| s.start_ms <= t_ms && t_ms < s.end_ms)
        {
            return Some(i);
        }
        match (self.scenes.last(), self.end_behavior) {
            (Some(last), EndBehavior::Hold) if t_ms >= last.end_ms => Some(self.scenes.len() - 1),
            _ => None,
        }
    }

    /// `[flags:1][name:2][duration_ms:4][end_behavior:1][scene_count:2]` then
    /// per-scene `[id:2][frame:2][start_ms:4][end_ms:4]` (§4.F). `flags` bit0
    /// is `has_animation` (always 1 here — absence is represented by
    /// [`serialize_absent`]), bit1 is `loop`.
    pub fn serialize(&self, out: &mut Vec<u8>) {
        let mut flags = 0x01u8;
        if self.looping {
            flags |= 0x02;
        }
        out.push(flags);
        out.extend_from_slice(&self.name.index().to_le_bytes());
        out.extend_from_slice(&self.duration_ms.to_le_bytes());
        out.push(self.end_behavior.tag());
        out.extend_from_slice(&(self.scenes.len() as u16).to_le_bytes());
        for scene in &self.scenes {
            out.extend_from_slice(&scene.id.index().to_le_bytes());
            out.extend_from_slice(&scene.frame.index().to_le_bytes());
            out.extend_from_slice(&scene.start_ms.to_le_bytes());
            out.extend_from_slice(&scene.end_ms.to_le_bytes());
        }
    }

    /// Writes just the flags byte with `has_animation` clear (§4.F "If
    /// absent, only the flags byte is emitted").
    pub fn serialize_absent(out: &mut Vec<u8>) {
        out.push(0);
    }

    /// Reads the leading flags byte and, if `has_animation` is set, the rest
    /// of the table. Returns `(None, 1)` when absent.
    pub fn deserialize(buf: &[u8]) -> Result<(Option<Self>, usize), AnimationTableError> {
        if buf.is_empty() {
            return Err(AnimationTableError::Malformed("missing flags byte"));
        }
        let flags = buf[0];
        if flags & 0x01 == 0 {
            return Ok((None, 1));
        }
        let looping = flags & 0x02 != 0;
        if buf.len() < 1 + 2 + 4 + 1 + 2 {
            return Err(AnimationTableError::Malformed("truncated animation header"));
        }
        let mut cursor = 1usize;
        let name = StringId::new(u16::from_le_bytes([buf[cursor], buf[cursor + 1]]));
        cursor += 2;
        let duration_ms = u32::from_le_bytes(buf[cursor..cursor + 4].try_into().unwrap());
        cursor += 4;
        let end_behavior = EndBehavior::from_tag(buf[cursor])?;
        cursor += 1;
        let scene_count = u16::from_le_bytes([buf[cursor], buf[cursor + 1]]) as usize;
        cursor += 2;
        let mut scenes = Vec::with_capacity(scene_count);
        for _ in 0..scene_count {
            if buf.len() < cursor + 12 {
                return Err(AnimationTableError::Malformed("truncated scene"));
            }
            let id = StringId::new(u16::from_le_bytes([buf[cursor], buf[cursor + 1]]));
            let frame = StringId::new(u16::from_le_bytes([buf[cursor + 2], buf[cursor + 3]]));
            let start_ms = u32::from_le_bytes(buf[cursor + 4..cursor + 8].try_into().unwrap());
            let end_ms = u32::from_le_bytes(buf[cursor + 8..cursor + 12].try_into().unwrap());
            cursor += 12;
            scenes.push(Scene {
                id,
                frame,
                start_ms,
                end_ms,
            });
        }
        let table = AnimationTable::new(name, duration_ms, looping, end_behavior, scenes)?;
        Ok((Some(table), cursor))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scenes() -> Vec<Scene> {
        vec![
            Scene {
                id: StringId::new(0),
                frame: StringId::new(10),
                start_ms: 0,
                end_ms: 5000,
            },
            Scene {
                id: StringId::new(1),
                frame: StringId::new(11),
                start_ms: 5000,
                end_ms: 10000,
            },
            Scene {
                id: StringId::new(2),
                frame: StringId::new(12),
                start_ms: 10000,
                end_ms: 15000,
            },
        ]
    }

    #[test]
    fn find_scene_at_time_matches_spec_scenario() {
        let hold = AnimationTable::new(StringId::new(100), 15000, true, EndBehavior::Hold, scenes())
            .unwrap();
        assert_eq!(hold.find_scene_at_time(0), Some(0));
        assert_eq!(hold.find_scene_at_time(2500), Some(0));
        assert_eq!(hold.find_scene_at_time(5000), Some(1));
        assert_eq!(hold.find_scene_at_time(14999), Some(2));
        assert_eq!(hold.find_scene_at_time(20000), Some(2));

        let stop = AnimationTable::new(StringId::new(100), 15000, true, EndBehavior::Stop, scenes())
            .unwrap();
        assert_eq!(stop.find_scene_at_time(20000), None);
    }

    #[test]
    fn non_monotonic_scene_is_rejected() {
        let bad = vec![Scene {
            id: StringId::new(0),
            frame: StringId::new(1),
            start_ms: 100,
            end_ms: 100,
        }];
        assert_eq!(
            AnimationTable::new(StringId::new(0), 100, false, EndBehavior::Stop, bad),
            Err(AnimationTableError::NonMonotonicScene {
                start: 100,
                end: 100
            })
        );
    }

    #[test]
    fn serialize_deserialize_roundtrip() {
        let table =
            AnimationTable::new(StringId::new(5), 15000, true, EndBehavior::Hold, scenes())
                .unwrap();
        let mut buf = Vec::new();
        table.serialize(&mut buf);
        let (restored, consumed) = AnimationTable::deserialize(&buf).unwrap();
        assert_eq!(consumed, buf.len());
        assert_eq!(restored, Some(table));
    }

    #[test]
    fn absent_table_is_one_byte() {
        let mut buf = Vec::new();
        AnimationTable::serialize_absent(&mut buf);
        assert_eq!(buf, vec![0u8]);
        let (restored, consumed) = AnimationTable::deserialize(&buf).unwrap();
        assert_eq!(restored, None);
        assert_eq!(consumed, 1);
    }
}
