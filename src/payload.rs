use bytemuck::{Pod, Zeroable};

/// What an [`AudioCommand`] asks the audio thread to do.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum CommandKind {
    Play = 0,
    Stop = 1,
    SetVolume = 2,
    SetPitch = 3,
    SubmitBuffer = 4,
}

impl CommandKind {
    #[inline(always)]
    pub fn from_u8(raw: u8) -> Option<Self> {
        Some(match raw {
            0 => CommandKind::Play,
            1 => CommandKind::Stop,
            2 => CommandKind::SetVolume,
            3 => CommandKind::SetPitch,
            4 => CommandKind::SubmitBuffer,
            _ => return None,
        })
    }
}

/// POD audio command record handed from the engine thread to the audio callback.
///
/// Numeric fields are little-endian byte arrays so records captured or
/// replayed as raw bytes decode identically on every architecture.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct AudioCommand {
    pub sequence_le: [u8; 8],
    pub voice_le: [u8; 4],
    /// Sample frame at which the command takes effect.
    pub frame_le: [u8; 4],
    /// Command argument: gain / pitch ratio as `f32` bits, or a buffer id.
    pub value_le: [u8; 4],
    pub kind: u8,
    pub _reserved: [u8; 3],
}

const _: () = assert!(core::mem::size_of::<AudioCommand>() == 24);

impl AudioCommand {
    pub const WIRE_SIZE: usize = core::mem::size_of::<AudioCommand>();

    #[inline(always)]
    pub fn new(sequence: u64, voice: u32, frame: u32, kind: CommandKind, value: u32) -> Self {
        Self {
            sequence_le: sequence.to_le_bytes(),
            voice_le: voice.to_le_bytes(),
            frame_le: frame.to_le_bytes(),
            value_le: value.to_le_bytes(),
            kind: kind as u8,
            _reserved: [0; 3],
        }
    }

    #[inline(always)]
    pub fn set_volume(sequence: u64, voice: u32, frame: u32, gain: f32) -> Self {
        Self::new(sequence, voice, frame, CommandKind::SetVolume, gain.to_bits())
    }

    /// Zero-copy view of a raw record. `None` if `data` is too short or the
    /// command kind is unknown.
    #[inline(always)]
    pub fn from_wire(data: &[u8]) -> Option<&AudioCommand> {
        let wire = data.get(..Self::WIRE_SIZE)?;
        let cmd = bytemuck::try_from_bytes::<AudioCommand>(wire).ok()?;
        cmd.kind()?;
        Some(cmd)
    }

    #[inline(always)]
    pub fn sequence(&self) -> u64 {
        u64::from_le_bytes(self.sequence_le)
    }

    #[inline(always)]
    pub fn voice(&self) -> u32 {
        u32::from_le_bytes(self.voice_le)
    }

    #[inline(always)]
    pub fn frame(&self) -> u32 {
        u32::from_le_bytes(self.frame_le)
    }

    #[inline(always)]
    pub fn value(&self) -> u32 {
        u32::from_le_bytes(self.value_le)
    }

    #[inline(always)]
    pub fn gain(&self) -> f32 {
        f32::from_bits(self.value())
    }

    #[inline(always)]
    pub fn kind(&self) -> Option<CommandKind> {
        CommandKind::from_u8(self.kind)
    }

    #[inline(always)]
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }
}
